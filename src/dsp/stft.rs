//! Short-time Fourier transform over mono `f32` signals.
//!
//! Frames are centred: the signal is zero-padded by `n_fft / 2` on both
//! sides, so frame `t` is centred on sample `t * hop`. The inverse uses
//! windowed overlap-add normalised by the summed squared window.

use std::sync::Arc;

use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};

/// One STFT frame: bins `0..=n_fft/2`.
pub type Spectrum = Vec<Complex<f32>>;

/// Periodic Hann window.
pub fn hann_window(len: usize) -> Vec<f32> {
    (0..len)
        .map(|i| 0.5 - 0.5 * (2.0 * std::f32::consts::PI * i as f32 / len as f32).cos())
        .collect()
}

pub struct Stft {
    n_fft: usize,
    hop: usize,
    window: Vec<f32>,
    forward: Arc<dyn Fft<f32>>,
    inverse: Arc<dyn Fft<f32>>,
}

impl Stft {
    pub fn new(n_fft: usize, hop: usize) -> Self {
        let mut planner = FftPlanner::new();
        Self {
            n_fft,
            hop: hop.max(1),
            window: hann_window(n_fft),
            forward: planner.plan_fft_forward(n_fft),
            inverse: planner.plan_fft_inverse(n_fft),
        }
    }

    pub fn n_fft(&self) -> usize {
        self.n_fft
    }

    pub fn hop(&self) -> usize {
        self.hop
    }

    /// Number of non-negative frequency bins.
    pub fn bins(&self) -> usize {
        self.n_fft / 2 + 1
    }

    /// Centre frequency of bin `k` in Hz.
    pub fn bin_frequency(&self, k: usize, sample_rate: u32) -> f32 {
        k as f32 * sample_rate as f32 / self.n_fft as f32
    }

    pub fn forward(&self, signal: &[f32]) -> Vec<Spectrum> {
        if signal.is_empty() {
            return Vec::new();
        }

        let pad = self.n_fft / 2;
        let mut padded = vec![0.0f32; signal.len() + 2 * pad];
        padded[pad..pad + signal.len()].copy_from_slice(signal);

        let n_frames = 1 + (padded.len() - self.n_fft) / self.hop;
        let bins = self.bins();
        let mut frames = Vec::with_capacity(n_frames);
        let mut buffer = vec![Complex::new(0.0f32, 0.0); self.n_fft];

        for t in 0..n_frames {
            let start = t * self.hop;
            for (i, slot) in buffer.iter_mut().enumerate() {
                *slot = Complex::new(padded[start + i] * self.window[i], 0.0);
            }
            self.forward.process(&mut buffer);
            frames.push(buffer[..bins].to_vec());
        }

        frames
    }

    /// Inverse transform; output is trimmed or zero-extended to `length`.
    pub fn inverse(&self, frames: &[Spectrum], length: usize) -> Vec<f32> {
        if frames.is_empty() || length == 0 {
            return vec![0.0; length];
        }

        let pad = self.n_fft / 2;
        let total = self.n_fft + self.hop * (frames.len() - 1);
        let mut output = vec![0.0f32; total];
        let mut norm = vec![0.0f32; total];
        let mut buffer = vec![Complex::new(0.0f32, 0.0); self.n_fft];
        let scale = 1.0 / self.n_fft as f32;

        for (t, frame) in frames.iter().enumerate() {
            // Восстанавливаем эрмитово-симметричный спектр
            for k in 0..self.n_fft {
                buffer[k] = if k < frame.len() {
                    frame[k]
                } else {
                    let mirror = self.n_fft - k;
                    frame.get(mirror).map(|c| c.conj()).unwrap_or_default()
                };
            }
            self.inverse.process(&mut buffer);

            let start = t * self.hop;
            for i in 0..self.n_fft {
                let w = self.window[i];
                output[start + i] += buffer[i].re * scale * w;
                norm[start + i] += w * w;
            }
        }

        for (sample, &weight) in output.iter_mut().zip(norm.iter()) {
            if weight > 1e-8 {
                *sample /= weight;
            }
        }

        let mut result: Vec<f32> = output.into_iter().skip(pad).take(length).collect();
        result.resize(length, 0.0);
        result
    }
}
