//! Phase-vocoder time stretching and pitch shifting.

use std::f32::consts::PI;

use rustfft::num_complex::Complex;

use super::stft::{Spectrum, Stft};
use crate::error::{DubError, Result};
use crate::media::audio::resample_ratio;

const N_FFT: usize = 2048;
const HOP: usize = 512;

/// Change tempo without changing pitch.
///
/// `rate > 1` speeds up. Output length is `round(len / rate)`.
pub fn time_stretch(samples: &[f32], rate: f32) -> Result<Vec<f32>> {
    if !(rate.is_finite() && rate > 0.0) {
        return Err(DubError::AudioProcessing(format!(
            "Invalid stretch rate: {}",
            rate
        )));
    }
    if samples.is_empty() {
        return Ok(Vec::new());
    }
    if (rate - 1.0).abs() < 1e-6 {
        return Ok(samples.to_vec());
    }

    let stft = Stft::new(N_FFT, HOP);
    let frames = stft.forward(samples);
    let stretched = phase_vocoder(&frames, rate, HOP, N_FFT);
    let length = (samples.len() as f64 / rate as f64).round() as usize;

    Ok(stft.inverse(&stretched, length))
}

/// Shift pitch by `n_steps` semitones keeping duration.
///
/// Stretches by `2^(-n/12)` and resamples back by the same ratio.
pub fn pitch_shift(samples: &[f32], n_steps: f32) -> Result<Vec<f32>> {
    if samples.is_empty() || n_steps.abs() < 1e-6 {
        return Ok(samples.to_vec());
    }

    let rate = 2f32.powf(-n_steps / 12.0);
    let stretched = time_stretch(samples, rate)?;
    let mut shifted = resample_ratio(&stretched, rate as f64)?;
    shifted.resize(samples.len(), 0.0);
    Ok(shifted)
}

fn phase_vocoder(frames: &[Spectrum], rate: f32, hop: usize, n_fft: usize) -> Vec<Spectrum> {
    let Some(first) = frames.first() else {
        return Vec::new();
    };
    let bins = first.len();

    // Ожидаемый набег фазы за один шаг для каждого бина
    let phi_advance: Vec<f32> = (0..bins)
        .map(|k| 2.0 * PI * k as f32 * hop as f32 / n_fft as f32)
        .collect();
    let mut phase_acc: Vec<f32> = first.iter().map(|c| c.arg()).collect();

    let zero = vec![Complex::new(0.0f32, 0.0); bins];
    let n_out = (frames.len() as f32 / rate).ceil() as usize;
    let mut output = Vec::with_capacity(n_out);

    let mut step = 0.0f32;
    while (step as usize) < frames.len() {
        let idx = step as usize;
        let alpha = step - idx as f32;
        let left = &frames[idx];
        let right = frames.get(idx + 1).unwrap_or(&zero);

        let mut frame = Vec::with_capacity(bins);
        for k in 0..bins {
            let magnitude = (1.0 - alpha) * left[k].norm() + alpha * right[k].norm();
            frame.push(Complex::from_polar(magnitude, phase_acc[k]));

            let mut dphase = right[k].arg() - left[k].arg() - phi_advance[k];
            dphase -= 2.0 * PI * (dphase / (2.0 * PI)).round();
            phase_acc[k] += phi_advance[k] + dphase;
        }
        output.push(frame);
        step += rate;
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::audio::compute_rms;

    fn sine(freq: f32, rate: u32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| (2.0 * PI * freq * i as f32 / rate as f32).sin() * 0.5)
            .collect()
    }

    /// Частота по числу пересечений нуля
    fn estimate_freq(samples: &[f32], rate: u32) -> f32 {
        let crossings = samples
            .windows(2)
            .filter(|w| (w[0] < 0.0) != (w[1] < 0.0))
            .count();
        crossings as f32 / 2.0 / (samples.len() as f32 / rate as f32)
    }

    #[test]
    fn test_stretch_length() {
        let input = sine(440.0, 22050, 22050);
        assert_eq!(time_stretch(&input, 1.25).unwrap().len(), 17640);
        assert_eq!(time_stretch(&input, 0.75).unwrap().len(), 29400);
        assert_eq!(time_stretch(&input, 1.0).unwrap(), input);
        assert!(time_stretch(&input, 0.0).is_err());
    }

    #[test]
    fn test_stretch_preserves_pitch() {
        let input = sine(440.0, 22050, 44100);
        let output = time_stretch(&input, 1.2).unwrap();
        let body = &output[4096..output.len() - 4096];
        let freq = estimate_freq(body, 22050);
        assert!((freq - 440.0).abs() < 15.0, "freq {}", freq);
        assert!(compute_rms(body) > 0.2);
    }

    #[test]
    fn test_pitch_shift_keeps_length_and_moves_pitch() {
        let input = sine(440.0, 22050, 44100);
        let output = pitch_shift(&input, 12.0).unwrap();
        assert_eq!(output.len(), input.len());
        let freq = estimate_freq(&output[4096..40000], 22050);
        assert!((freq - 880.0).abs() < 60.0, "freq {}", freq);
    }
}
