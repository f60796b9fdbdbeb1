//! Stationary spectral-gating noise reduction.
//!
//! A per-frequency threshold is estimated from the whole clip
//! (mean + `n_std_thresh` standard deviations of the dB magnitude).
//! Bins above it count as signal. The binary mask is smoothed over
//! frequency and time, then blended into a gain of `mask * p + (1 - p)`.

use super::stft::Stft;

/// Floor for magnitude-to-dB conversion.
const AMIN: f32 = 1e-10;
/// Dynamic range kept below the loudest bin.
const TOP_DB: f32 = 80.0;

#[derive(Debug, Clone)]
pub struct SpectralGate {
    pub n_fft: usize,
    pub hop: usize,
    pub n_std_thresh: f32,
    /// Fraction of noise removed, 0.0..=1.0
    pub prop_decrease: f32,
    pub freq_mask_smooth_hz: f32,
    pub time_mask_smooth_ms: f32,
}

impl Default for SpectralGate {
    fn default() -> Self {
        Self {
            n_fft: 1024,
            hop: 256,
            n_std_thresh: 1.5,
            prop_decrease: 0.8,
            freq_mask_smooth_hz: 500.0,
            time_mask_smooth_ms: 50.0,
        }
    }
}

impl SpectralGate {
    pub fn new(prop_decrease: f32) -> Self {
        Self {
            prop_decrease: prop_decrease.clamp(0.0, 1.0),
            ..Self::default()
        }
    }

    /// Returns the noise-reduced signal, same length as the input.
    pub fn reduce_noise(&self, samples: &[f32], sample_rate: u32) -> Vec<f32> {
        if samples.is_empty() {
            return Vec::new();
        }

        let stft = Stft::new(self.n_fft, self.hop);
        let mut frames = stft.forward(samples);
        let n_frames = frames.len();
        let bins = stft.bins();

        let db: Vec<Vec<f32>> = frames
            .iter()
            .map(|frame| frame.iter().map(|c| amplitude_to_db(c.norm())).collect())
            .collect();
        let max_db = db
            .iter()
            .flat_map(|row| row.iter().copied())
            .fold(f32::MIN, f32::max);
        let floor = max_db - TOP_DB;

        // Порог по каждому бину: mean + n_std * std
        let mut thresholds = vec![0.0f32; bins];
        for (k, threshold) in thresholds.iter_mut().enumerate() {
            let values = db.iter().map(|row| row[k].max(floor));
            let mean = values.clone().sum::<f32>() / n_frames as f32;
            let variance = values.map(|v| (v - mean).powi(2)).sum::<f32>() / n_frames as f32;
            *threshold = mean + self.n_std_thresh * variance.sqrt();
        }

        let mut mask: Vec<Vec<f32>> = db
            .iter()
            .map(|row| {
                row.iter()
                    .zip(&thresholds)
                    .map(|(&v, &t)| if v.max(floor) > t { 1.0 } else { 0.0 })
                    .collect()
            })
            .collect();

        let freq_radius =
            (self.freq_mask_smooth_hz / (sample_rate as f32 / (self.n_fft as f32 / 2.0))) as usize;
        let time_radius =
            (self.time_mask_smooth_ms / (self.hop as f32 / sample_rate as f32 * 1000.0)) as usize;
        smooth_mask(&mut mask, freq_radius, time_radius);

        let p = self.prop_decrease;
        for (frame, gains) in frames.iter_mut().zip(&mask) {
            for (bin, &m) in frame.iter_mut().zip(gains) {
                *bin *= m * p + (1.0 - p);
            }
        }

        stft.inverse(&frames, samples.len())
    }
}

fn amplitude_to_db(magnitude: f32) -> f32 {
    20.0 * magnitude.max(AMIN).log10()
}

/// Normalised triangular kernel of half-width `radius`.
fn triangular_kernel(radius: usize) -> Vec<f32> {
    let weights: Vec<f32> = (0..=2 * radius)
        .map(|i| {
            let d = (i as isize - radius as isize).unsigned_abs();
            (radius + 1 - d) as f32
        })
        .collect();
    let sum: f32 = weights.iter().sum();
    weights.into_iter().map(|w| w / sum).collect()
}

/// Separable smoothing with zero padding at the edges.
fn smooth_mask(mask: &mut [Vec<f32>], freq_radius: usize, time_radius: usize) {
    if mask.is_empty() {
        return;
    }
    let n_frames = mask.len();
    let bins = mask[0].len();

    if freq_radius > 0 {
        let kernel = triangular_kernel(freq_radius);
        for row in mask.iter_mut() {
            let source = row.clone();
            for (k, value) in row.iter_mut().enumerate() {
                *value = convolve_at(&kernel, freq_radius, k, bins, |j| source[j]);
            }
        }
    }

    if time_radius > 0 {
        let kernel = triangular_kernel(time_radius);
        let source: Vec<Vec<f32>> = mask.to_vec();
        for (t, row) in mask.iter_mut().enumerate() {
            for (k, value) in row.iter_mut().enumerate() {
                *value = convolve_at(&kernel, time_radius, t, n_frames, |j| source[j][k]);
            }
        }
    }
}

fn convolve_at(
    kernel: &[f32],
    radius: usize,
    center: usize,
    len: usize,
    value: impl Fn(usize) -> f32,
) -> f32 {
    kernel
        .iter()
        .enumerate()
        .filter_map(|(i, &w)| {
            let j = (center + i).checked_sub(radius)?;
            (j < len).then(|| w * value(j))
        })
        .sum()
}
