//! Frame-level acoustic features.
//!
//! All framing is centred with zero padding, so a signal of `n` samples
//! yields `1 + n / hop` frames.

use super::stft::{Spectrum, Stft};

/// Threshold below which a sample counts as zero for crossing detection.
const ZERO_EPS: f32 = 1e-10;

/// Centred frames of `frame_len` samples every `hop` samples.
fn centred_frames(samples: &[f32], frame_len: usize, hop: usize) -> Vec<Vec<f32>> {
    if samples.is_empty() || frame_len == 0 || hop == 0 {
        return Vec::new();
    }
    let pad = frame_len / 2;
    let mut padded = vec![0.0f32; samples.len() + 2 * pad];
    padded[pad..pad + samples.len()].copy_from_slice(samples);

    let n_frames = 1 + (padded.len() - frame_len) / hop;
    (0..n_frames)
        .map(|t| padded[t * hop..t * hop + frame_len].to_vec())
        .collect()
}

/// RMS energy per frame.
pub fn frame_rms(samples: &[f32], frame_len: usize, hop: usize) -> Vec<f32> {
    centred_frames(samples, frame_len, hop)
        .iter()
        .map(|frame| {
            let energy: f32 = frame.iter().map(|s| s * s).sum();
            (energy / frame.len() as f32).sqrt()
        })
        .collect()
}

/// Fraction of sign changes per frame.
pub fn zero_crossing_rate(samples: &[f32], frame_len: usize, hop: usize) -> Vec<f32> {
    centred_frames(samples, frame_len, hop)
        .iter()
        .map(|frame| {
            let crossings = frame
                .windows(2)
                .filter(|w| is_negative(w[0]) != is_negative(w[1]))
                .count();
            crossings as f32 / frame.len() as f32
        })
        .collect()
}

fn is_negative(sample: f32) -> bool {
    sample < -ZERO_EPS
}

/// Magnitude-weighted mean frequency of each frame; silent frames give 0.
pub fn spectral_centroid(frames: &[Spectrum], stft: &Stft, sample_rate: u32) -> Vec<f32> {
    frames
        .iter()
        .map(|frame| {
            let mut weighted = 0.0f32;
            let mut total = 0.0f32;
            for (k, bin) in frame.iter().enumerate() {
                let magnitude = bin.norm();
                weighted += stft.bin_frequency(k, sample_rate) * magnitude;
                total += magnitude;
            }
            if total > 0.0 {
                weighted / total
            } else {
                0.0
            }
        })
        .collect()
}

/// Spectral flux onset envelope: mean positive dB increase between frames.
pub fn onset_envelope(frames: &[Spectrum]) -> Vec<f32> {
    if frames.len() < 2 {
        return vec![0.0; frames.len()];
    }

    let db: Vec<Vec<f32>> = frames
        .iter()
        .map(|frame| {
            frame
                .iter()
                .map(|c| 10.0 * c.norm_sqr().max(1e-10).log10())
                .collect()
        })
        .collect();
    let max_db = db
        .iter()
        .flat_map(|row| row.iter().copied())
        .fold(f32::MIN, f32::max);
    let floor = max_db - 80.0;

    let mut envelope = vec![0.0f32; frames.len()];
    for t in 1..db.len() {
        let bins = db[t].len().max(1);
        let flux: f32 = db[t]
            .iter()
            .zip(&db[t - 1])
            .map(|(&cur, &prev)| (cur.max(floor) - prev.max(floor)).max(0.0))
            .sum();
        envelope[t] = flux / bins as f32;
    }
    envelope
}

/// Global tempo estimate in BPM from an onset envelope.
///
/// Autocorrelation of the envelope weighted by a log-normal prior centred on
/// `start_bpm` (one octave standard deviation). A flat envelope yields 0.
pub fn estimate_tempo(envelope: &[f32], sample_rate: u32, hop: usize, start_bpm: f32) -> f32 {
    const MAX_TEMPO: f32 = 320.0;
    const AC_SECONDS: f32 = 8.0;

    let (min, max) = envelope
        .iter()
        .fold((f32::MAX, f32::MIN), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    if envelope.len() < 3 || max - min <= 1e-8 {
        return 0.0;
    }

    let frame_rate = sample_rate as f32 / hop as f32;
    let max_lag = ((AC_SECONDS * frame_rate) as usize).min(envelope.len() - 1);

    let mut best_bpm = 0.0f32;
    let mut best_score = 0.0f32;
    for lag in 1..=max_lag {
        let bpm = 60.0 * frame_rate / lag as f32;
        if bpm > MAX_TEMPO {
            continue;
        }
        let ac: f32 = envelope[lag..]
            .iter()
            .zip(envelope)
            .map(|(a, b)| a * b)
            .sum();
        let prior = (-0.5 * (bpm.log2() - start_bpm.log2()).powi(2)).exp();
        let score = ac * prior;
        if score > best_score {
            best_score = score;
            best_bpm = bpm;
        }
    }

    best_bpm
}

pub fn mean(values: &[f32]) -> f32 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f32>() / values.len() as f32
}
