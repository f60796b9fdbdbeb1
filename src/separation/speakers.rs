//! Energy-based speaker count heuristic.
//!
//! Approximate: counts switches between active and quiet 500 ms windows and
//! maps the number of switches to 1, 2 or 3 (meaning three or more) speakers.

use std::path::Path;

use log::info;

use crate::error::Result;
use crate::media::audio::{compute_rms, read_audio_file, AudioBuffer};

/// Window length in seconds.
const WINDOW_SECS: f64 = 0.5;
/// Fraction of the mean window energy that marks a window as active.
const ACTIVITY_RATIO: f32 = 0.3;

/// RMS of half-overlapping 500 ms windows.
///
/// Windows start at `0, hop, 2 * hop, ...` while `start < len - window`.
pub fn window_energies(samples: &[f32], sample_rate: u32) -> Vec<f32> {
    let window = (sample_rate as f64 * WINDOW_SECS) as usize;
    let hop = window / 2;
    if window == 0 || hop == 0 || samples.len() <= window {
        return Vec::new();
    }

    (0..samples.len() - window)
        .step_by(hop)
        .map(|start| compute_rms(&samples[start..start + window]))
        .collect()
}

/// Number of positions where window activity differs from the previous window.
pub fn count_energy_transitions(energies: &[f32]) -> usize {
    if energies.is_empty() {
        return 0;
    }
    let mean = energies.iter().sum::<f32>() / energies.len() as f32;
    let threshold = mean * ACTIVITY_RATIO;

    energies
        .windows(2)
        .filter(|pair| (pair[0] > threshold) != (pair[1] > threshold))
        .count()
}

pub fn speakers_for_transitions(transitions: usize) -> u32 {
    match transitions {
        0..=4 => 1,
        5..=14 => 2,
        _ => 3,
    }
}

pub fn estimate_speaker_count(audio: &AudioBuffer) -> u32 {
    let mono = audio.to_mono();
    let energies = window_energies(&mono.samples, mono.sample_rate);
    let transitions = count_energy_transitions(&energies);
    let speakers = speakers_for_transitions(transitions);
    info!(
        "Speaker estimate: {} ({} activity transitions over {} windows)",
        speakers,
        transitions,
        energies.len()
    );
    speakers
}

pub fn estimate_speaker_count_file(path: &Path) -> Result<u32> {
    let audio = read_audio_file(path)?;
    Ok(estimate_speaker_count(&audio))
}
