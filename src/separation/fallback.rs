//! Резервное разделение: шумоподавление вместо настоящего разделения.
//!
//! Вокал = сигнал после спектрального гейта, фон = исходник минус вокал.

use std::path::Path;

use log::info;

use super::SeparationEngine;
use crate::dsp::SpectralGate;
use crate::error::{DubError, Result};
use crate::media::audio::{read_audio_file, write_wav, AudioBuffer};
use crate::types::{MediaAsset, Stems};

/// Доля подавляемого шума
const PROP_DECREASE: f32 = 0.8;

pub struct NoiseReductionSeparator {
    gate: SpectralGate,
}

impl NoiseReductionSeparator {
    pub fn new(gate: SpectralGate) -> Self {
        Self { gate }
    }

    /// Синхронная часть: чтение, шумоподавление, запись стемов.
    ///
    /// `workdir` должен существовать.
    pub fn separate_blocking(&self, audio: &Path, workdir: &Path) -> Result<Stems> {
        let input = read_audio_file(audio)?.to_mono();
        if input.is_empty() {
            return Err(DubError::Separation(format!(
                "{} contains no samples",
                audio.display()
            )));
        }

        let vocals = self.gate.reduce_noise(&input.samples, input.sample_rate);
        let background: Vec<f32> = input
            .samples
            .iter()
            .zip(&vocals)
            .map(|(original, voice)| original - voice)
            .collect();

        let vocals_path = workdir.join("vocals_simple.wav");
        let background_path = workdir.join("background_simple.wav");
        let rate = input.sample_rate;
        let duration = input.duration_secs();

        write_wav(&AudioBuffer::mono(vocals, rate), &vocals_path)?;
        write_wav(&AudioBuffer::mono(background, rate), &background_path)?;

        info!("Noise-reduction separation wrote stems to {}", workdir.display());
        Ok(Stems {
            vocals: MediaAsset::audio(vocals_path, rate, 1, duration),
            background: MediaAsset::audio(background_path, rate, 1, duration),
        })
    }
}

impl Default for NoiseReductionSeparator {
    fn default() -> Self {
        Self::new(SpectralGate::new(PROP_DECREASE))
    }
}

#[async_trait::async_trait]
impl SeparationEngine for NoiseReductionSeparator {
    fn name(&self) -> &str {
        "noise-reduction"
    }

    async fn separate(&self, audio: &MediaAsset, workdir: &Path) -> Result<Stems> {
        let gate = self.gate.clone();
        let audio = audio.path().to_path_buf();
        let workdir = workdir.to_path_buf();

        tokio::task::spawn_blocking(move || {
            NoiseReductionSeparator::new(gate).separate_blocking(&audio, &workdir)
        })
        .await
        .map_err(|e| DubError::Separation(format!("separation task failed: {}", e)))?
    }
}
