//! Сведение дублированного голоса с фоном

use log::{debug, info};

use crate::error::Result;
use crate::media::audio::{normalize_peak, resample, AudioBuffer};

/// Пиковый уровень итогового микса
const MIX_PEAK: f32 = 0.95;

/// Сведение вокала и фона
pub trait Mixer: Send + Sync {
    fn mix(&self, vocals: &AudioBuffer, background: &AudioBuffer, background_gain: f32)
        -> Result<AudioBuffer>;
}

/// Стандартный микшер: моно, общая частота, длина по кратчайшей дорожке, нормализация пика
#[derive(Debug, Default, Clone, Copy)]
pub struct AudioMixer;

impl Mixer for AudioMixer {
    fn mix(
        &self,
        vocals: &AudioBuffer,
        background: &AudioBuffer,
        background_gain: f32,
    ) -> Result<AudioBuffer> {
        let vocals = vocals.to_mono();
        let rate = vocals.sample_rate;

        let background = background.to_mono();
        let background_samples = if background.sample_rate != rate {
            debug!(
                "Resampling background {} Hz -> {} Hz",
                background.sample_rate, rate
            );
            resample(&background.samples, background.sample_rate, rate)?
        } else {
            background.samples
        };

        let len = vocals.samples.len().min(background_samples.len());
        let mut mixed: Vec<f32> = vocals.samples[..len]
            .iter()
            .zip(&background_samples[..len])
            .map(|(v, b)| v + b * background_gain)
            .collect();

        // Тишина остаётся тишиной
        normalize_peak(&mut mixed, MIX_PEAK);

        info!(
            "Mixed audio: {} samples, background at {}%",
            len,
            (background_gain * 100.0).round()
        );
        Ok(AudioBuffer::mono(mixed, rate))
    }
}
