use std::path::Path;

use log::{debug, info};

use super::{classify, AcousticFeatures, EmotionProfile};
use crate::config::AnalysisConfig;
use crate::dsp::features::{
    estimate_tempo, frame_rms, mean, onset_envelope, spectral_centroid, zero_crossing_rate,
};
use crate::dsp::{pitch_shift, time_stretch, Stft};
use crate::error::Result;
use crate::media::audio::{normalize_peak, read_audio_file, AudioBuffer};

/// Peak level after emotion shaping.
const APPLY_PEAK: f32 = 0.98;
/// Centre of the tempo prior.
const START_BPM: f32 = 120.0;

#[derive(Debug, Clone)]
pub struct EmotionAnalyzer {
    config: AnalysisConfig,
}

impl EmotionAnalyzer {
    pub fn new(config: AnalysisConfig) -> Self {
        Self { config }
    }

    /// Features of a mono clip resampled to the analysis rate.
    pub fn extract_features(&self, audio: &AudioBuffer) -> Result<AcousticFeatures> {
        let rate = self.config.sample_rate;
        let n_fft = self.config.n_fft;
        let hop = self.config.hop_length;
        let clip = audio.to_mono_at(rate)?;

        let stft = Stft::new(n_fft, hop);
        let frames = stft.forward(&clip.samples);

        let features = AcousticFeatures {
            tempo_bpm: estimate_tempo(&onset_envelope(&frames), rate, hop, START_BPM),
            spectral_centroid_hz: mean(&spectral_centroid(&frames, &stft, rate)),
            rms: mean(&frame_rms(&clip.samples, n_fft, hop)),
            zero_crossing_rate: mean(&zero_crossing_rate(&clip.samples, n_fft, hop)),
        };
        debug!("Acoustic features: {:?}", features);
        Ok(features)
    }

    pub fn analyze(&self, audio: &AudioBuffer) -> Result<EmotionProfile> {
        let features = self.extract_features(audio)?;
        let label = classify(&features);

        info!(
            "Detected emotion {}: tempo {:.1} BPM, energy {:.3}, centroid {:.1} Hz, zcr {:.3}",
            label,
            features.tempo_bpm,
            features.rms,
            features.spectral_centroid_hz,
            features.zero_crossing_rate
        );
        Ok(EmotionProfile::for_label(label))
    }

    pub fn analyze_file(&self, path: &Path) -> Result<EmotionProfile> {
        let audio = read_audio_file(path)?;
        self.analyze(&audio)
    }

    /// Shape synthesized speech with the profile and peak-normalize it.
    ///
    /// Works at the input's own rate; output is mono. Adjustments at their
    /// neutral value are skipped.
    pub fn apply(&self, audio: &AudioBuffer, profile: &EmotionProfile) -> Result<AudioBuffer> {
        let mono = audio.to_mono();
        let rate = mono.sample_rate;
        let mut samples = mono.samples;

        if profile.speed != 1.0 {
            let stretch = profile.stretch_rate();
            debug!("Time-stretching synthesized speech by {:.3}", stretch);
            samples = time_stretch(&samples, stretch)?;
        }

        if profile.pitch_semitones != 0.0 {
            let steps = profile.pitch_steps();
            debug!("Pitch-shifting synthesized speech by {:.1} semitones", steps);
            samples = pitch_shift(&samples, steps)?;
        }

        if profile.energy_gain != 1.0 {
            let factor = profile.energy_factor();
            samples.iter_mut().for_each(|s| *s *= factor);
        }

        normalize_peak(&mut samples, APPLY_PEAK);
        Ok(AudioBuffer::mono(samples, rate))
    }
}

impl Default for EmotionAnalyzer {
    fn default() -> Self {
        Self::new(AnalysisConfig::default())
    }
}
