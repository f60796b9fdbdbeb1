//! Emotion detection and emotion-conditioned audio shaping.
//!
//! Analysis maps four whole-clip acoustic features to one of five labels.
//! Each label has a fixed parameter vector which is later applied, at half
//! strength for speed and pitch and 30% strength for energy, to the
//! synthesized voice.

mod analyzer;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use analyzer::EmotionAnalyzer;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Emotion {
    Neutral,
    Happy,
    Sad,
    Angry,
    Excited,
}

impl Emotion {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Neutral => "neutral",
            Self::Happy => "happy",
            Self::Sad => "sad",
            Self::Angry => "angry",
            Self::Excited => "excited",
        }
    }
}

impl fmt::Display for Emotion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Label plus the prosody parameters derived from it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EmotionProfile {
    pub label: Emotion,
    /// Speaking-rate multiplier, always positive.
    pub speed: f32,
    pub pitch_semitones: f32,
    pub energy_gain: f32,
}

impl EmotionProfile {
    pub fn for_label(label: Emotion) -> Self {
        let (speed, pitch_semitones, energy_gain) = match label {
            Emotion::Neutral => (1.0, 0.0, 1.0),
            Emotion::Happy => (1.1, 2.0, 1.2),
            Emotion::Sad => (0.9, -2.0, 0.8),
            Emotion::Angry => (1.15, 1.0, 1.3),
            Emotion::Excited => (1.2, 3.0, 1.4),
        };
        Self {
            label,
            speed,
            pitch_semitones,
            energy_gain,
        }
    }

    pub fn neutral() -> Self {
        Self::for_label(Emotion::Neutral)
    }

    /// Softened time-stretch rate applied to synthesized speech.
    pub fn stretch_rate(&self) -> f32 {
        1.0 + (self.speed - 1.0) * 0.5
    }

    /// Softened pitch shift in semitones.
    pub fn pitch_steps(&self) -> f32 {
        self.pitch_semitones * 0.5
    }

    /// Softened amplitude factor.
    pub fn energy_factor(&self) -> f32 {
        1.0 + (self.energy_gain - 1.0) * 0.3
    }
}

impl Default for EmotionProfile {
    fn default() -> Self {
        Self::neutral()
    }
}

/// Whole-clip averages used for classification.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AcousticFeatures {
    pub tempo_bpm: f32,
    pub spectral_centroid_hz: f32,
    pub rms: f32,
    pub zero_crossing_rate: f32,
}

/// Ordered rules, first match wins.
pub fn classify(features: &AcousticFeatures) -> Emotion {
    let AcousticFeatures {
        tempo_bpm: tempo,
        spectral_centroid_hz: centroid,
        rms,
        zero_crossing_rate: zcr,
    } = *features;

    if tempo > 140.0 && rms > 0.05 {
        Emotion::Excited
    } else if tempo > 120.0 && centroid > 2000.0 {
        Emotion::Happy
    } else if tempo < 80.0 && rms < 0.03 {
        Emotion::Sad
    } else if rms > 0.06 && zcr > 0.1 {
        Emotion::Angry
    } else {
        Emotion::Neutral
    }
}
