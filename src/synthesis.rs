//! Синтез переведённой речи голосом исходного диктора
//!
//! Текст режется на предложения, каждое озвучивается движком клонирования
//! голоса с референсным вокалом, фрагменты склеиваются коротким кроссфейдом.
//! Эмоциональная окраска применяется позже, в [`crate::emotion::EmotionAnalyzer::apply`].

use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{debug, info};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{DubError, Result};
use crate::media::audio::{crossfade, resample, AudioBuffer};

/// Конец предложения: знак препинания, за которым пробел или конец текста
static SENTENCE_END: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"[.!?…。！？]+(?:\s+|$)").ok());

/// Запрос на озвучивание одного фрагмента текста
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesisRequest {
    pub text: String,
    /// Код целевого языка
    pub language: String,
    /// Референсный клип с тембром голоса
    pub reference: PathBuf,
    pub speed: f32,
}

/// Движок клонирования голоса
#[async_trait::async_trait]
pub trait SpeechEngine: Send + Sync {
    async fn synthesize(&self, request: &SynthesisRequest) -> Result<AudioBuffer>;
}

/// Разбить текст на предложения; пустые куски отбрасываются
pub fn split_sentences(text: &str) -> Vec<String> {
    let text = text.trim();
    if text.is_empty() {
        return Vec::new();
    }

    let Some(pattern) = SENTENCE_END.as_ref() else {
        return vec![text.to_string()];
    };

    let mut sentences = Vec::new();
    let mut start = 0;
    for m in pattern.find_iter(text) {
        let sentence = text[start..m.end()].trim();
        if !sentence.is_empty() {
            sentences.push(sentence.to_string());
        }
        start = m.end();
    }
    let rest = text[start..].trim();
    if !rest.is_empty() {
        sentences.push(rest.to_string());
    }
    sentences
}

pub struct VoiceSynthesizer {
    engine: Arc<dyn SpeechEngine>,
    crossfade_ms: u32,
}

impl VoiceSynthesizer {
    pub fn new(engine: Arc<dyn SpeechEngine>, crossfade_ms: u32) -> Self {
        Self {
            engine,
            crossfade_ms,
        }
    }

    /// Озвучить текст голосом из `reference`
    pub async fn synthesize(
        &self,
        text: &str,
        language: &str,
        reference: &Path,
        speed: f32,
    ) -> Result<AudioBuffer> {
        let sentences = split_sentences(text);
        if sentences.is_empty() {
            return Err(DubError::Synthesis("nothing to synthesize".to_string()));
        }
        info!("Synthesizing {} sentences in {}", sentences.len(), language);

        let mut sample_rate = 0;
        let mut joined: Vec<f32> = Vec::new();

        for (index, sentence) in sentences.into_iter().enumerate() {
            let request = SynthesisRequest {
                text: sentence,
                language: language.to_string(),
                reference: reference.to_path_buf(),
                speed,
            };
            let segment = self
                .engine
                .synthesize(&request)
                .await
                .map_err(|e| match e {
                    DubError::Synthesis(_) => e,
                    other => DubError::Synthesis(other.to_string()),
                })?
                .to_mono();

            if segment.is_empty() {
                debug!("Sentence {} produced no audio", index + 1);
                continue;
            }

            let samples = if sample_rate == 0 {
                sample_rate = segment.sample_rate;
                segment.samples
            } else if segment.sample_rate != sample_rate {
                debug!(
                    "Resampling sentence {} from {} Hz to {} Hz",
                    index + 1,
                    segment.sample_rate,
                    sample_rate
                );
                resample(&segment.samples, segment.sample_rate, sample_rate)?
            } else {
                segment.samples
            };

            let overlap = (sample_rate as u64 * self.crossfade_ms as u64 / 1000) as usize;
            joined = crossfade(&joined, &samples, overlap);
        }

        if joined.is_empty() {
            return Err(DubError::Synthesis(
                "voice engine returned no audio".to_string(),
            ));
        }

        let result = AudioBuffer::mono(joined, sample_rate);
        info!("Synthesized {:.2}s of speech", result.duration_secs());
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Движок, возвращающий по 1000 отсчётов на предложение
    struct CannedEngine {
        rates: Vec<u32>,
        calls: Mutex<Vec<SynthesisRequest>>,
    }

    impl CannedEngine {
        fn new(rates: Vec<u32>) -> Self {
            Self {
                rates,
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait::async_trait]
    impl SpeechEngine for CannedEngine {
        async fn synthesize(&self, request: &SynthesisRequest) -> Result<AudioBuffer> {
            let mut calls = self.calls.lock().unwrap();
            let rate = self.rates[calls.len() % self.rates.len()];
            calls.push(request.clone());
            Ok(AudioBuffer::mono(vec![0.5; rate as usize / 16], rate))
        }
    }

    struct FailingEngine;

    #[async_trait::async_trait]
    impl SpeechEngine for FailingEngine {
        async fn synthesize(&self, _request: &SynthesisRequest) -> Result<AudioBuffer> {
            Err(DubError::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "server down",
            )))
        }
    }

    #[test]
    fn test_split_sentences() {
        assert_eq!(
            split_sentences("Hola. ¿Qué tal? Bien!"),
            vec!["Hola.", "¿Qué tal?", "Bien!"]
        );
        assert_eq!(split_sentences("Version 1.5 is out"), vec!["Version 1.5 is out"]);
        assert_eq!(split_sentences("Wait... what?!"), vec!["Wait...", "what?!"]);
        assert_eq!(split_sentences("no punctuation"), vec!["no punctuation"]);
        assert!(split_sentences("   ").is_empty());
    }

    #[tokio::test]
    async fn test_segments_are_joined_with_crossfade() {
        let engine = Arc::new(CannedEngine::new(vec![16000]));
        let synthesizer = VoiceSynthesizer::new(engine.clone(), 10);

        let audio = synthesizer
            .synthesize("One. Two. Three.", "en", Path::new("ref.wav"), 1.1)
            .await
            .unwrap();

        // 3 * 1000 отсчётов минус два перекрытия по 160
        assert_eq!(audio.sample_rate, 16000);
        assert_eq!(audio.frames(), 3000 - 2 * 160);

        let calls = engine.calls.lock().unwrap();
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[1].text, "Two.");
        assert_eq!(calls[1].language, "en");
        assert_eq!(calls[1].reference, PathBuf::from("ref.wav"));
        assert_eq!(calls[1].speed, 1.1);
    }

    #[tokio::test]
    async fn test_segments_follow_first_sample_rate() {
        let engine = Arc::new(CannedEngine::new(vec![16000, 32000]));
        let synthesizer = VoiceSynthesizer::new(engine, 0);

        let audio = synthesizer
            .synthesize("One. Two.", "en", Path::new("ref.wav"), 1.0)
            .await
            .unwrap();
        assert_eq!(audio.sample_rate, 16000);
        // второй фрагмент 2000 отсчётов при 32 кГц -> 1000 при 16 кГц
        assert_eq!(audio.frames(), 2000);
    }

    #[tokio::test]
    async fn test_engine_failure_is_synthesis_error() {
        let synthesizer = VoiceSynthesizer::new(Arc::new(FailingEngine), 10);
        let result = synthesizer
            .synthesize("Hola.", "es", Path::new("ref.wav"), 1.0)
            .await;
        assert!(matches!(result, Err(DubError::Synthesis(_))));
    }

    #[tokio::test]
    async fn test_empty_text_is_synthesis_error() {
        let synthesizer = VoiceSynthesizer::new(Arc::new(CannedEngine::new(vec![16000])), 10);
        let result = synthesizer.synthesize("  ", "es", Path::new("ref.wav"), 1.0).await;
        assert!(matches!(result, Err(DubError::Synthesis(_))));
    }
}
