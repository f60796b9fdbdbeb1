//! Сценарные тесты конвейера на подставных движках

mod test_separation;

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::config::DubConfig;
use crate::emotion::EmotionAnalyzer;
use crate::engines::{Transcriber, Translator};
use crate::error::{DubError, Result};
use crate::media::audio::{write_wav, AudioBuffer};
use crate::media::{MediaTool, EXTRACT_SAMPLE_RATE};
use crate::mixer::{AudioMixer, Mixer};
use crate::pipeline::DubbingServices;
use crate::separation::{NoiseReductionSeparator, SeparationEngine, SourceSeparator};
use crate::synthesis::{SpeechEngine, SynthesisRequest, VoiceSynthesizer};
use crate::types::{MediaAsset, Stems, Transcript};

pub(crate) fn tone(freq: f32, rate: u32, secs: f32, amp: f32) -> Vec<f32> {
    (0..(rate as f32 * secs) as usize)
        .map(|i| (2.0 * std::f32::consts::PI * freq * i as f32 / rate as f32).sin() * amp)
        .collect()
}

/// Речь-заглушка: тон с паузами, чтобы у сигнала была огибающая
pub(crate) fn speech_like(rate: u32, secs: f32) -> Vec<f32> {
    tone(220.0, rate, secs, 0.4)
        .into_iter()
        .enumerate()
        .map(|(i, s)| if (i / (rate as usize / 4)) % 2 == 0 { s } else { s * 0.05 })
        .collect()
}

/// ffmpeg-заглушка: «извлекает» синтетическую речь и «собирает» видео копированием дорожки
#[derive(Default)]
pub(crate) struct FakeMedia {
    pub remuxed: Mutex<Vec<(PathBuf, PathBuf)>>,
}

#[async_trait::async_trait]
impl MediaTool for FakeMedia {
    async fn extract_audio(&self, _video: &Path, output: &Path) -> Result<(MediaAsset, f64)> {
        let buffer = AudioBuffer::mono(speech_like(EXTRACT_SAMPLE_RATE, 3.0), EXTRACT_SAMPLE_RATE);
        write_wav(&buffer, output)?;
        let duration = buffer.duration_secs();
        Ok((
            MediaAsset::audio(output, EXTRACT_SAMPLE_RATE, 1, duration),
            duration,
        ))
    }

    async fn remux(&self, _video: &Path, audio: &Path, output: &Path) -> Result<PathBuf> {
        if let Some(parent) = output.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::copy(audio, output)?;
        self.remuxed
            .lock()
            .unwrap()
            .push((audio.to_path_buf(), output.to_path_buf()));
        Ok(output.to_path_buf())
    }
}

/// Media, у которого в видео нет аудиодорожки
pub(crate) struct SilentVideoMedia;

#[async_trait::async_trait]
impl MediaTool for SilentVideoMedia {
    async fn extract_audio(&self, video: &Path, _output: &Path) -> Result<(MediaAsset, f64)> {
        Err(DubError::Media(format!("{} has no audio stream", video.display())))
    }

    async fn remux(&self, _video: &Path, _audio: &Path, _output: &Path) -> Result<PathBuf> {
        Err(DubError::Media("unreachable".to_string()))
    }
}

/// Движок разделения, который всегда падает
pub(crate) struct FailingSeparator;

#[async_trait::async_trait]
impl SeparationEngine for FailingSeparator {
    fn name(&self) -> &str {
        "failing"
    }

    async fn separate(&self, _audio: &MediaAsset, _workdir: &Path) -> Result<Stems> {
        Err(DubError::Separation("model crashed".to_string()))
    }
}

pub(crate) struct CannedTranscriber {
    pub text: String,
}

#[async_trait::async_trait]
impl Transcriber for CannedTranscriber {
    async fn transcribe(&self, _audio: &MediaAsset) -> Result<Transcript> {
        Transcript::new(&self.text, "en")
    }
}

#[derive(Default)]
pub(crate) struct CannedTranslator {
    pub calls: Mutex<Vec<(String, String, String)>>,
}

#[async_trait::async_trait]
impl Translator for CannedTranslator {
    async fn translate(&self, text: &str, source: &str, target: &str) -> Result<String> {
        self.calls
            .lock()
            .unwrap()
            .push((text.to_string(), source.to_string(), target.to_string()));
        Ok("Hola a todos. Bienvenidos.".to_string())
    }
}

/// Голосовой движок: полсекунды тона на 22.05 кГц на каждое предложение
pub(crate) struct CannedVoice;

#[async_trait::async_trait]
impl SpeechEngine for CannedVoice {
    async fn synthesize(&self, request: &SynthesisRequest) -> Result<AudioBuffer> {
        if !request.reference.exists() {
            return Err(DubError::Synthesis("reference voice is missing".to_string()));
        }
        Ok(AudioBuffer::mono(tone(330.0, 22050, 0.5, 0.3), 22050))
    }
}

/// Микшер со счётчиком вызовов
#[derive(Default)]
pub(crate) struct CountingMixer {
    pub calls: AtomicUsize,
}

impl CountingMixer {
    pub fn count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Mixer for CountingMixer {
    fn mix(&self, vocals: &AudioBuffer, background: &AudioBuffer, gain: f32) -> Result<AudioBuffer> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        AudioMixer.mix(vocals, background, gain)
    }
}

/// Каталоги одного теста: видео, рабочий корень и каталог результатов
pub(crate) struct Scratch {
    pub dir: tempfile::TempDir,
    pub video: PathBuf,
    pub work_root: PathBuf,
    pub output_dir: PathBuf,
}

impl Scratch {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let video = dir.path().join("clip.mp4");
        std::fs::write(&video, b"not really a video").unwrap();
        let work_root = dir.path().join("work");
        std::fs::create_dir_all(&work_root).unwrap();
        Self {
            video,
            work_root,
            output_dir: dir.path().join("out"),
            dir,
        }
    }

    pub fn config(&self) -> DubConfig {
        DubConfig {
            work_root: Some(self.work_root.clone()),
            output_dir: self.output_dir.clone(),
            ..DubConfig::default()
        }
    }

    /// Сколько записей осталось в рабочем корне
    pub fn leftovers(&self) -> usize {
        std::fs::read_dir(&self.work_root).unwrap().count()
    }
}

/// Сервисы на подставных движках; разделение через настоящее шумоподавление
pub(crate) fn fake_services(
    config: DubConfig,
    media: Arc<dyn MediaTool>,
    transcriber: Arc<dyn Transcriber>,
    mixer: Arc<dyn Mixer>,
) -> DubbingServices {
    DubbingServices {
        media,
        separator: SourceSeparator::new(
            Some(Arc::new(FailingSeparator)),
            Arc::new(NoiseReductionSeparator::default()),
        ),
        emotion: EmotionAnalyzer::new(config.analysis.clone()),
        transcriber,
        translator: Arc::new(CannedTranslator::default()),
        synthesizer: VoiceSynthesizer::new(Arc::new(CannedVoice), config.synthesis.crossfade_ms),
        mixer,
        config,
    }
}
