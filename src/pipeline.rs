//! Конвейер дубляжа
//!
//! Этапы выполняются строго последовательно. Все промежуточные файлы живут
//! в каталоге запуска и удаляются и при успехе, и при ошибке; при ошибке
//! вызывающей стороне возвращается исходная ошибка этапа.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info};

use crate::config::DubConfig;
use crate::emotion::EmotionAnalyzer;
use crate::engines::{OpenAiTranscriber, OpenAiTranslator, Transcriber, Translator, XttsClient};
use crate::error::{DubError, ErrorKind, Result};
use crate::media::audio::{read_audio_file, write_wav};
use crate::media::{FfmpegMedia, MediaTool};
use crate::mixer::{AudioMixer, Mixer};
use crate::progress::{PipelineStage, ProgressReporter, ProgressTracker};
use crate::separation::{estimate_speaker_count_file, SourceSeparator};
use crate::synthesis::VoiceSynthesizer;
use crate::types::{DubRequest, DubResult};
use crate::utils::TempArtifactSet;

/// Долгоживущие движки, общие для всех запусков
pub struct DubbingServices {
    pub config: DubConfig,
    pub media: Arc<dyn MediaTool>,
    pub separator: SourceSeparator,
    pub emotion: EmotionAnalyzer,
    pub transcriber: Arc<dyn Transcriber>,
    pub translator: Arc<dyn Translator>,
    pub synthesizer: VoiceSynthesizer,
    pub mixer: Arc<dyn Mixer>,
}

impl DubbingServices {
    /// Создать все движки по конфигурации (один раз на процесс)
    pub fn from_config(config: DubConfig) -> Result<Self> {
        config.validate()?;

        let media = FfmpegMedia::new(&config.ffmpeg);
        if !media.is_available() {
            return Err(DubError::Configuration(format!(
                "ffmpeg not found at '{}'",
                config.ffmpeg.ffmpeg_path
            )));
        }

        let speech_engine = Arc::new(XttsClient::new(&config.synthesis)?);
        let services = Self {
            media: Arc::new(media),
            separator: SourceSeparator::from_config(&config),
            emotion: EmotionAnalyzer::new(config.analysis.clone()),
            transcriber: Arc::new(OpenAiTranscriber::new(&config.openai)?),
            translator: Arc::new(OpenAiTranslator::new(&config.openai)?),
            synthesizer: VoiceSynthesizer::new(speech_engine, config.synthesis.crossfade_ms),
            mixer: Arc::new(AudioMixer),
            config,
        };
        info!("Dubbing services initialized");
        Ok(services)
    }
}

/// Конвейер дубляжа; один экземпляр обслуживает параллельные запуски
pub struct DubbingPipeline {
    services: Arc<DubbingServices>,
    reporter: Option<Arc<dyn ProgressReporter>>,
}

impl DubbingPipeline {
    pub fn new(services: Arc<DubbingServices>) -> Self {
        Self {
            services,
            reporter: None,
        }
    }

    /// Отправлять события смены этапов в `reporter`
    pub fn with_progress_reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.reporter = Some(reporter);
        self
    }

    pub fn services(&self) -> &DubbingServices {
        &self.services
    }

    /// Проверка запроса до создания каких-либо артефактов
    pub fn validate_request(&self, request: &DubRequest) -> Result<()> {
        let config = &self.services.config;
        let path = &request.video_path;

        let metadata = std::fs::metadata(path).map_err(|_| {
            DubError::InvalidRequest(format!("video file not found: {}", path.display()))
        })?;
        if !metadata.is_file() {
            return Err(DubError::InvalidRequest(format!(
                "not a file: {}",
                path.display()
            )));
        }

        let limit = config.max_video_size_mb.saturating_mul(1024 * 1024);
        if metadata.len() > limit {
            return Err(DubError::InvalidRequest(format!(
                "video is {:.1} MB, the limit is {} MB",
                metadata.len() as f64 / (1024.0 * 1024.0),
                config.max_video_size_mb
            )));
        }

        if !config.is_language_supported(&request.target_language) {
            return Err(DubError::InvalidRequest(format!(
                "unsupported target language '{}'",
                request.target_language
            )));
        }
        Ok(())
    }

    /// Выполнить дубляж одного видео
    pub async fn run(&self, request: DubRequest) -> Result<DubResult> {
        let mut tracker = ProgressTracker::new(self.reporter.clone());
        info!(
            "Starting dubbing of {} into {}",
            request.video_path.display(),
            request.target_language
        );

        if let Err(e) = self.validate_request(&request) {
            error!("Rejected dubbing request: {}", e);
            tracker.transition(PipelineStage::Failed, Some(e.to_string()));
            return Err(e);
        }

        let mut artifacts = match TempArtifactSet::new(self.services.config.work_root.as_deref()) {
            Ok(artifacts) => artifacts,
            Err(e) => {
                error!("Cannot create working directory: {}", e);
                tracker.transition(PipelineStage::Failed, Some(e.to_string()));
                return Err(e);
            }
        };

        let outcome = self.execute(&request, &mut artifacts, &mut tracker).await;

        match &outcome {
            Ok(_) => tracker.transition(PipelineStage::CleaningUp, None),
            Err(e) => tracker.abort(e.to_string()),
        };
        let report = artifacts.cleanup();
        debug!(
            "Run {} cleanup: {} removed, {} already gone, {} failed",
            artifacts.run_id(),
            report.removed,
            report.missing,
            report.failed
        );

        match outcome {
            Ok(result) => {
                tracker.transition(PipelineStage::Done, None);
                info!(
                    "Dubbing finished: {} (speakers: {}, emotion: {})",
                    result.output_path.display(),
                    result.speaker_count,
                    result.emotion
                );
                Ok(result)
            }
            Err(e) => {
                tracker.transition(PipelineStage::Failed, Some(e.to_string()));
                error!("Dubbing failed: {}", e);
                Err(e)
            }
        }
    }

    /// Синхронный вариант `run` со своим рантаймом; нельзя вызывать изнутри tokio
    pub fn run_blocking(&self, request: DubRequest) -> Result<DubResult> {
        if tokio::runtime::Handle::try_current().is_ok() {
            return Err(DubError::Configuration(
                "run_blocking called from inside a tokio runtime, use run().await".to_string(),
            ));
        }
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()?;
        runtime.block_on(self.run(request))
    }

    /// `run` с ограничением по времени.
    ///
    /// По истечении срока future запуска уничтожается: дочерние процессы
    /// убиваются, временные файлы удаляются при drop.
    pub async fn run_with_timeout(&self, request: DubRequest, timeout: Duration) -> Result<DubResult> {
        match tokio::time::timeout(timeout, self.run(request)).await {
            Ok(result) => result,
            Err(_) => {
                error!("Dubbing timed out after {:.1}s", timeout.as_secs_f64());
                Err(DubError::Timeout(timeout.as_secs_f64()))
            }
        }
    }

    async fn execute(
        &self,
        request: &DubRequest,
        artifacts: &mut TempArtifactSet,
        tracker: &mut ProgressTracker,
    ) -> Result<DubResult> {
        let services = &self.services;

        // 1. Извлечение аудио
        tracker.transition(PipelineStage::ExtractingAudio, None);
        let audio_path = artifacts.create_path("audio", "wav");
        let (audio, duration) = services
            .media
            .extract_audio(&request.video_path, &audio_path)
            .await?;
        info!("Extracted {:.1}s of audio", duration);

        // 2. Оценка числа дикторов
        tracker.transition(PipelineStage::DetectingSpeakers, None);
        let speaker_source = audio.path.clone();
        let speaker_count =
            blocking_stage(move || estimate_speaker_count_file(&speaker_source)).await?;

        // 3. Разделение на вокал и фон
        tracker.transition(PipelineStage::Separating, None);
        let separation_dir = artifacts.create_dir("separation")?;
        let stems = services.separator.separate(&audio, &separation_dir).await?;
        artifacts.track(stems.vocals.path());
        artifacts.track(stems.background.path());

        // 4. Эмоция исходного голоса
        tracker.transition(PipelineStage::AnalyzingEmotion, None);
        let analyzer = services.emotion.clone();
        let vocals_path = stems.vocals.path.clone();
        let profile = blocking_stage(move || analyzer.analyze_file(&vocals_path)).await?;

        // 5. Распознавание
        tracker.transition(PipelineStage::Transcribing, None);
        let transcript = services
            .transcriber
            .transcribe(&stems.vocals)
            .await
            .map_err(|e| stage_error(e, DubError::Transcription))?;

        // 6. Перевод
        tracker.transition(PipelineStage::Translating, None);
        let translated = services
            .translator
            .translate(
                transcript.text(),
                transcript.source_language(),
                &request.target_language,
            )
            .await
            .map_err(|e| stage_error(e, DubError::Translation))?;
        if translated.trim().is_empty() {
            return Err(DubError::Translation(
                "translation is empty".to_string(),
            ));
        }

        // 7. Синтез голосом исходного диктора и эмоциональная окраска
        tracker.transition(PipelineStage::Synthesizing, Some(profile.label.to_string()));
        let raw_speech = services
            .synthesizer
            .synthesize(
                &translated,
                &request.target_language,
                stems.vocals.path(),
                profile.speed,
            )
            .await?;

        let analyzer = services.emotion.clone();
        let dubbed_path = artifacts.create_path("dubbed_vocals", "wav");
        let dubbed_target = dubbed_path.clone();
        let dubbed = blocking_stage(move || {
            let shaped = analyzer.apply(&raw_speech, &profile)?;
            write_wav(&shaped, &dubbed_target)?;
            Ok(shaped)
        })
        .await?;

        // 8. Сведение с фоном (необязательно)
        let final_audio = if request.keep_background && stems.background.exists() {
            tracker.transition(PipelineStage::Mixing, None);
            let mixer = services.mixer.clone();
            let background_path = stems.background.path.clone();
            let gain = services.config.background_gain;
            let mixed_path = artifacts.create_path("final_audio", "wav");
            let mixed_target = mixed_path.clone();
            blocking_stage(move || {
                let background = read_audio_file(&background_path)?;
                let mixed = mixer.mix(&dubbed, &background, gain)?;
                write_wav(&mixed, &mixed_target)
            })
            .await?;
            mixed_path
        } else {
            info!("Background mix skipped, using dubbed vocals only");
            dubbed_path
        };

        // 9. Сборка итогового видео
        tracker.transition(PipelineStage::Remuxing, None);
        let output_path: PathBuf =
            request.resolve_output_path(&services.config.output_dir, artifacts.run_id());
        let output_path = services
            .media
            .remux(&request.video_path, &final_audio, &output_path)
            .await?;

        Ok(DubResult {
            output_path,
            speaker_count,
            emotion: profile.label,
        })
    }
}

/// Транспортные ошибки движка относятся к этапу, на котором они возникли
fn stage_error(error: DubError, wrap: fn(String) -> DubError) -> DubError {
    match error.kind() {
        ErrorKind::Internal => wrap(error.to_string()),
        _ => error,
    }
}

/// CPU-этап в пуле блокирующих задач tokio
async fn blocking_stage<T, F>(task: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(task)
        .await
        .map_err(|e| DubError::AudioProcessing(format!("processing task failed: {}", e)))?
}
