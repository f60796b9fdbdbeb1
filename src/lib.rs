//! Основной файл библиотеки dub-sync
//!
//! Дубляж видео на другой язык с сохранением тембра и эмоциональной окраски
//! голоса диктора и, по желанию, фоновых звуков. Точка входа:
//! [`DubbingPipeline::run`] с общим для всех запусков [`DubbingServices`].

pub mod config;
pub mod dsp;
pub mod emotion;
pub mod engines;
pub mod error;
pub mod media;
pub mod mixer;
pub mod notification;
pub mod pipeline;
pub mod progress;
pub mod separation;
pub mod synthesis;
pub mod types;
pub mod utils;

#[cfg(test)]
mod tests;

pub use config::DubConfig;
pub use emotion::{Emotion, EmotionProfile};
pub use error::{DubError, ErrorKind, Result};
pub use pipeline::{DubbingPipeline, DubbingServices};
pub use progress::{PipelineStage, ProgressInfo, ProgressObserver, ProgressReporter};
pub use types::{DubRequest, DubResult, MediaAsset, Stems, Transcript};

use std::sync::Arc;

/// Дубляж одного видео с конфигурацией из переменных окружения
pub async fn dub_video(request: DubRequest) -> Result<DubResult> {
    let services = DubbingServices::from_config(DubConfig::from_env())?;
    DubbingPipeline::new(Arc::new(services)).run(request).await
}
