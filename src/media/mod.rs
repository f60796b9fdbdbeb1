//! Модуль для работы с медиафайлами
//!
//! Извлечение аудиодорожки из видео, обратное сведение видео с новой
//! дорожкой, а также чтение/запись аудио в памяти.

pub mod audio;
pub mod video;

use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::types::MediaAsset;

pub use audio::AudioBuffer;
pub use video::FfmpegMedia;

/// Частота дискретизации извлечённой дорожки
pub const EXTRACT_SAMPLE_RATE: u32 = 16000;

/// Операции над видеоконтейнером
#[async_trait::async_trait]
pub trait MediaTool: Send + Sync {
    /// Извлечь аудио в моно 16 кГц 16-бит WAV; возвращает файл и длительность в секундах
    async fn extract_audio(&self, video: &Path, output: &Path) -> Result<(MediaAsset, f64)>;

    /// Заменить аудиодорожку видео, копируя видеопоток без перекодирования
    async fn remux(&self, video: &Path, audio: &Path, output: &Path) -> Result<PathBuf>;
}
