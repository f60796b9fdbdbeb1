//! Вспомогательные утилиты: ffmpeg, временные файлы, логирование

pub mod ffmpeg;
pub mod logger;
pub mod temp;

pub use logger::init_logger;
pub use temp::{CleanupReport, TempArtifactSet};
