//! Общие типы данных конвейера дубляжа

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::emotion::Emotion;
use crate::error::{DubError, Result};

/// Путь к медиафайлу и известные о нём метаданные
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaAsset {
    pub path: PathBuf,
    /// Длительность в секундах
    pub duration_secs: Option<f64>,
    pub sample_rate: Option<u32>,
    pub channels: Option<u16>,
}

impl MediaAsset {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            duration_secs: None,
            sample_rate: None,
            channels: None,
        }
    }

    /// Аудиофайл с известным форматом PCM
    pub fn audio(path: impl Into<PathBuf>, sample_rate: u32, channels: u16, duration_secs: f64) -> Self {
        Self {
            path: path.into(),
            duration_secs: Some(duration_secs),
            sample_rate: Some(sample_rate),
            channels: Some(channels),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }
}

/// Вокал и фон, полученные разделением
#[derive(Debug, Clone, PartialEq)]
pub struct Stems {
    pub vocals: MediaAsset,
    pub background: MediaAsset,
}

/// Результат распознавания речи
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transcript {
    text: String,
    source_language: String,
}

impl Transcript {
    /// Создать расшифровку; пустой после обрезки пробелов текст означает отсутствие речи
    pub fn new(text: impl AsRef<str>, source_language: impl Into<String>) -> Result<Self> {
        let text = text.as_ref().trim();
        if text.is_empty() {
            return Err(DubError::NoSpeech);
        }
        Ok(Self {
            text: text.to_string(),
            source_language: source_language.into(),
        })
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn source_language(&self) -> &str {
        &self.source_language
    }
}

/// Запрос на дубляж одного видео
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DubRequest {
    pub video_path: PathBuf,
    pub target_language: String,
    pub keep_background: bool,
    /// Куда сохранить результат; по умолчанию в output_dir конфигурации
    pub output_path: Option<PathBuf>,
}

impl DubRequest {
    pub fn new(video_path: impl Into<PathBuf>, target_language: impl Into<String>) -> Self {
        Self {
            video_path: video_path.into(),
            target_language: target_language.into(),
            keep_background: true,
            output_path: None,
        }
    }

    pub fn keep_background(mut self, keep: bool) -> Self {
        self.keep_background = keep;
        self
    }

    pub fn output_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_path = Some(path.into());
        self
    }

    /// Путь к результату: явный или `<output_dir>/dubbed_<имя видео>_<язык>_<запуск>.mp4`
    pub fn resolve_output_path(&self, output_dir: &Path, run_id: &str) -> PathBuf {
        if let Some(path) = &self.output_path {
            return path.clone();
        }
        let stem = self
            .video_path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "video".to_string());
        output_dir.join(format!(
            "dubbed_{}_{}_{}.mp4",
            stem, self.target_language, run_id
        ))
    }
}

/// Результат успешного дубляжа
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DubResult {
    pub output_path: PathBuf,
    pub speaker_count: u32,
    pub emotion: Emotion,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transcript_rejects_blank_text() {
        assert!(matches!(Transcript::new("", "en"), Err(DubError::NoSpeech)));
        assert!(matches!(Transcript::new("  \n\t ", "en"), Err(DubError::NoSpeech)));

        let transcript = Transcript::new("  hola mundo ", "es").unwrap();
        assert_eq!(transcript.text(), "hola mundo");
        assert_eq!(transcript.source_language(), "es");
    }

    #[test]
    fn test_default_output_path() {
        let request = DubRequest::new("/videos/clip.mov", "fr");
        assert_eq!(
            request.resolve_output_path(Path::new("out"), "3f2a9c"),
            PathBuf::from("out/dubbed_clip_fr_3f2a9c.mp4")
        );

        let explicit = request.output_path("/tmp/result.mp4");
        assert_eq!(
            explicit.resolve_output_path(Path::new("out"), "3f2a9c"),
            PathBuf::from("/tmp/result.mp4")
        );
    }
}
