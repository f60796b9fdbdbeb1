//! Модуль конфигурации библиотеки dub-sync
//!
//! Этот модуль содержит структуры для настройки конвейера дубляжа и внешних движков.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{DubError, Result};

/// Языки, которые умеет синтезировать XTTS v2
const XTTS_LANGUAGES: &[(&str, &str)] = &[
    ("en", "English"),
    ("es", "Spanish"),
    ("fr", "French"),
    ("de", "German"),
    ("it", "Italian"),
    ("pt", "Portuguese"),
    ("pl", "Polish"),
    ("tr", "Turkish"),
    ("ru", "Russian"),
    ("nl", "Dutch"),
    ("cs", "Czech"),
    ("ar", "Arabic"),
    ("zh-cn", "Chinese"),
    ("ja", "Japanese"),
    ("hu", "Hungarian"),
    ("ko", "Korean"),
    ("hi", "Hindi"),
];

/// Пути к ffmpeg и ffprobe
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FfmpegConfig {
    pub ffmpeg_path: String,
    pub ffprobe_path: String,
}

impl Default for FfmpegConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: "ffmpeg".to_string(),
            ffprobe_path: "ffprobe".to_string(),
        }
    }
}

/// Конфигурация для Demucs
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DemucsConfig {
    /// Использовать Demucs как основной способ разделения
    pub enabled: bool,
    /// Исполняемый файл demucs
    pub binary: String,
    /// Имя модели (определяет и подкаталог с результатом)
    pub model: String,
    /// Устройство (cpu, cuda); None - выбор самого Demucs
    pub device: Option<String>,
}

impl Default for DemucsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            binary: "demucs".to_string(),
            model: "htdemucs".to_string(),
            device: None,
        }
    }
}

/// Параметры анализа эмоций
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Частота дискретизации, к которой приводится вокал перед анализом
    pub sample_rate: u32,
    /// Размер окна STFT
    pub n_fft: usize,
    /// Шаг окна
    pub hop_length: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            sample_rate: 22050,
            n_fft: 2048,
            hop_length: 512,
        }
    }
}

/// Настройки OpenAI (распознавание и перевод)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenAiConfig {
    /// API ключ для OpenAI
    pub api_key: String,
    pub base_url: String,
    pub transcription_model: String,
    pub translation_model: String,
    pub timeout_secs: u64,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: "https://api.openai.com/v1".to_string(),
            transcription_model: "whisper-1".to_string(),
            translation_model: "gpt-4o-mini".to_string(),
            timeout_secs: 300,
        }
    }
}

/// Настройки сервера клонирования голоса
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthesisConfig {
    pub endpoint: String,
    pub timeout_secs: u64,
    /// Длительность кроссфейда между предложениями
    pub crossfade_ms: u32,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:8020".to_string(),
            timeout_secs: 300,
            crossfade_ms: 10,
        }
    }
}

/// Конфигурация библиотеки
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DubConfig {
    /// Корневая директория для рабочих каталогов запусков (по умолчанию системная temp)
    pub work_root: Option<PathBuf>,
    /// Директория для готовых видео
    pub output_dir: PathBuf,
    /// Громкость фона при сведении (0.0 - 1.0)
    pub background_gain: f32,
    /// Максимальный размер входного видео
    pub max_video_size_mb: u64,
    /// Поддерживаемые целевые языки: код -> название
    pub supported_languages: BTreeMap<String, String>,
    pub ffmpeg: FfmpegConfig,
    pub demucs: DemucsConfig,
    pub analysis: AnalysisConfig,
    pub openai: OpenAiConfig,
    pub synthesis: SynthesisConfig,
}

impl Default for DubConfig {
    fn default() -> Self {
        Self {
            work_root: None,
            output_dir: PathBuf::from("output"),
            background_gain: 0.5,
            max_video_size_mb: 50,
            supported_languages: XTTS_LANGUAGES
                .iter()
                .map(|(code, name)| (code.to_string(), name.to_string()))
                .collect(),
            ffmpeg: FfmpegConfig::default(),
            demucs: DemucsConfig::default(),
            analysis: AnalysisConfig::default(),
            openai: OpenAiConfig::default(),
            synthesis: SynthesisConfig::default(),
        }
    }
}

impl DubConfig {
    /// Загрузить конфигурацию из JSON файла
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            DubError::Configuration(format!("Cannot read config {}: {}", path.display(), e))
        })?;
        let config: DubConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Конфигурация по умолчанию с переопределениями из переменных окружения
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env();
        config
    }

    /// Применить переменные окружения поверх текущих значений
    pub fn apply_env(&mut self) {
        if let Ok(key) = std::env::var("OPENAI_API_KEY") {
            self.openai.api_key = key;
        }
        if let Ok(root) = std::env::var("DUB_SYNC_WORK_ROOT") {
            self.work_root = Some(PathBuf::from(root));
        }
        if let Ok(dir) = std::env::var("DUB_SYNC_OUTPUT_DIR") {
            self.output_dir = PathBuf::from(dir);
        }
        if let Ok(endpoint) = std::env::var("DUB_SYNC_TTS_ENDPOINT") {
            self.synthesis.endpoint = endpoint;
        }
    }

    /// Проверить согласованность значений
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.background_gain) {
            return Err(DubError::Configuration(format!(
                "background_gain must be within 0.0..=1.0, got {}",
                self.background_gain
            )));
        }
        if self.analysis.sample_rate == 0 {
            return Err(DubError::Configuration(
                "analysis.sample_rate must be positive".to_string(),
            ));
        }
        if self.analysis.hop_length == 0 || self.analysis.n_fft < self.analysis.hop_length {
            return Err(DubError::Configuration(format!(
                "invalid analysis frame: n_fft={} hop_length={}",
                self.analysis.n_fft, self.analysis.hop_length
            )));
        }
        if self.supported_languages.is_empty() {
            return Err(DubError::Configuration(
                "supported_languages must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Поддерживается ли язык синтезом
    pub fn is_language_supported(&self, code: &str) -> bool {
        self.supported_languages.contains_key(&code.to_lowercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = DubConfig::default();
        assert_eq!(config.background_gain, 0.5);
        assert_eq!(config.analysis.sample_rate, 22050);
        assert_eq!(config.demucs.model, "htdemucs");
        assert!(config.is_language_supported("es"));
        assert!(config.is_language_supported("ZH-CN"));
        assert!(!config.is_language_supported("xx"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: DubConfig =
            serde_json::from_str(r#"{ "background_gain": 0.3, "demucs": { "device": "cpu" } }"#)
                .unwrap();
        assert_eq!(config.background_gain, 0.3);
        assert_eq!(config.demucs.device.as_deref(), Some("cpu"));
        assert_eq!(config.demucs.binary, "demucs");
        assert_eq!(config.openai.transcription_model, "whisper-1");
    }

    #[test]
    fn test_validate_rejects_bad_gain() {
        let config = DubConfig {
            background_gain: 1.5,
            ..DubConfig::default()
        };
        assert!(matches!(config.validate(), Err(DubError::Configuration(_))));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dub.json");
        std::fs::write(&path, r#"{ "max_video_size_mb": 10 }"#).unwrap();

        let config = DubConfig::load(&path).unwrap();
        assert_eq!(config.max_video_size_mb, 10);

        assert!(DubConfig::load(dir.path().join("missing.json")).is_err());
    }
}
