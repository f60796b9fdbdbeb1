//! Модуль обработки ошибок библиотеки dub-sync
//!
//! Каждая ошибка привязана к этапу конвейера, на котором она возникла.
//! Конвейер возвращает исходную ошибку этапа без обёртки, поэтому
//! вызывающая сторона может сопоставлять варианты напрямую.

use thiserror::Error;

/// Ошибки библиотеки dub-sync
#[derive(Debug, Error)]
pub enum DubError {
    /// Ошибка извлечения или сведения аудио/видео (нет аудиодорожки, ffmpeg завершился с ошибкой)
    #[error("Media error: {0}")]
    Media(String),

    /// Не сработал ни основной, ни резервный способ разделения
    #[error("Separation error: {0}")]
    Separation(String),

    /// Распознавание вернуло пустой текст
    #[error("No speech detected in the audio")]
    NoSpeech,

    /// Ошибка движка распознавания речи
    #[error("Transcription error: {0}")]
    Transcription(String),

    /// Пустой или неудачный перевод
    #[error("Translation error: {0}")]
    Translation(String),

    /// Ошибка клонирования голоса / синтеза речи
    #[error("Synthesis error: {0}")]
    Synthesis(String),

    /// Ошибка обработки аудио (DSP, ресемплинг, декодирование)
    #[error("Audio processing error: {0}")]
    AudioProcessing(String),

    /// Ошибка конфигурации
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Некорректный запрос на дубляж
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Превышено время выполнения, заданное вызывающей стороной
    #[error("Dubbing run timed out after {0:.1}s")]
    Timeout(f64),

    /// Ошибка ввода-вывода
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Ошибка чтения/записи WAV
    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),

    /// Ошибка HTTP запроса
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    /// Ошибка сериализации/десериализации JSON
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Грубая классификация ошибок для отображения пользователю
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Media,
    Separation,
    NoSpeech,
    Transcription,
    Translation,
    Synthesis,
    InvalidRequest,
    Timeout,
    Internal,
}

impl ErrorKind {
    /// Получить строковое представление вида ошибки
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Media => "media",
            Self::Separation => "separation",
            Self::NoSpeech => "no_speech",
            Self::Transcription => "transcription",
            Self::Translation => "translation",
            Self::Synthesis => "synthesis",
            Self::InvalidRequest => "invalid_request",
            Self::Timeout => "timeout",
            Self::Internal => "internal",
        }
    }
}

impl DubError {
    /// Вид ошибки для пользовательского интерфейса
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Media(_) => ErrorKind::Media,
            Self::Separation(_) => ErrorKind::Separation,
            Self::NoSpeech => ErrorKind::NoSpeech,
            Self::Transcription(_) => ErrorKind::Transcription,
            Self::Translation(_) => ErrorKind::Translation,
            Self::Synthesis(_) => ErrorKind::Synthesis,
            Self::InvalidRequest(_) | Self::Configuration(_) => ErrorKind::InvalidRequest,
            Self::Timeout(_) => ErrorKind::Timeout,
            Self::AudioProcessing(_)
            | Self::Io(_)
            | Self::Wav(_)
            | Self::Http(_)
            | Self::Json(_) => ErrorKind::Internal,
        }
    }
}

/// Тип Result для библиотеки dub-sync
pub type Result<T> = std::result::Result<T, DubError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(DubError::NoSpeech.kind(), ErrorKind::NoSpeech);
        assert_eq!(DubError::Media("no audio".into()).kind(), ErrorKind::Media);
        assert_eq!(DubError::Timeout(3.0).kind().as_str(), "timeout");

        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        assert_eq!(DubError::from(io).kind(), ErrorKind::Internal);
    }

    #[test]
    fn test_no_speech_message() {
        assert_eq!(DubError::NoSpeech.to_string(), "No speech detected in the audio");
    }
}
