//! Внешние движки: распознавание речи, перевод, клонирование голоса
//!
//! Конвейер работает только с трейтами; конкретные клиенты создаются
//! один раз в [`crate::pipeline::DubbingServices`].

pub mod openai;
pub mod xtts;

use crate::error::Result;
use crate::types::{MediaAsset, Transcript};

pub use openai::{OpenAiTranscriber, OpenAiTranslator};
pub use xtts::XttsClient;

/// Распознавание речи: вокал -> текст и язык
#[async_trait::async_trait]
pub trait Transcriber: Send + Sync {
    /// Возвращает `NoSpeech`, если после обрезки пробелов текст пуст
    async fn transcribe(&self, audio: &MediaAsset) -> Result<Transcript>;
}

/// Перевод текста
#[async_trait::async_trait]
pub trait Translator: Send + Sync {
    /// Возвращает `Translation` при пустом или неудачном переводе
    async fn translate(
        &self,
        text: &str,
        source_language: &str,
        target_language: &str,
    ) -> Result<String>;
}
