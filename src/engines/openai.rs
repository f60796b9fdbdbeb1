//! Клиенты OpenAI: распознавание (Whisper) и перевод (chat completions)

use std::time::Duration;

use log::{debug, error, info};
use reqwest::{multipart, Client};
use serde::{Deserialize, Serialize};

use super::{Transcriber, Translator};
use crate::config::OpenAiConfig;
use crate::error::{DubError, Result};
use crate::types::{MediaAsset, Transcript};

/// Названия языков из verbose_json -> коды ISO-639-1
const LANGUAGE_CODES: &[(&str, &str)] = &[
    ("english", "en"),
    ("spanish", "es"),
    ("french", "fr"),
    ("german", "de"),
    ("italian", "it"),
    ("portuguese", "pt"),
    ("polish", "pl"),
    ("turkish", "tr"),
    ("russian", "ru"),
    ("dutch", "nl"),
    ("czech", "cs"),
    ("arabic", "ar"),
    ("chinese", "zh"),
    ("japanese", "ja"),
    ("hungarian", "hu"),
    ("korean", "ko"),
    ("hindi", "hi"),
    ("ukrainian", "uk"),
];

/// Ответ Whisper в формате verbose_json
#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    text: String,
    #[serde(default)]
    language: Option<String>,
}

// Сообщение чата
#[derive(Debug, Serialize, Deserialize)]
struct Message {
    role: String,
    content: String,
}

// Запрос к chat completions
#[derive(Debug, Serialize)]
struct TranslationRequest {
    model: String,
    messages: Vec<Message>,
    temperature: f32,
}

// Ответ chat completions
#[derive(Debug, Deserialize)]
struct ChatCompletion {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Message,
}

fn build_client(config: &OpenAiConfig) -> Result<Client> {
    if config.api_key.trim().is_empty() {
        return Err(DubError::Configuration(
            "OpenAI API key is not set (OPENAI_API_KEY)".to_string(),
        ));
    }
    Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()
        .map_err(|e| DubError::Configuration(format!("Failed to create HTTP client: {}", e)))
}

/// Код языка по названию из ответа Whisper; неизвестные значения возвращаются в нижнем регистре
pub fn normalize_language(language: &str) -> String {
    let language = language.trim().to_lowercase();
    LANGUAGE_CODES
        .iter()
        .find(|(name, _)| *name == language)
        .map(|(_, code)| code.to_string())
        .unwrap_or(language)
}

/// Разбор тела ответа Whisper
fn parse_transcription(body: &str) -> Result<Transcript> {
    let response: TranscriptionResponse = serde_json::from_str(body)
        .map_err(|e| DubError::Transcription(format!("Invalid Whisper response: {}", e)))?;
    let language = response
        .language
        .as_deref()
        .map(normalize_language)
        .unwrap_or_else(|| "auto".to_string());
    Transcript::new(response.text, language)
}

/// Текст перевода из ответа chat completions
fn parse_completion(body: &str) -> Result<String> {
    let completion: ChatCompletion = serde_json::from_str(body)
        .map_err(|e| DubError::Translation(format!("Invalid chat completion response: {}", e)))?;
    let text = completion
        .choices
        .into_iter()
        .next()
        .map(|choice| choice.message.content.trim().to_string())
        .unwrap_or_default();
    if text.is_empty() {
        return Err(DubError::Translation(
            "translation service returned an empty result".to_string(),
        ));
    }
    Ok(text)
}

/// Распознавание речи через `/audio/transcriptions`
pub struct OpenAiTranscriber {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl OpenAiTranscriber {
    pub fn new(config: &OpenAiConfig) -> Result<Self> {
        Ok(Self {
            client: build_client(config)?,
            api_key: config.api_key.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.transcription_model.clone(),
        })
    }
}

#[async_trait::async_trait]
impl Transcriber for OpenAiTranscriber {
    async fn transcribe(&self, audio: &MediaAsset) -> Result<Transcript> {
        let path = audio.path();
        let file_content = tokio::fs::read(path).await.map_err(|e| {
            DubError::Transcription(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "audio.wav".to_string());

        info!("Transcribing {} with {}", filename, self.model);
        let file_part = multipart::Part::bytes(file_content)
            .file_name(filename)
            .mime_str("audio/wav")
            .map_err(|e| DubError::Transcription(format!("Invalid multipart part: {}", e)))?;
        let form = multipart::Form::new()
            .part("file", file_part)
            .text("model", self.model.clone())
            .text("response_format", "verbose_json");

        let response = self
            .client
            .post(format!("{}/audio/transcriptions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .multipart(form)
            .send()
            .await
            .map_err(|e| DubError::Transcription(format!("request failed: {}", e)))?;

        let status = response.status();
        debug!("Whisper API response status: {}", status);
        let body = response
            .text()
            .await
            .map_err(|e| DubError::Transcription(format!("Failed to read response: {}", e)))?;
        if !status.is_success() {
            error!("OpenAI API error: HTTP {}, body: {}", status, body);
            return Err(DubError::Transcription(format!("HTTP {}: {}", status, body)));
        }

        let transcript = parse_transcription(&body)?;
        info!(
            "Transcribed {} characters, source language {}",
            transcript.text().chars().count(),
            transcript.source_language()
        );
        Ok(transcript)
    }
}

/// Перевод через `/chat/completions`
pub struct OpenAiTranslator {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl OpenAiTranslator {
    pub fn new(config: &OpenAiConfig) -> Result<Self> {
        Ok(Self {
            client: build_client(config)?,
            api_key: config.api_key.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.translation_model.clone(),
        })
    }

    fn build_request(&self, text: &str, source_language: &str, target_language: &str) -> TranslationRequest {
        let source = if source_language.is_empty() || source_language == "auto" {
            "their original language".to_string()
        } else {
            format!("'{}'", source_language)
        };
        let system_message = format!(
            "You are a professional translator. \
            Translate the following spoken text from {} into the language with code '{}'. \
            Keep the translation natural and suitable for voice-over. \
            ONLY include the translated text in your response.",
            source, target_language
        );

        TranslationRequest {
            model: self.model.clone(),
            messages: vec![
                Message {
                    role: "system".to_string(),
                    content: system_message,
                },
                Message {
                    role: "user".to_string(),
                    content: text.to_string(),
                },
            ],
            temperature: 0.3,
        }
    }
}

#[async_trait::async_trait]
impl Translator for OpenAiTranslator {
    async fn translate(
        &self,
        text: &str,
        source_language: &str,
        target_language: &str,
    ) -> Result<String> {
        let request = self.build_request(text, source_language, target_language);

        debug!("Sending translation request to OpenAI API");
        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await
            .map_err(|e| DubError::Translation(format!("request failed: {}", e)))?;

        let status = response.status();
        debug!("OpenAI API response status: {}", status);
        let body = response
            .text()
            .await
            .map_err(|e| DubError::Translation(format!("Failed to read response: {}", e)))?;
        if !status.is_success() {
            error!("OpenAI API error: HTTP {}, body: {}", status, body);
            return Err(DubError::Translation(format!("HTTP {}: {}", status, body)));
        }

        let translated = parse_completion(&body)?;
        info!(
            "Translated {} -> {} ({} characters)",
            source_language,
            target_language,
            translated.chars().count()
        );
        Ok(translated)
    }
}
