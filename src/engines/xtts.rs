//! HTTP клиент сервера клонирования голоса (XTTS v2)

use std::time::Duration;

use log::{debug, error};
use reqwest::{multipart, Client};

use crate::config::SynthesisConfig;
use crate::error::{DubError, Result};
use crate::media::audio::{decode_audio_bytes, AudioBuffer};
use crate::synthesis::{SpeechEngine, SynthesisRequest};

/// Клиент `POST {endpoint}/tts`: текст, язык, скорость и референсный WAV в multipart
pub struct XttsClient {
    client: Client,
    endpoint: String,
}

impl XttsClient {
    pub fn new(config: &SynthesisConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| DubError::Configuration(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
        })
    }

    pub fn url(&self) -> String {
        format!("{}/tts", self.endpoint)
    }

    async fn build_form(&self, request: &SynthesisRequest) -> Result<multipart::Form> {
        let reference = tokio::fs::read(&request.reference).await.map_err(|e| {
            DubError::Synthesis(format!(
                "Failed to read reference voice {}: {}",
                request.reference.display(),
                e
            ))
        })?;
        let reference_part = multipart::Part::bytes(reference)
            .file_name("speaker.wav")
            .mime_str("audio/wav")?;

        Ok(multipart::Form::new()
            .text("text", request.text.clone())
            .text("language", request.language.clone())
            .text("speed", format!("{:.3}", request.speed))
            .part("speaker_wav", reference_part))
    }
}

#[async_trait::async_trait]
impl SpeechEngine for XttsClient {
    async fn synthesize(&self, request: &SynthesisRequest) -> Result<AudioBuffer> {
        let form = self.build_form(request).await?;

        debug!(
            "Requesting synthesis of {} characters in {}",
            request.text.chars().count(),
            request.language
        );
        let response = self
            .client
            .post(self.url())
            .multipart(form)
            .send()
            .await
            .map_err(|e| DubError::Synthesis(format!("request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            error!("Voice synthesis server error: HTTP {}, body: {}", status, error_text);
            return Err(DubError::Synthesis(format!("HTTP {}: {}", status, error_text)));
        }

        let bytes = response.bytes().await?;
        if bytes.is_empty() {
            return Err(DubError::Synthesis("server returned no audio".to_string()));
        }
        decode_audio_bytes(bytes.to_vec(), Some("wav"))
            .map_err(|e| DubError::Synthesis(format!("undecodable audio: {}", e)))
    }
}
