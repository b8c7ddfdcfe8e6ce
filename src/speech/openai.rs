//! OpenAI-compatible `/audio/transcriptions` backend

use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use serde::Deserialize;

use super::{primary_language, SpeechError, SpeechRecognizer};
use crate::config::SpeechConfig;

pub struct OpenAiSpeechBackend {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
}

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    #[serde(default)]
    text: String,
}

impl OpenAiSpeechBackend {
    pub fn new(config: &SpeechConfig) -> Result<Self, SpeechError> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            client,
            base_url: config.endpoint.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
        })
    }
}

#[async_trait]
impl SpeechRecognizer for OpenAiSpeechBackend {
    fn name(&self) -> &'static str {
        "openai"
    }

    async fn recognize(
        &self,
        wav: Vec<u8>,
        _sample_rate: u32,
        language: &str,
    ) -> Result<String, SpeechError> {
        let part = reqwest::multipart::Part::bytes(wav)
            .file_name("audio.wav")
            .mime_str("audio/wav")?;

        let form = reqwest::multipart::Form::new()
            .part("file", part)
            .text("model", self.model.clone())
            .text("language", primary_language(language).to_string());

        let url = format!("{}/audio/transcriptions", self.base_url);
        let mut request = self.client.post(&url).multipart(form);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        debug!("Sending audio to {}", url);
        let response = request.send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(SpeechError::Backend(format!("HTTP {}: {}", status, error_text)));
        }

        let parsed: TranscriptionResponse = response.json().await?;
        let text = parsed.text.trim();
        if text.is_empty() {
            Err(SpeechError::NoSpeech)
        } else {
            Ok(text.to_string())
        }
    }
}
