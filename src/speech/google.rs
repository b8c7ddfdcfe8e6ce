//! Google Cloud Speech-to-Text (v1 REST) backend

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use log::{debug, warn};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use super::{SpeechError, SpeechRecognizer};
use crate::config::SpeechConfig;

pub struct GoogleSpeechBackend {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RecognizeResponse {
    #[serde(default)]
    results: Vec<RecognitionResult>,
}

#[derive(Debug, Deserialize)]
struct RecognitionResult {
    #[serde(default)]
    alternatives: Vec<Alternative>,
}

#[derive(Debug, Deserialize)]
struct Alternative {
    #[serde(default)]
    transcript: String,
}

impl GoogleSpeechBackend {
    pub fn new(config: &SpeechConfig) -> Result<Self, SpeechError> {
        if config.api_key.is_none() {
            warn!("SPEECH_API_KEY is not set, Google speech requests will be unauthenticated");
        }
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }
}

/// Join the top alternative of every result
fn transcript_from_response(response: RecognizeResponse) -> Result<String, SpeechError> {
    let transcript = response
        .results
        .iter()
        .filter_map(|r| r.alternatives.first())
        .map(|a| a.transcript.trim())
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

    if transcript.is_empty() {
        Err(SpeechError::NoSpeech)
    } else {
        Ok(transcript)
    }
}

#[async_trait]
impl SpeechRecognizer for GoogleSpeechBackend {
    fn name(&self) -> &'static str {
        "google"
    }

    async fn recognize(
        &self,
        wav: Vec<u8>,
        sample_rate: u32,
        language: &str,
    ) -> Result<String, SpeechError> {
        let url = format!("{}/v1/speech:recognize", self.endpoint);
        let body = json!({
            "config": {
                "encoding": "LINEAR16",
                "sampleRateHertz": sample_rate,
                "languageCode": language,
            },
            "audio": {
                "content": STANDARD.encode(&wav),
            }
        });

        let mut request = self.client.post(&url).json(&body);
        if let Some(key) = &self.api_key {
            request = request.query(&[("key", key)]);
        }

        debug!("Sending {} bytes of audio to Google speech", wav.len());
        let response = request.send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(SpeechError::Backend(format!("HTTP {}: {}", status, error_text)));
        }

        let parsed: RecognizeResponse = response.json().await?;
        transcript_from_response(parsed)
    }
}
