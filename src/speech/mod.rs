//! Speech recognition clients.
//!
//! Audio is sent as a 16 kHz mono 16-bit WAV to a remote recognition API.
//! Backends distinguish "the service heard no speech" from transport or
//! service failures so the API can report them differently.

pub mod google;
pub mod openai;

pub use google::GoogleSpeechBackend;
pub use openai::OpenAiSpeechBackend;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::{SpeechBackend, SpeechConfig};

/// Errors raised by speech recognition backends
#[derive(Debug, Error)]
pub enum SpeechError {
    /// The backend returned no transcript
    #[error("No speech recognized")]
    NoSpeech,

    /// The request failed or the backend answered with an error
    #[error("Speech backend error: {0}")]
    Backend(String),
}

impl From<reqwest::Error> for SpeechError {
    fn from(err: reqwest::Error) -> Self {
        SpeechError::Backend(err.to_string())
    }
}

#[async_trait]
pub trait SpeechRecognizer: Send + Sync {
    /// Short backend name used in logs and metrics
    fn name(&self) -> &'static str;

    /// Transcribe a WAV clip in the given locale (e.g. `ar-AR`)
    async fn recognize(
        &self,
        wav: Vec<u8>,
        sample_rate: u32,
        language: &str,
    ) -> Result<String, SpeechError>;
}

/// Build the recognizer selected in the configuration
pub fn create_recognizer(config: &SpeechConfig) -> Result<Arc<dyn SpeechRecognizer>, SpeechError> {
    let recognizer: Arc<dyn SpeechRecognizer> = match config.backend {
        SpeechBackend::Google => Arc::new(GoogleSpeechBackend::new(config)?),
        SpeechBackend::OpenAi => Arc::new(OpenAiSpeechBackend::new(config)?),
    };
    Ok(recognizer)
}

/// Primary language subtag of a locale: `ar-AR` -> `ar`
pub fn primary_language(locale: &str) -> &str {
    locale
        .split(|c| c == '-' || c == '_')
        .next()
        .unwrap_or(locale)
}
