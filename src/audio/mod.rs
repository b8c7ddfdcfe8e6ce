// Audio front-end for Emotion API
//
// This module turns an uploaded audio file into text: it checks the format,
// transcodes non-WAV input, normalises the waveform to 16 kHz mono and hands it
// to the configured speech recognizer.

pub mod decode;
pub mod processor;

pub use processor::AudioProcessor;

use std::io;
use std::path::Path;
use thiserror::Error;

use crate::speech::SpeechError;

/// Extensions accepted for audio uploads (lowercase)
pub const SUPPORTED_FORMATS: [&str; 4] = ["wav", "mp3", "ogg", "m4a"];

/// Sample rate sent to speech recognition
pub const TARGET_SAMPLE_RATE: u32 = 16_000;

/// Errors raised while preparing or transcribing audio
#[derive(Debug, Error)]
pub enum AudioError {
    #[error("Unsupported audio format: {0}")]
    UnsupportedFormat(String),

    /// Decoding, transcoding or resampling failed
    #[error("Audio transcoding error: {0}")]
    Transcoding(String),

    #[error("Audio contains no samples")]
    EmptyAudio,

    #[error(transparent)]
    Speech(#[from] SpeechError),

    #[error("Audio IO error: {0}")]
    Io(#[from] io::Error),
}

impl From<hound::Error> for AudioError {
    fn from(err: hound::Error) -> Self {
        AudioError::Transcoding(err.to_string())
    }
}

impl From<symphonia::core::errors::Error> for AudioError {
    fn from(err: symphonia::core::errors::Error) -> Self {
        AudioError::Transcoding(err.to_string())
    }
}

/// Lowercase extension of a path, if any
pub fn file_extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase())
}

/// Whether the path has one of the supported audio extensions
pub fn is_supported_format(path: &Path) -> bool {
    file_extension(path)
        .map(|ext| SUPPORTED_FORMATS.contains(&ext.as_str()))
        .unwrap_or(false)
}
