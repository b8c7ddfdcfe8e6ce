// Error handling for Emotion API
//
// This module defines the API-level error type. Component errors are converted
// into it, and every variant maps to an HTTP status and a fixed Arabic message.
// The internal cause is logged, never sent to the client.

use std::io;
use thiserror::Error;

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use log::{error, warn};

use crate::audio::AudioError;
use crate::emotion::ClassifierError;
use crate::models::ErrorResponse;
use crate::speech::SpeechError;

/// Client-facing messages
pub mod messages {
    pub const TEXT_EMPTY: &str = "النص فارغ. الرجاء إدخال نص للتحليل.";
    pub const TEXT_TOO_LONG: &str = "النص طويل جداً. الحد الأقصى هو 512 حرف.";
    pub const FILE_EMPTY: &str = "لم يتم تحميل أي ملف صوتي.";
    pub const FILE_INVALID: &str = "صيغة الملف غير صالحة.";
    pub const FILE_TOO_LARGE: &str = "حجم الملف الصوتي يتجاوز الحد المسموح.";
    pub const PROCESSING_ERROR: &str = "حدث خطأ أثناء معالجة الطلب.";
    pub const AUDIO_FORMAT: &str = "صيغة الملف غير مدعومة. الرجاء استخدام WAV, MP3, OGG, or M4A.";
    pub const AUDIO_PROCESSING: &str = "حدث خطأ أثناء معالجة الملف الصوتي.";
    pub const SPEECH_RECOGNITION: &str = "لم نتمكن من التعرف على الكلام في الملف الصوتي.";
    pub const AUDIO_EMPTY: &str = "الملف الصوتي فارغ أو تالف.";
    pub const INVALID_REQUEST: &str = "الطلب غير صالح. الرجاء إرسال كائن JSON يحتوي على الحقل text.";
}

/// Errors that can occur in the Emotion API handlers
#[derive(Error, Debug)]
pub enum HandlerError {
    /// Text is empty after trimming
    #[error("Text is empty")]
    EmptyText,

    /// Request body is not valid JSON or misses the `text` field
    #[error("Invalid request body: {0}")]
    InvalidBody(String),

    /// Text exceeds the configured character limit
    #[error("Text too long: {0} characters exceeds limit of {1}")]
    TextTooLong(usize, usize),

    /// Error when processing multipart form data
    #[error("Form error: {0}")]
    FormError(String),

    /// No `file` field, or one with nothing selected
    #[error("No audio file provided in the request")]
    NoAudioFile,

    /// The upload failed the audio validation probe
    #[error("Uploaded file is not valid audio")]
    InvalidAudioFile,

    /// Error when a file is too large
    #[error("File too large: {0} bytes exceeds limit of {1} bytes")]
    FileTooLarge(usize, usize),

    #[error("Unsupported audio format")]
    UnsupportedFormat,

    /// Decoding or transcoding failed
    #[error("Audio transcoding error: {0}")]
    Transcoding(String),

    #[error("Audio is empty")]
    EmptyAudio,

    #[error("No speech recognized")]
    NoSpeech,

    #[error("Speech backend error: {0}")]
    SpeechBackend(String),

    /// Model loading or inference failed
    #[error("Classifier error: {0}")]
    Classifier(#[from] ClassifierError),

    /// Error when saving file data
    #[error("File error: {0}")]
    FileError(#[from] io::Error),
}

impl HandlerError {
    /// Create a new FormError
    pub fn form_error<S: Into<String>>(msg: S) -> Self {
        Self::FormError(msg.into())
    }

    /// Message returned to the client in the `detail` field
    pub fn detail(&self) -> &'static str {
        match self {
            HandlerError::EmptyText => messages::TEXT_EMPTY,
            HandlerError::InvalidBody(_) => messages::INVALID_REQUEST,
            HandlerError::TextTooLong(_, _) => messages::TEXT_TOO_LONG,
            HandlerError::NoAudioFile => messages::FILE_EMPTY,
            HandlerError::FormError(_) | HandlerError::InvalidAudioFile => messages::FILE_INVALID,
            HandlerError::FileTooLarge(_, _) => messages::FILE_TOO_LARGE,
            HandlerError::UnsupportedFormat => messages::AUDIO_FORMAT,
            HandlerError::Transcoding(_) => messages::AUDIO_PROCESSING,
            HandlerError::EmptyAudio => messages::AUDIO_EMPTY,
            HandlerError::NoSpeech => messages::SPEECH_RECOGNITION,
            HandlerError::SpeechBackend(_)
            | HandlerError::Classifier(_)
            | HandlerError::FileError(_) => messages::PROCESSING_ERROR,
        }
    }
}

impl ResponseError for HandlerError {
    fn status_code(&self) -> StatusCode {
        match self {
            HandlerError::EmptyText
            | HandlerError::InvalidBody(_)
            | HandlerError::TextTooLong(_, _)
            | HandlerError::FormError(_)
            | HandlerError::NoAudioFile
            | HandlerError::InvalidAudioFile
            | HandlerError::UnsupportedFormat
            | HandlerError::Transcoding(_)
            | HandlerError::EmptyAudio
            | HandlerError::NoSpeech => StatusCode::BAD_REQUEST,
            HandlerError::FileTooLarge(_, _) => StatusCode::PAYLOAD_TOO_LARGE,
            HandlerError::SpeechBackend(_)
            | HandlerError::Classifier(_)
            | HandlerError::FileError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status.is_server_error() {
            error!("Request failed: {}", self);
        } else {
            warn!("Request rejected: {}", self);
        }

        HttpResponse::build(status).json(ErrorResponse {
            detail: self.detail().to_string(),
        })
    }
}

/// Convert AudioError to HandlerError
impl From<AudioError> for HandlerError {
    fn from(err: AudioError) -> Self {
        match err {
            AudioError::UnsupportedFormat(_) => HandlerError::UnsupportedFormat,
            AudioError::Transcoding(msg) => HandlerError::Transcoding(msg),
            AudioError::EmptyAudio => HandlerError::EmptyAudio,
            AudioError::Speech(e) => e.into(),
            AudioError::Io(e) => HandlerError::FileError(e),
        }
    }
}

/// Convert SpeechError to HandlerError
impl From<SpeechError> for HandlerError {
    fn from(err: SpeechError) -> Self {
        match err {
            SpeechError::NoSpeech => HandlerError::NoSpeech,
            SpeechError::Backend(msg) => HandlerError::SpeechBackend(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_errors_are_bad_requests() {
        for err in [
            HandlerError::EmptyText,
            HandlerError::TextTooLong(600, 512),
            HandlerError::NoAudioFile,
            HandlerError::InvalidAudioFile,
            HandlerError::NoSpeech,
            HandlerError::EmptyAudio,
        ] {
            assert_eq!(err.status_code(), StatusCode::BAD_REQUEST, "{}", err);
        }
        assert_eq!(
            HandlerError::FileTooLarge(10, 5).status_code(),
            StatusCode::PAYLOAD_TOO_LARGE
        );
    }

    #[test]
    fn test_internal_errors_hide_details() {
        let err = HandlerError::from(ClassifierError::Inference("tensor shape [1, 3]".into()));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.detail(), messages::PROCESSING_ERROR);
    }

    #[test]
    fn test_audio_error_conversion() {
        let err: HandlerError = AudioError::Speech(SpeechError::NoSpeech).into();
        assert_eq!(err.detail(), messages::SPEECH_RECOGNITION);

        let err: HandlerError = AudioError::Speech(SpeechError::Backend("timeout".into())).into();
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);

        let err: HandlerError = AudioError::UnsupportedFormat("txt".into()).into();
        assert_eq!(err.detail(), messages::AUDIO_FORMAT);

        let err: HandlerError = AudioError::Transcoding("bad header".into()).into();
        assert_eq!(err.detail(), messages::AUDIO_PROCESSING);
    }
}
