// Emotion API Library
//
// This crate provides an HTTP API that detects emotions in Arabic text and in
// the transcript of uploaded Arabic speech, using a sequence classifier served
// through ONNX Runtime.

pub mod audio;
pub mod config;
pub mod config_loader;
pub mod config_validator;
pub mod emotion;
pub mod error;
pub mod file_utils;
pub mod handlers;
pub mod metrics;
pub mod models;
pub mod retry;
pub mod speech;

// Re-export common types for easier access
pub use audio::AudioProcessor;
pub use config::{AppConfig, HandlerConfig, MetricsConfig, ModelConfig, ServerConfig, SpeechConfig};
pub use emotion::{EmotionService, OnnxModelLoader};
pub use error::HandlerError;
pub use handlers::{configure, Cors};
pub use metrics::Metrics;
pub use models::{ErrorResponse, PredictionResponse, ServiceInfo};
