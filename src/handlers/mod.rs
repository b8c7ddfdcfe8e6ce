// Emotion API HTTP handlers
//
// This module contains the HTTP handlers for the Emotion API.
// It provides the interface between HTTP requests and the emotion and audio services.

pub mod cors;
pub mod form;
pub mod routes;

// Re-export handlers for easier access
pub use self::routes::{configure, metrics_endpoint, predict_audio, predict_text, root};
// Re-export CORS middleware
pub use self::cors::Cors;
