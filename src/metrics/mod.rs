//! Metrics for the Emotion API
//!
//! Pluggable metrics system: a `MetricsExporter` trait with Prometheus and
//! null implementations, behind a cloneable `Metrics` facade shared with the
//! handlers and the emotion service. Recording never fails the caller;
//! exporter errors are logged.

pub mod error;
pub mod null;
pub mod prometheus;


use async_trait::async_trait;
use log::{debug, warn};
use std::sync::Arc;

pub use self::error::MetricsError;
pub use self::null::NullExporter;
pub use self::prometheus::PrometheusExporter;

/// Metrics exporter trait for pluggable monitoring systems
#[async_trait]
pub trait MetricsExporter: Send + Sync {
    /// Increment a counter metric by 1
    async fn increment(&self, name: &str, labels: &[(&str, &str)]) -> Result<(), MetricsError>;

    /// Observe a value in a histogram metric
    async fn observe_histogram(
        &self,
        name: &str,
        value: f64,
        labels: &[(&str, &str)],
    ) -> Result<(), MetricsError>;

    /// Export metrics in the format expected by the monitoring system
    async fn export(&self) -> Result<Vec<u8>, MetricsError>;
}

/// Metrics facade for the application
#[derive(Clone)]
pub struct Metrics {
    exporter: Arc<dyn MetricsExporter>,
}

impl Metrics {
    pub fn new(exporter: Arc<dyn MetricsExporter>) -> Self {
        Self { exporter }
    }

    pub async fn increment(&self, name: &str, labels: &[(&str, &str)]) {
        if let Err(e) = self.exporter.increment(name, labels).await {
            warn!("Failed to increment counter '{}': {}", name, e);
        }
    }

    pub async fn observe_histogram(&self, name: &str, value: f64, labels: &[(&str, &str)]) {
        if let Err(e) = self.exporter.observe_histogram(name, value, labels).await {
            warn!("Failed to observe histogram '{}': {}", name, e);
        }
    }

    /// Export metrics in the format expected by the monitoring system
    pub async fn export(&self) -> Result<Vec<u8>, MetricsError> {
        self.exporter.export().await
    }

    /// Record HTTP request duration and count
    pub async fn record_http_request(
        &self,
        endpoint: &str,
        method: &str,
        status: &str,
        duration: f64,
    ) {
        let labels = [("endpoint", endpoint), ("method", method), ("status", status)];
        self.observe_histogram("http_request_duration_seconds", duration, &labels)
            .await;
        self.increment("http_requests_total", &labels).await;
    }

    /// Record one classifier forward pass
    pub async fn record_inference(&self, status: &str, duration: f64) {
        self.observe_histogram(
            "emotion_inference_duration_seconds",
            duration,
            &[("status", status)],
        )
        .await;
        self.increment("emotion_inferences_total", &[("status", status)])
            .await;
    }

    /// Record a model load, including all retry attempts
    pub async fn record_model_load(&self, status: &str, duration: f64) {
        self.observe_histogram(
            "emotion_model_load_duration_seconds",
            duration,
            &[("status", status)],
        )
        .await;
    }

    /// Record one speech recognition call
    pub async fn record_transcription(&self, backend: &str, status: &str, duration: f64) {
        self.observe_histogram(
            "speech_recognition_duration_seconds",
            duration,
            &[("backend", backend), ("status", status)],
        )
        .await;
    }

    /// Record the size of an uploaded audio file
    pub async fn record_file_size(&self, size_bytes: f64) {
        self.observe_histogram("audio_upload_size_bytes", size_bytes, &[])
            .await;
    }
}

/// Factory function to create metrics exporter based on configuration
pub fn create_metrics_exporter(exporter_type: &str) -> Arc<dyn MetricsExporter> {
    match exporter_type.to_lowercase().as_str() {
        "prometheus" => {
            debug!("Initializing Prometheus metrics exporter");
            Arc::new(PrometheusExporter::with_namespace("emotion_api"))
        }
        "none" | "null" | "disabled" => {
            debug!("Metrics disabled, using null exporter");
            Arc::new(NullExporter)
        }
        other => {
            warn!("Unknown metrics exporter type '{}', using null exporter", other);
            Arc::new(NullExporter)
        }
    }
}

/// Factory function to create a Prometheus metrics exporter
pub fn create_prometheus_exporter() -> Arc<dyn MetricsExporter> {
    Arc::new(PrometheusExporter::new())
}

/// Factory function to create a null (no-op) metrics exporter
pub fn create_null_exporter() -> Arc<dyn MetricsExporter> {
    Arc::new(NullExporter)
}
