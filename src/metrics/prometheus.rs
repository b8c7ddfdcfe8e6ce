use crate::metrics::error::{validate_metric_name, MetricsError};
/// Prometheus metrics exporter implementation
///
/// Metrics are created lazily on first use and registered in a private
/// registry, exported in the Prometheus text format.
use crate::metrics::MetricsExporter;
use async_trait::async_trait;
use log::debug;
use prometheus::{
    CounterVec, Encoder, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder,
};
use std::collections::HashMap;
use tokio::sync::Mutex;

/// Prometheus implementation of MetricsExporter
pub struct PrometheusExporter {
    registry: Registry,
    counters: Mutex<HashMap<String, CounterVec>>,
    histograms: Mutex<HashMap<String, HistogramVec>>,
    /// Optional namespace prefix for all metrics
    namespace: Option<String>,
}

impl Default for PrometheusExporter {
    fn default() -> Self {
        Self::new()
    }
}

impl PrometheusExporter {
    pub fn new() -> Self {
        Self {
            registry: Registry::new(),
            counters: Mutex::new(HashMap::new()),
            histograms: Mutex::new(HashMap::new()),
            namespace: None,
        }
    }

    pub fn with_namespace<S: Into<String>>(namespace: S) -> Self {
        Self {
            namespace: Some(namespace.into()),
            ..Self::new()
        }
    }

    fn apply_namespace(&self, name: &str) -> String {
        match &self.namespace {
            Some(ns) => format!("{}_{}", ns, name),
            None => name.to_string(),
        }
    }

    fn split_labels<'a>(labels: &'a [(&'a str, &'a str)]) -> (Vec<&'a str>, Vec<&'a str>) {
        labels.iter().map(|(k, v)| (*k, *v)).unzip()
    }

    async fn get_or_create_counter(
        &self,
        name: &str,
        label_names: &[&str],
    ) -> Result<CounterVec, MetricsError> {
        let full_name = self.apply_namespace(name);
        let mut counters = self.counters.lock().await;
        if let Some(counter) = counters.get(&full_name) {
            return Ok(counter.clone());
        }

        let opts = Opts::new(full_name.clone(), format!("{} counter", name));
        let counter = CounterVec::new(opts, label_names)
            .map_err(|e| MetricsError::registration_failed(name, e.to_string()))?;
        self.registry
            .register(Box::new(counter.clone()))
            .map_err(|e| MetricsError::registration_failed(name, e.to_string()))?;

        counters.insert(full_name, counter.clone());
        Ok(counter)
    }

    async fn get_or_create_histogram(
        &self,
        name: &str,
        label_names: &[&str],
    ) -> Result<HistogramVec, MetricsError> {
        let full_name = self.apply_namespace(name);
        let mut histograms = self.histograms.lock().await;
        if let Some(histogram) = histograms.get(&full_name) {
            return Ok(histogram.clone());
        }

        let opts = HistogramOpts::new(full_name.clone(), format!("{} histogram", name));
        let histogram = HistogramVec::new(opts, label_names)
            .map_err(|e| MetricsError::registration_failed(name, e.to_string()))?;
        self.registry
            .register(Box::new(histogram.clone()))
            .map_err(|e| MetricsError::registration_failed(name, e.to_string()))?;

        histograms.insert(full_name, histogram.clone());
        Ok(histogram)
    }
}

#[async_trait]
impl MetricsExporter for PrometheusExporter {
    async fn increment(&self, name: &str, labels: &[(&str, &str)]) -> Result<(), MetricsError> {
        validate_metric_name(name)?;
        let (label_names, label_values) = Self::split_labels(labels);
        let counter = self.get_or_create_counter(name, &label_names).await?;

        counter
            .get_metric_with_label_values(&label_values)
            .map_err(|e| MetricsError::registration_failed(name, e.to_string()))?
            .inc();
        debug!("Incremented counter {} with labels {:?}", name, labels);
        Ok(())
    }

    async fn observe_histogram(
        &self,
        name: &str,
        value: f64,
        labels: &[(&str, &str)],
    ) -> Result<(), MetricsError> {
        validate_metric_name(name)?;
        let (label_names, label_values) = Self::split_labels(labels);
        let histogram = self.get_or_create_histogram(name, &label_names).await?;

        histogram
            .get_metric_with_label_values(&label_values)
            .map_err(|e| MetricsError::registration_failed(name, e.to_string()))?
            .observe(value);
        debug!(
            "Observed histogram {} with value {} and labels {:?}",
            name, value, labels
        );
        Ok(())
    }

    async fn export(&self) -> Result<Vec<u8>, MetricsError> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .map_err(|e| MetricsError::export_failed(format!("Failed to encode metrics: {}", e)))?;
        Ok(buffer)
    }
}
