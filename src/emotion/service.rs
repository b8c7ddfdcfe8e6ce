//! Emotion service: owns the classifier and its residency policy.

use std::sync::Arc;
use std::time::Instant;

use log::{debug, info};

use super::classifier::{ClassifierError, ModelLoader, SequenceClassifier};
use super::{preprocess_text, AnalysisResult};
use crate::config::{LabelLocale, ModelConfig, ModelResidency};
use crate::metrics::Metrics;
use crate::retry::{retry, RetryPolicy};

/// Shared entry point for text classification.
///
/// With `ModelResidency::Resident` the model is loaded once when the service
/// starts. With `ModelResidency::OnDemand` every call loads a fresh model and
/// drops it before returning.
pub struct EmotionService {
    loader: Arc<dyn ModelLoader>,
    resident: Option<Arc<dyn SequenceClassifier>>,
    residency: ModelResidency,
    load_retry: RetryPolicy,
    label_locale: LabelLocale,
    metrics: Metrics,
}

impl EmotionService {
    /// Create the service, loading a resident model up front.
    ///
    /// Fails if a resident model cannot be loaded within the retry policy.
    pub async fn start(
        loader: Arc<dyn ModelLoader>,
        config: &ModelConfig,
        metrics: Metrics,
    ) -> Result<Self, ClassifierError> {
        let mut service = Self {
            loader,
            resident: None,
            residency: config.residency,
            load_retry: config.load_retry.clone(),
            label_locale: config.label_locale,
            metrics,
        };

        if service.residency == ModelResidency::Resident {
            service.resident = Some(service.load_model().await?);
            info!("Emotion model is resident");
        } else {
            info!("Emotion model will be loaded on demand");
        }

        Ok(service)
    }

    pub fn residency(&self) -> ModelResidency {
        self.residency
    }

    pub fn label_locale(&self) -> LabelLocale {
        self.label_locale
    }

    /// Load a model through the retry policy, off the async executor
    async fn load_model(&self) -> Result<Arc<dyn SequenceClassifier>, ClassifierError> {
        let start = Instant::now();
        let result = retry(&self.load_retry, "Emotion model loading", || {
            let loader = Arc::clone(&self.loader);
            async move {
                tokio::task::spawn_blocking(move || loader.load())
                    .await
                    .map_err(|e| ClassifierError::ModelLoad(format!("loader task failed: {}", e)))?
            }
        })
        .await;

        let status = if result.is_ok() { "success" } else { "error" };
        self.metrics
            .record_model_load(status, start.elapsed().as_secs_f64())
            .await;
        result
    }

    /// Classify `text`, which the caller has already validated
    pub async fn analyze(&self, text: &str) -> Result<AnalysisResult, ClassifierError> {
        let classifier = match &self.resident {
            Some(classifier) => Arc::clone(classifier),
            None => self.load_model().await?,
        };

        let start = Instant::now();
        let input = preprocess_text(text);
        let outcome = tokio::task::spawn_blocking(move || classifier.predict(&input))
            .await
            .map_err(|e| ClassifierError::Inference(format!("inference task failed: {}", e)))?;
        // For on-demand residency the last reference to the model went away with the task.

        let status = if outcome.is_ok() { "success" } else { "error" };
        self.metrics
            .record_inference(status, start.elapsed().as_secs_f64())
            .await;

        let result = AnalysisResult::new(text.to_string(), outcome?);
        debug!(
            "Dominant emotion {} ({:.3})",
            result.dominant_emotion.name(),
            result.confidence
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ModelSource;
    use crate::emotion::{Emotion, EmotionDistribution};
    use crate::metrics::create_null_exporter;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct FixedClassifier;

    impl SequenceClassifier for FixedClassifier {
        fn predict(&self, text: &str) -> Result<EmotionDistribution, ClassifierError> {
            if text.contains("  ") {
                return Err(ClassifierError::Inference("not preprocessed".to_string()));
            }
            EmotionDistribution::from_logits(&[0.0, 0.0, 3.0, 0.0, 0.0, 0.0, 0.0])
                .ok_or_else(|| ClassifierError::Inference("bad logits".to_string()))
        }
    }

    struct CountingLoader {
        loads: AtomicUsize,
        failures_before_success: usize,
    }

    impl ModelLoader for CountingLoader {
        fn load(&self) -> Result<Arc<dyn SequenceClassifier>, ClassifierError> {
            let n = self.loads.fetch_add(1, Ordering::SeqCst);
            if n < self.failures_before_success {
                Err(ClassifierError::ModelLoad("hub unavailable".to_string()))
            } else {
                Ok(Arc::new(FixedClassifier))
            }
        }
    }

    fn model_config(residency: ModelResidency) -> ModelConfig {
        ModelConfig {
            source: ModelSource::Directory(PathBuf::from("/unused")),
            model_file: "model.onnx".to_string(),
            tokenizer_file: "tokenizer.json".to_string(),
            max_sequence_length: 128,
            intra_threads: 1,
            residency,
            label_locale: LabelLocale::Arabic,
            load_retry: RetryPolicy::fixed(3, Duration::from_millis(1)),
        }
    }

    fn loader(failures_before_success: usize) -> Arc<CountingLoader> {
        Arc::new(CountingLoader {
            loads: AtomicUsize::new(0),
            failures_before_success,
        })
    }

    #[tokio::test]
    async fn test_resident_model_loads_once() {
        let loader = loader(0);
        let service = EmotionService::start(
            loader.clone(),
            &model_config(ModelResidency::Resident),
            Metrics::new(create_null_exporter()),
        )
        .await
        .expect("service starts");

        for _ in 0..3 {
            let result = service.analyze("أنا  غاضب").await.expect("analysis");
            assert_eq!(result.dominant_emotion, Emotion::Anger);
            assert_eq!(result.text, "أنا  غاضب");
        }
        assert_eq!(loader.loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_on_demand_model_loads_per_request() {
        let loader = loader(0);
        let service = EmotionService::start(
            loader.clone(),
            &model_config(ModelResidency::OnDemand),
            Metrics::new(create_null_exporter()),
        )
        .await
        .expect("service starts");
        assert_eq!(loader.loads.load(Ordering::SeqCst), 0);

        service.analyze("نص").await.expect("analysis");
        service.analyze("نص").await.expect("analysis");
        assert_eq!(loader.loads.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_startup_retries_then_succeeds() {
        let loader = loader(2);
        let service = EmotionService::start(
            loader.clone(),
            &model_config(ModelResidency::Resident),
            Metrics::new(create_null_exporter()),
        )
        .await;

        assert!(service.is_ok());
        assert_eq!(loader.loads.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_startup_fails_after_exhausting_attempts() {
        let loader = loader(10);
        let service = EmotionService::start(
            loader.clone(),
            &model_config(ModelResidency::Resident),
            Metrics::new(create_null_exporter()),
        )
        .await;

        assert!(matches!(service, Err(ClassifierError::ModelLoad(_))));
        assert_eq!(loader.loads.load(Ordering::SeqCst), 3);
    }
}
