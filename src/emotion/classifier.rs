//! Sequence classifier backends.
//!
//! The production backend runs a BERT-style sequence-classification model
//! exported to ONNX, with the matching HuggingFace `tokenizer.json`.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use hf_hub::api::sync::ApiBuilder;
use log::{debug, info};
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Tensor;
use thiserror::Error;
use tokenizers::{Tokenizer, TruncationParams};

use super::EmotionDistribution;
use crate::config::{ModelConfig, ModelSource};

/// Errors raised by the classifier
#[derive(Debug, Error)]
pub enum ClassifierError {
    /// The model or tokenizer could not be loaded
    #[error("Failed to load model: {0}")]
    ModelLoad(String),

    /// Tokenization or the forward pass failed
    #[error("Inference error: {0}")]
    Inference(String),
}

/// Text in, emotion distribution out.
///
/// Implementations must be usable from several threads; the ONNX backend
/// serializes forward passes internally.
pub trait SequenceClassifier: Send + Sync {
    fn predict(&self, text: &str) -> Result<EmotionDistribution, ClassifierError>;
}

/// Builds classifier instances; called once for a resident model or once per
/// inference for an on-demand model.
pub trait ModelLoader: Send + Sync {
    fn load(&self) -> Result<Arc<dyn SequenceClassifier>, ClassifierError>;
}

/// ONNX Runtime backed classifier
pub struct OnnxClassifier {
    session: Mutex<Session>,
    tokenizer: Tokenizer,
    uses_token_type_ids: bool,
}

impl OnnxClassifier {
    /// Load the tokenizer and ONNX session from local files
    pub fn from_files(
        tokenizer_path: &Path,
        model_path: &Path,
        max_sequence_length: usize,
        intra_threads: usize,
    ) -> Result<Self, ClassifierError> {
        let mut tokenizer = Tokenizer::from_file(tokenizer_path).map_err(|e| {
            ClassifierError::ModelLoad(format!(
                "tokenizer {}: {}",
                tokenizer_path.display(),
                e
            ))
        })?;
        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length: max_sequence_length,
                ..Default::default()
            }))
            .map_err(|e| ClassifierError::ModelLoad(format!("tokenizer truncation: {}", e)))?;
        // Single sequences only, so padding would just add masked tokens
        tokenizer.with_padding(None);

        let session = Session::builder()
            .map_err(|e| ClassifierError::ModelLoad(e.to_string()))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| ClassifierError::ModelLoad(e.to_string()))?
            .with_intra_threads(intra_threads.max(1))
            .map_err(|e| ClassifierError::ModelLoad(e.to_string()))?
            .commit_from_file(model_path)
            .map_err(|e| {
                ClassifierError::ModelLoad(format!("model {}: {}", model_path.display(), e))
            })?;

        let uses_token_type_ids = session
            .inputs
            .iter()
            .any(|input| input.name == "token_type_ids");

        info!(
            "Emotion model loaded from {} (token_type_ids: {})",
            model_path.display(),
            uses_token_type_ids
        );

        Ok(Self {
            session: Mutex::new(session),
            tokenizer,
            uses_token_type_ids,
        })
    }
}

impl SequenceClassifier for OnnxClassifier {
    fn predict(&self, text: &str) -> Result<EmotionDistribution, ClassifierError> {
        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| ClassifierError::Inference(format!("tokenization failed: {}", e)))?;

        let len = encoding.get_ids().len();
        if len == 0 {
            return Err(ClassifierError::Inference("empty token sequence".to_string()));
        }
        let to_i64 = |values: &[u32]| values.iter().map(|&v| v as i64).collect::<Vec<i64>>();
        let shape = [1usize, len];

        let input_ids = Tensor::from_array((shape, to_i64(encoding.get_ids())))
            .map_err(|e| ClassifierError::Inference(e.to_string()))?;
        let attention_mask = Tensor::from_array((shape, to_i64(encoding.get_attention_mask())))
            .map_err(|e| ClassifierError::Inference(e.to_string()))?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| ClassifierError::Inference("model session lock poisoned".to_string()))?;

        let outputs = if self.uses_token_type_ids {
            let token_type_ids = Tensor::from_array((shape, to_i64(encoding.get_type_ids())))
                .map_err(|e| ClassifierError::Inference(e.to_string()))?;
            session.run(ort::inputs![
                "input_ids" => input_ids,
                "attention_mask" => attention_mask,
                "token_type_ids" => token_type_ids
            ])
        } else {
            session.run(ort::inputs![
                "input_ids" => input_ids,
                "attention_mask" => attention_mask
            ])
        }
        .map_err(|e| ClassifierError::Inference(e.to_string()))?;

        let output = outputs
            .iter()
            .next()
            .ok_or_else(|| ClassifierError::Inference("no output from model".to_string()))?;
        let logits = output
            .1
            .try_extract_tensor::<f32>()
            .map_err(|e| ClassifierError::Inference(e.to_string()))?;
        let logits: Vec<f32> = logits.1.iter().copied().collect();

        debug!("Model produced {} logits for {} tokens", logits.len(), len);

        EmotionDistribution::from_logits(&logits).ok_or_else(|| {
            ClassifierError::Inference(format!(
                "unexpected logits from model: {} value(s)",
                logits.len()
            ))
        })
    }
}

/// Loads `OnnxClassifier` instances from a local directory or the model hub
pub struct OnnxModelLoader {
    config: ModelConfig,
}

impl OnnxModelLoader {
    pub fn new(config: ModelConfig) -> Self {
        Self { config }
    }

    /// Local paths of the tokenizer and model, downloading them if needed
    fn resolve_files(&self) -> Result<(PathBuf, PathBuf), ClassifierError> {
        match &self.config.source {
            ModelSource::Directory(dir) => Ok((
                dir.join(&self.config.tokenizer_file),
                dir.join(&self.config.model_file),
            )),
            ModelSource::Hub { repo, cache_dir } => {
                let mut builder = ApiBuilder::new();
                if let Some(cache_dir) = cache_dir {
                    builder = builder.with_cache_dir(cache_dir.clone());
                }
                let api = builder
                    .build()
                    .map_err(|e| ClassifierError::ModelLoad(format!("model hub: {}", e)))?;
                let repo_api = api.model(repo.clone());

                info!("Fetching emotion model files from {}", repo);
                let tokenizer = repo_api.get(&self.config.tokenizer_file).map_err(|e| {
                    ClassifierError::ModelLoad(format!("{}/{}: {}", repo, self.config.tokenizer_file, e))
                })?;
                let model = repo_api.get(&self.config.model_file).map_err(|e| {
                    ClassifierError::ModelLoad(format!("{}/{}: {}", repo, self.config.model_file, e))
                })?;
                Ok((tokenizer, model))
            }
        }
    }
}

impl ModelLoader for OnnxModelLoader {
    fn load(&self) -> Result<Arc<dyn SequenceClassifier>, ClassifierError> {
        let (tokenizer_path, model_path) = self.resolve_files()?;
        let classifier = OnnxClassifier::from_files(
            &tokenizer_path,
            &model_path,
            self.config.max_sequence_length,
            self.config.intra_threads,
        )?;
        Ok(Arc::new(classifier))
    }
}
