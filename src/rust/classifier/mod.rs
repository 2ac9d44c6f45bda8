use std::sync::Arc;
use async_trait::async_trait;

mod error;
mod generative;
mod inference;
mod onnx;
mod severity;
pub mod builder;
mod utils;

pub use builder::ClassifierBuilder;
pub use error::ClassifierError;
pub use generative::GenerativeClassifier;
pub use onnx::OnnxClassifier;
pub use severity::{parse_level, Assessment, SeverityLevel, SeverityResult};

use crate::config::ClassifierConfig;
use crate::models::{ModelBackend, ModelSource};
use crate::runtime::RuntimeConfig;
use crate::ModelManager;

/// Maps symptom text to an ESI assessment.
///
/// Implementations are shared across worker tasks behind an `Arc`, so `classify` takes
/// `&self` and must be safe to call concurrently.
#[async_trait]
pub trait SeverityClassifier: Send + Sync {
    /// Short backend name, reported by the health endpoint.
    fn name(&self) -> &str;

    async fn classify(&self, text: &str) -> Result<SeverityResult, ClassifierError>;

    /// Stops accepting work. Later `classify` calls fail with `BackendError`.
    fn shutdown(&self) {}
}

/// Builds the classifier described by `config`.
///
/// Artifacts must already be provisioned (see [`crate::provision::bootstrap`]); this only
/// locates them in the cache and loads them.
pub async fn initialize(
    config: &ClassifierConfig,
    manager: &ModelManager,
) -> Result<Arc<dyn SeverityClassifier>, ClassifierError> {
    match config.backend {
        ModelBackend::Onnx => {
            let artifacts = manager
                .locate(&config.model)
                .map_err(|e| ClassifierError::BuildError(format!("Model artifacts unavailable: {}", e)))?;
            let runtime_config = RuntimeConfig::accelerated(config.use_accelerator);
            let max_sequence_length = config.max_sequence_length;

            // Session creation and the warm-up inference are CPU-bound.
            let classifier = tokio::task::spawn_blocking(move || {
                ClassifierBuilder::new()
                    .with_runtime_config(runtime_config)
                    .with_max_sequence_length(max_sequence_length)?
                    .with_artifacts(&artifacts)?
                    .build()
            })
            .await
            .map_err(|e| ClassifierError::BuildError(format!("Classifier load task failed: {}", e)))??;

            log::info!("ONNX classifier ready ({})", classifier.model_path);
            Ok(Arc::new(classifier))
        }
        ModelBackend::Generative => match &config.model.source {
            ModelSource::Endpoint { url } => {
                log::info!("Generative classifier ready ({} @ {})", config.model.name, url);
                Ok(Arc::new(GenerativeClassifier::new(
                    url.clone(),
                    config.model.name.clone(),
                    config.max_input_chars,
                )))
            }
            other => Err(ClassifierError::BuildError(format!(
                "Generative backend needs an http(s) endpoint, got {:?}",
                other
            ))),
        },
    }
}
