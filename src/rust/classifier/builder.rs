use tokenizers::{Tokenizer, TruncationParams};
use ort::session::Session;
use log::{info, error};

use super::error::ClassifierError;
use super::inference::SequenceClassification;
use super::onnx::OnnxClassifier;
use crate::models::NUM_LEVELS;
use crate::{ModelArtifacts, ModelCharacteristics, runtime::{RuntimeConfig, create_session_builder}};

const DEFAULT_MAX_SEQUENCE_LENGTH: usize = 256;
const WARMUP_TEXT: &str = "Patient reports mild headache since this morning";

/// A builder for constructing an [`OnnxClassifier`] with a fluent interface.
#[derive(Default, Debug)]
pub struct ClassifierBuilder {
    model_path: Option<String>,
    tokenizer_path: Option<String>,
    tokenizer: Option<Tokenizer>,
    session: Option<Session>,
    max_sequence_length: Option<usize>,
    runtime_config: RuntimeConfig,
}

impl SequenceClassification for ClassifierBuilder {
    /// Returns a reference to the tokenizer if it exists
    fn tokenizer(&self) -> Option<&Tokenizer> {
        self.tokenizer.as_ref()
    }

    /// Returns a reference to the ONNX session if it exists
    fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    fn max_sequence_length(&self) -> Option<usize> {
        Some(self.max_sequence_length.unwrap_or(DEFAULT_MAX_SEQUENCE_LENGTH))
    }
}

impl ClassifierBuilder {
    /// Creates a new empty ClassifierBuilder instance with default configuration
    ///
    /// # Example
    /// ```
    /// use esi_triage::ClassifierBuilder;
    ///
    /// let builder = ClassifierBuilder::new();
    /// ```
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the runtime configuration for ONNX model execution
    ///
    /// Must be called before a model is loaded; the session is created with it.
    ///
    /// # Example
    /// ```
    /// use esi_triage::{ClassifierBuilder, RuntimeConfig};
    ///
    /// let builder = ClassifierBuilder::new()
    ///     .with_runtime_config(RuntimeConfig::accelerated(false));
    /// ```
    pub fn with_runtime_config(mut self, config: RuntimeConfig) -> Self {
        self.runtime_config = config;
        self
    }

    /// Bounds the number of tokens fed to the model; longer inputs are truncated.
    pub fn with_max_sequence_length(mut self, max_sequence_length: usize) -> Result<Self, ClassifierError> {
        if max_sequence_length == 0 {
            return Err(ClassifierError::ValidationError("Max sequence length must be greater than zero".into()));
        }
        self.max_sequence_length = Some(max_sequence_length);
        Ok(self)
    }

    /// Loads the model and tokenizer located by the model manager.
    pub fn with_artifacts(self, artifacts: &ModelArtifacts) -> Result<Self, ClassifierError> {
        let max_sequence_length = self.max_sequence_length;
        self.with_custom_model(
            &artifacts.model_path.to_string_lossy(),
            &artifacts.tokenizer_path.to_string_lossy(),
            max_sequence_length,
        )
    }

    /// Sets a custom model and tokenizer path for the classifier
    ///
    /// # Arguments
    /// * `model_path` - Path to the ONNX model file
    /// * `tokenizer_path` - Path to the tokenizer file
    /// * `max_sequence_length` - Optional maximum sequence length for the model. If not provided,
    ///   defaults to 256 tokens.
    ///
    /// # Returns
    /// * `Result<Self, ClassifierError>` - The builder instance if successful, or an error if:
    ///   - The model or tokenizer paths are empty
    ///   - The paths are already set
    ///   - The files don't exist
    ///   - The model or tokenizer failed to load
    ///   - The model structure is invalid
    pub fn with_custom_model(
        mut self,
        model_path: &str,
        tokenizer_path: &str,
        max_sequence_length: Option<usize>,
    ) -> Result<Self, ClassifierError> {
        if model_path.is_empty() || tokenizer_path.is_empty() {
            return Err(ClassifierError::BuildError("Model and tokenizer paths cannot be empty".to_string()));
        }
        if self.model_path.is_some() || self.tokenizer_path.is_some() {
            return Err(ClassifierError::BuildError("Model and tokenizer paths already set".to_string()));
        }

        // Validate paths exist
        if !std::path::Path::new(model_path).exists() {
            return Err(ClassifierError::BuildError(format!("Model file not found: {}", model_path)));
        }
        if !std::path::Path::new(tokenizer_path).exists() {
            return Err(ClassifierError::BuildError(format!("Tokenizer file not found: {}", tokenizer_path)));
        }

        let tokenizer = Tokenizer::from_file(tokenizer_path)
            .map_err(|e| {
                error!("Failed to load tokenizer: {}", e);
                ClassifierError::BuildError(format!("Failed to load tokenizer: {}", e))
            })?;
        info!("Tokenizer loaded from {}", tokenizer_path);

        // Create session using the singleton environment
        let session = create_session_builder(&self.runtime_config)?
            .commit_from_file(model_path)?;

        Self::validate_model(&session)?;
        info!("Model structure validated successfully");

        if let Some(max) = max_sequence_length {
            self = self.with_max_sequence_length(max)?;
        }
        self.model_path = Some(model_path.to_string());
        self.tokenizer_path = Some(tokenizer_path.to_string());
        self.tokenizer = Some(tokenizer);
        self.session = Some(session);
        Ok(self)
    }

    /// Builds and returns the final classifier
    ///
    /// Configures tokenizer truncation, then runs one warm-up inference to check that the
    /// model emits one logit per ESI level.
    ///
    /// # Returns
    /// * `Result<OnnxClassifier, ClassifierError>` - The constructed classifier if successful, or an error if:
    ///   - No model and tokenizer paths are set
    ///   - The warm-up inference fails
    ///   - The model does not produce exactly five logits
    pub fn build(mut self) -> Result<OnnxClassifier, ClassifierError> {
        let (model_path, tokenizer_path) = match (self.model_path.take(), self.tokenizer_path.take()) {
            (Some(model), Some(tokenizer)) => (model, tokenizer),
            _ => return Err(ClassifierError::BuildError("Model and tokenizer paths must be set".to_string())),
        };
        let max_sequence_length = self.max_sequence_length.unwrap_or(DEFAULT_MAX_SEQUENCE_LENGTH);

        {
            let tokenizer = self.tokenizer.as_mut()
                .ok_or_else(|| ClassifierError::BuildError("No tokenizer loaded".into()))?;
            tokenizer
                .with_truncation(Some(TruncationParams {
                    max_length: max_sequence_length,
                    ..Default::default()
                }))
                .map_err(|e| ClassifierError::TokenizerError(format!("Failed to configure truncation: {}", e)))?;
            tokenizer.with_padding(None);
        }

        let logits = self.predict_logits(WARMUP_TEXT)?;
        if logits.len() != NUM_LEVELS {
            return Err(ClassifierError::ModelError(format!(
                "Model must output {} logits (one per ESI level), found {}",
                NUM_LEVELS,
                logits.len()
            )));
        }
        info!("Warm-up inference produced {} logits", logits.len());

        let tokenizer = self.tokenizer.take()
            .ok_or_else(|| ClassifierError::BuildError("No tokenizer loaded".into()))?;
        let session = self.session.take()
            .ok_or_else(|| ClassifierError::BuildError("No ONNX model loaded".into()))?;

        Ok(OnnxClassifier::from_parts(
            model_path,
            tokenizer_path,
            tokenizer,
            session,
            ModelCharacteristics {
                num_labels: logits.len(),
                max_sequence_length,
            },
        ))
    }

    /// Validates that the model has the expected input/output structure
    ///
    /// # Returns
    /// * `Result<(), ClassifierError>` - Ok if validation passes, or an error if:
    ///   - The model doesn't declare `input_ids` and `attention_mask` inputs
    ///   - The model doesn't have any output tensors
    fn validate_model(session: &Session) -> Result<(), ClassifierError> {
        for required in ["input_ids", "attention_mask"] {
            if !session.inputs.iter().any(|input| input.name == required) {
                return Err(ClassifierError::ModelError(format!(
                    "Model is missing required input '{}' (found {} inputs)",
                    required,
                    session.inputs.len()
                )));
            }
        }

        if session.outputs.is_empty() {
            return Err(ClassifierError::ModelError(
                "Model must have at least 1 output for logits".to_string()
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_paths_rejected() {
        let result = ClassifierBuilder::new().with_custom_model("", "tokenizer.json", None);
        assert!(matches!(result.unwrap_err(), ClassifierError::BuildError(_)));

        let result = ClassifierBuilder::new().with_custom_model("model.onnx", "", None);
        assert!(matches!(result.unwrap_err(), ClassifierError::BuildError(_)));
    }

    #[test]
    fn test_missing_files_rejected() {
        let result = ClassifierBuilder::new().with_custom_model(
            "/nonexistent/esi/model.onnx",
            "/nonexistent/esi/tokenizer.json",
            Some(128),
        );
        match result.unwrap_err() {
            ClassifierError::BuildError(msg) => assert!(msg.contains("Model file not found")),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_build_without_model() {
        let result = ClassifierBuilder::new().build();
        assert!(matches!(result.unwrap_err(), ClassifierError::BuildError(_)));
    }

    #[test]
    fn test_zero_sequence_length_rejected() {
        let result = ClassifierBuilder::new().with_max_sequence_length(0);
        assert!(matches!(result.unwrap_err(), ClassifierError::ValidationError(_)));
        assert!(ClassifierBuilder::new().with_max_sequence_length(64).is_ok());
    }
}
