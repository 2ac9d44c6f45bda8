use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use async_trait::async_trait;
use ndarray::Array1;
use ort::session::Session;
use tokenizers::Tokenizer;

use super::error::ClassifierError;
use super::inference::SequenceClassification;
use super::severity::{SeverityLevel, SeverityResult};
use super::utils::{argmax, softmax};
use super::SeverityClassifier;
use crate::ModelCharacteristics;

/// A thread-safe severity classifier backed by a five-label ONNX sequence-classification model.
///
/// # Thread Safety
///
/// This type is automatically `Send + Sync` because all of its fields are thread-safe:
/// - `String` and `ModelCharacteristics` are `Send + Sync`
/// - `Tokenizer` and `Session` are wrapped in `Arc`
///
/// Cloning is cheap and shares the loaded model, which is how `classify` moves work onto
/// the blocking thread pool.
///
/// ```rust,no_run
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// use esi_triage::OnnxClassifier;
///
/// let classifier = OnnxClassifier::builder()
///     .with_custom_model("esi_model/model.onnx", "esi_model/tokenizer.json", Some(256))?
///     .build()?;
///
/// let result = classifier.predict("chest pain and shortness of breath")?;
/// println!("{:?}", result.assessment);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct OnnxClassifier {
    pub model_path: String,
    pub tokenizer_path: String,
    pub tokenizer: Arc<Tokenizer>,
    pub session: Arc<Session>,
    pub model_characteristics: ModelCharacteristics,
    closed: Arc<AtomicBool>,
}

// Compile-time verification of thread-safety
const _: () = {
    fn assert_send_sync<T: Send + Sync>() {}
    fn verify_thread_safety() {
        assert_send_sync::<OnnxClassifier>();
    }
};

impl SequenceClassification for OnnxClassifier {
    fn tokenizer(&self) -> Option<&Tokenizer> {
        Some(&self.tokenizer)
    }

    fn session(&self) -> Option<&Session> {
        Some(&self.session)
    }

    fn max_sequence_length(&self) -> Option<usize> {
        Some(self.model_characteristics.max_sequence_length)
    }
}

impl OnnxClassifier {
    /// Creates a new ClassifierBuilder for fluent construction
    pub fn builder() -> super::builder::ClassifierBuilder {
        super::builder::ClassifierBuilder::new()
    }

    pub(crate) fn from_parts(
        model_path: String,
        tokenizer_path: String,
        tokenizer: Tokenizer,
        session: Session,
        model_characteristics: ModelCharacteristics,
    ) -> Self {
        Self {
            model_path,
            tokenizer_path,
            tokenizer: Arc::new(tokenizer),
            session: Arc::new(session),
            model_characteristics,
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Classifies `text` synchronously.
    ///
    /// Empty or whitespace-only text is `Indeterminate` without running the model. The
    /// rationale carries the winning label's softmax probability.
    pub fn predict(&self, text: &str) -> Result<SeverityResult, ClassifierError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(ClassifierError::BackendError("Classifier has been shut down".into()));
        }
        if text.trim().is_empty() {
            return Ok(SeverityResult::indeterminate());
        }

        let logits = self.predict_logits(text)?;
        let (level, confidence) = pick_level(&logits, self.model_characteristics.num_labels)?;
        Ok(SeverityResult::level(level)
            .with_rationale(format!("confidence {:.2}", confidence)))
    }
}

/// Maps one row of logits to the most probable level and its probability.
fn pick_level(logits: &Array1<f32>, num_labels: usize) -> Result<(SeverityLevel, f32), ClassifierError> {
    if logits.len() != num_labels {
        return Err(ClassifierError::PredictionError(format!(
            "Expected {} logits, model produced {}",
            num_labels,
            logits.len()
        )));
    }
    let probabilities = softmax(logits);
    let index = argmax(&probabilities)
        .ok_or_else(|| ClassifierError::PredictionError("Model produced no logits".into()))?;
    let level = SeverityLevel::from_label_index(index).ok_or_else(|| {
        ClassifierError::PredictionError(format!("Label index {} is outside the ESI range", index))
    })?;
    Ok((level, probabilities[index]))
}

#[async_trait]
impl SeverityClassifier for OnnxClassifier {
    fn name(&self) -> &str {
        "onnx"
    }

    async fn classify(&self, text: &str) -> Result<SeverityResult, ClassifierError> {
        let classifier = self.clone();
        let text = text.to_string();
        tokio::task::spawn_blocking(move || classifier.predict(&text))
            .await
            .map_err(|e| ClassifierError::PredictionError(format!("Inference task failed: {}", e)))?
    }

    fn shutdown(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            log::info!("ONNX classifier shut down ({})", self.model_path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_pick_level() {
        let (level, confidence) = pick_level(&array![0.1, 3.0, 0.2, -1.0, 0.0], 5).unwrap();
        assert_eq!(level.get(), 2);
        assert!(confidence > 0.5 && confidence <= 1.0);
    }

    #[test]
    fn test_pick_level_wrong_label_count() {
        let err = pick_level(&array![0.1, 3.0, 0.2], 5).unwrap_err();
        assert!(matches!(err, ClassifierError::PredictionError(_)));

        let err = pick_level(&Array1::zeros(0), 0).unwrap_err();
        assert!(matches!(err, ClassifierError::PredictionError(_)));
    }
}
