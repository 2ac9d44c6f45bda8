use tokenizers::Tokenizer;
use ort::session::Session;
use ndarray::{Array1, Array2};
use ort::value::Tensor;
use std::collections::HashMap;

use super::error::ClassifierError;

/// Token ids and masks for one input sequence, ready to become `[1, len]` tensors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct EncodedInput {
    pub ids: Vec<i64>,
    pub attention_mask: Vec<i64>,
    pub type_ids: Vec<i64>,
}

/// Runs a sequence-classification ONNX model over text.
///
/// The pipeline for a single text:
/// 1. Tokenization with truncation to `max_sequence_length`
/// 2. Building `input_ids`, `attention_mask` (and `token_type_ids` when the model declares it)
/// 3. Running the session and copying out the logits of the first batch row
///
/// The ONNX model is expected to:
/// - Accept `input_ids` and `attention_mask` (shape [batch_size, sequence_length])
/// - Output logits of shape [batch_size, num_labels]
pub(crate) trait SequenceClassification {
    /// Returns the initialized tokenizer if available
    fn tokenizer(&self) -> Option<&Tokenizer>;

    /// Returns the initialized ONNX session if available
    fn session(&self) -> Option<&Session>;

    /// Returns the maximum sequence length the model can handle
    fn max_sequence_length(&self) -> Option<usize>;

    /// Converts text into model inputs, truncated to `max_sequence_length`.
    ///
    /// Long symptom descriptions are cut rather than rejected so a single message can
    /// never cost more than one bounded inference.
    ///
    /// # Errors
    /// - `TokenizerError` if the tokenizer is not initialized or the text cannot be encoded
    /// - `ValidationError` if the encoding is empty
    fn encode(&self, text: &str) -> Result<EncodedInput, ClassifierError> {
        let tokenizer = self.tokenizer()
            .ok_or_else(|| ClassifierError::TokenizerError("Tokenizer not initialized".into()))?;
        let max_length = self.max_sequence_length()
            .ok_or_else(|| ClassifierError::TokenizerError("Max sequence length not set".into()))?;

        let encoding = tokenizer.encode(text, true)
            .map_err(|e| ClassifierError::TokenizerError(e.to_string()))?;

        let overflow: usize = encoding.get_overflowing().iter().map(|o| o.get_ids().len()).sum();
        if overflow > 0 {
            log::debug!("Input truncated to {} tokens ({} dropped)", max_length, overflow);
        }
        let len = encoding.get_ids().len().min(max_length);
        if len == 0 {
            return Err(ClassifierError::ValidationError("Input produced no tokens".into()));
        }

        let widen = |values: &[u32]| values[..len].iter().map(|&v| i64::from(v)).collect::<Vec<_>>();
        Ok(EncodedInput {
            ids: widen(encoding.get_ids()),
            attention_mask: widen(encoding.get_attention_mask()),
            type_ids: widen(encoding.get_type_ids()),
        })
    }

    /// Whether the model declares a `token_type_ids` input (BERT-style models do).
    fn uses_token_type_ids(&self) -> bool {
        self.session()
            .map(|session| session.inputs.iter().any(|input| input.name == "token_type_ids"))
            .unwrap_or(false)
    }

    /// Tokenizes `text` and returns the raw logits for it.
    fn predict_logits(&self, text: &str) -> Result<Array1<f32>, ClassifierError> {
        let input = self.encode(text)?;
        self.run_logits(&input)
    }

    /// Runs the model on encoded input.
    ///
    /// All tensors created for the run, inputs and outputs alike, are dropped before this
    /// returns so repeated requests do not accumulate device memory.
    ///
    /// # Errors
    /// - `ModelError` if the session is not initialized
    /// - `ModelError` if tensor creation or model execution fails
    /// - `PredictionError` if the output does not have shape [1, num_labels]
    fn run_logits(&self, input: &EncodedInput) -> Result<Array1<f32>, ClassifierError> {
        let session = self.session()
            .ok_or_else(|| ClassifierError::ModelError("Session not initialized".into()))?;

        let mut input_tensors = HashMap::new();
        input_tensors.insert("input_ids", to_tensor(&input.ids, "input")?);
        input_tensors.insert("attention_mask", to_tensor(&input.attention_mask, "mask")?);
        if self.uses_token_type_ids() {
            input_tensors.insert("token_type_ids", to_tensor(&input.type_ids, "token type")?);
        }

        let outputs = session.run(input_tensors)
            .map_err(|e| ClassifierError::ModelError(format!("Failed to run model: {}", e)))?;

        let logits = {
            let output_tensor = outputs[0].try_extract_tensor::<f32>()
                .map_err(|e| ClassifierError::ModelError(format!("Failed to extract output tensor: {}", e)))?;
            match output_tensor.ndim() {
                2 => Array1::from_iter(output_tensor.slice(ndarray::s![0, ..]).iter().cloned()),
                1 => Array1::from_iter(output_tensor.iter().cloned()),
                n => {
                    return Err(ClassifierError::PredictionError(format!(
                        "Expected logits of rank 2, got rank {}",
                        n
                    )))
                }
            }
        };
        drop(outputs);
        log::debug!("Released inference buffers ({} logits)", logits.len());

        Ok(logits)
    }
}

fn to_tensor(values: &[i64], what: &str) -> Result<Tensor<i64>, ClassifierError> {
    let array = Array2::from_shape_vec((1, values.len()), values.to_vec())
        .map_err(|e| ClassifierError::ModelError(format!("Failed to create {} array: {}", what, e)))?;
    Tensor::from_array(array)
        .map_err(|e| ClassifierError::ModelError(format!("Failed to create {} tensor: {}", what, e)))
}
