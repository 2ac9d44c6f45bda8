//! Severity classification through a text-generation server (Ollama-compatible
//! `POST /api/generate`). The generated text goes through [`parse_level`].

use std::sync::atomic::{AtomicBool, Ordering};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::error::ClassifierError;
use super::severity::{parse_level, SeverityResult};
use super::SeverityClassifier;

const MAX_GENERATED_TOKENS: u32 = 200;

pub struct GenerativeClassifier {
    base_url: String,
    model: String,
    max_input_chars: usize,
    client: reqwest::Client,
    closed: AtomicBool,
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: String,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Debug, Serialize)]
struct GenerateOptions {
    num_predict: u32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}

impl GenerativeClassifier {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>, max_input_chars: usize) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            max_input_chars,
            client: reqwest::Client::new(),
            closed: AtomicBool::new(false),
        }
    }

    /// Builds the triage prompt, cutting the symptom text to `max_input_chars` characters.
    pub fn prompt(&self, text: &str) -> String {
        let symptoms: String = text.trim().chars().take(self.max_input_chars).collect();
        format!("Patient symptoms: {}\nWhat is the ESI level (1-5)?", symptoms)
    }

    async fn generate(&self, prompt: String) -> Result<String, ClassifierError> {
        let url = format!("{}/api/generate", self.base_url);
        let body = GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
            options: GenerateOptions {
                num_predict: MAX_GENERATED_TOKENS,
            },
        };
        let res = self.client.post(&url).json(&body).send().await?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(ClassifierError::BackendError(format!("generate failed: {} {}", status, body)));
        }
        let data: GenerateResponse = res.json().await?;
        Ok(data.response)
    }
}

#[async_trait]
impl SeverityClassifier for GenerativeClassifier {
    fn name(&self) -> &str {
        "generative"
    }

    async fn classify(&self, text: &str) -> Result<SeverityResult, ClassifierError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(ClassifierError::BackendError("Classifier has been shut down".into()));
        }
        if text.trim().is_empty() {
            return Ok(SeverityResult::indeterminate());
        }

        let generated = self.generate(self.prompt(text)).await?;
        log::debug!("generation output: {}", generated);
        let assessment = parse_level(&generated);
        Ok(SeverityResult {
            assessment,
            rationale: None,
        }
        .with_rationale(generated.trim()))
    }

    fn shutdown(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            log::info!("generative classifier shut down ({} @ {})", self.model, self.base_url);
        }
    }
}
