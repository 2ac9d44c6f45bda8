#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use env_logger::{Builder, Env};
use tokio::sync::Notify;

use esi_triage::{
    ClassifierError, ReplyMessage, ReplySender, SendError, SeverityClassifier, SeverityLevel,
    SeverityResult, SignatureVerifier,
};

pub const CHANNEL_SECRET: &str = "test-channel-secret";

// Initialize test logger
pub fn init() {
    let _ = Builder::from_env(Env::default().default_filter_or("warn"))
        .is_test(true)
        .try_init();
}

pub fn sign(body: &str) -> String {
    SignatureVerifier::new(CHANNEL_SECRET).sign(body.as_bytes()).unwrap()
}

pub fn text_event_body(events: &[(&str, &str)]) -> String {
    let events: Vec<serde_json::Value> = events
        .iter()
        .map(|(token, text)| {
            serde_json::json!({
                "type": "message",
                "mode": "active",
                "replyToken": token,
                "message": {"type": "text", "id": "1", "text": text}
            })
        })
        .collect();
    serde_json::json!({"destination": "U000", "events": events}).to_string()
}

/// Returns a fixed outcome, optionally holding every call until `gate` is notified.
pub struct StubClassifier {
    outcome: Option<SeverityResult>,
    gate: Option<Arc<Notify>>,
    pub texts: Mutex<Vec<String>>,
}

impl StubClassifier {
    pub fn level(level: u8) -> Self {
        Self::with_outcome(Some(SeverityResult::level(SeverityLevel::new(level).unwrap())))
    }

    pub fn indeterminate() -> Self {
        Self::with_outcome(Some(SeverityResult::indeterminate()))
    }

    pub fn failing() -> Self {
        Self::with_outcome(None)
    }

    fn with_outcome(outcome: Option<SeverityResult>) -> Self {
        Self {
            outcome,
            gate: None,
            texts: Mutex::new(Vec::new()),
        }
    }

    pub fn gated(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }
}

#[async_trait]
impl SeverityClassifier for StubClassifier {
    fn name(&self) -> &str {
        "stub"
    }

    async fn classify(&self, text: &str) -> Result<SeverityResult, ClassifierError> {
        self.texts.lock().unwrap().push(text.to_string());
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        self.outcome
            .clone()
            .ok_or_else(|| ClassifierError::PredictionError("stub failure".into()))
    }
}

/// Records every reply as `(token, text)`.
#[derive(Default)]
pub struct RecordingSender {
    pub sent: Mutex<Vec<(String, String)>>,
    delivered: Notify,
    calls: AtomicUsize,
    fail: bool,
}

impl RecordingSender {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }

    /// Waits for the next delivery, panicking after five seconds.
    pub async fn wait_for_delivery(&self) {
        tokio::time::timeout(Duration::from_secs(5), self.delivered.notified())
            .await
            .expect("no reply was sent");
    }
}

#[async_trait]
impl ReplySender for RecordingSender {
    async fn send(&self, message: ReplyMessage) -> Result<(), SendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let result = if self.fail {
            Err(SendError::Api {
                status: 400,
                body: r#"{"message":"Invalid reply token"}"#.to_string(),
            })
        } else {
            let (token, text) = message.into_parts();
            self.sent.lock().unwrap().push((token.as_str().to_string(), text));
            Ok(())
        };
        self.delivered.notify_one();
        result
    }
}
