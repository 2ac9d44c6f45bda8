use std::sync::Arc;

use axum::body::Bytes;
use axum::http::StatusCode;

use super::pipeline::Pipeline;
use super::pool::{SubmitError, WorkerPool};

pub const MISSING_SIGNATURE: &str = "Missing Signature";
pub const ACCEPTED: &str = "OK";

/// Front half of the webhook: checks the signature header is present, queues the work
/// and answers at once.
#[derive(Clone)]
pub struct Dispatcher {
    pipeline: Arc<Pipeline>,
    pool: Arc<WorkerPool>,
}

impl Dispatcher {
    pub fn new(pipeline: Arc<Pipeline>, pool: Arc<WorkerPool>) -> Self {
        Self { pipeline, pool }
    }

    pub fn pipeline(&self) -> &Arc<Pipeline> {
        &self.pipeline
    }

    /// Never waits on classification or delivery. A full queue drops the delivery but
    /// still answers `200 OK`.
    pub fn handle(&self, raw_body: Bytes, signature: Option<&str>) -> (StatusCode, &'static str) {
        let signature = match signature.map(str::trim) {
            Some(s) if !s.is_empty() => s.to_string(),
            _ => {
                log::warn!("webhook without signature header rejected");
                return (StatusCode::BAD_REQUEST, MISSING_SIGNATURE);
            }
        };

        let pipeline = self.pipeline.clone();
        let submitted = self.pool.submit(async move {
            let outcome = pipeline.process(raw_body, signature).await;
            log::debug!("webhook processed: {:?}", outcome);
        });
        match submitted {
            Ok(()) => {}
            Err(SubmitError::QueueFull) => log::error!("worker queue full, webhook dropped"),
            Err(SubmitError::Closed) => log::warn!("shutting down, webhook dropped"),
        }
        (StatusCode::OK, ACCEPTED)
    }
}
