use std::sync::Arc;

use axum::body::Bytes;

use crate::classifier::SeverityClassifier;
use crate::format::ResponseTemplates;
use crate::line::{parse_events, InboundEvent, SignatureVerifier};
use crate::reply::{ReplyMessage, ReplySender};

/// What happened to one webhook delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// The signature did not match the body.
    Rejected,
    /// The body was not a webhook payload.
    Malformed,
    /// Events were processed; `failed` counts those that got no reply.
    Handled { replied: usize, failed: usize },
}

/// Background half of the webhook: verify, parse, then classify, format and reply per event.
pub struct Pipeline {
    classifier: Arc<dyn SeverityClassifier>,
    sender: Arc<dyn ReplySender>,
    verifier: SignatureVerifier,
    templates: ResponseTemplates,
}

impl Pipeline {
    pub fn new(
        classifier: Arc<dyn SeverityClassifier>,
        sender: Arc<dyn ReplySender>,
        verifier: SignatureVerifier,
    ) -> Self {
        Self {
            classifier,
            sender,
            verifier,
            templates: ResponseTemplates::default(),
        }
    }

    pub fn with_templates(mut self, templates: ResponseTemplates) -> Self {
        self.templates = templates;
        self
    }

    pub fn classifier(&self) -> &Arc<dyn SeverityClassifier> {
        &self.classifier
    }

    pub async fn process(&self, body: Bytes, signature: String) -> ProcessOutcome {
        if !self.verifier.verify(&body, &signature) {
            log::warn!("discarding webhook with invalid signature ({} bytes)", body.len());
            return ProcessOutcome::Rejected;
        }
        let events = match parse_events(&body) {
            Ok(events) => events,
            Err(e) => {
                log::warn!("discarding malformed webhook body: {}", e);
                return ProcessOutcome::Malformed;
            }
        };
        log::debug!("webhook carries {} text events", events.len());

        let (mut replied, mut failed) = (0, 0);
        for event in events {
            if self.handle_event(event).await {
                replied += 1;
            } else {
                failed += 1;
            }
        }
        ProcessOutcome::Handled { replied, failed }
    }

    async fn handle_event(&self, event: InboundEvent) -> bool {
        let InboundEvent { reply_token, message_text } = event;
        let result = match self.classifier.classify(&message_text).await {
            Ok(result) => result,
            Err(e) => {
                log::error!("classification failed ({}): {}", self.classifier.name(), e);
                return false;
            }
        };
        log::info!("classified message as {:?}", result.assessment);

        let message = match ReplyMessage::new(reply_token, self.templates.format(&result)) {
            Ok(message) => message,
            Err(e) => {
                log::error!("cannot build reply: {}", e);
                return false;
            }
        };
        match self.sender.send(message).await {
            Ok(()) => true,
            Err(e) => {
                log::error!("reply delivery failed: {}", e);
                false
            }
        }
    }
}
