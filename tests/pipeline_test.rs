mod common;

use std::sync::Arc;

use axum::body::Bytes;
use common::{init, sign, text_event_body, RecordingSender, StubClassifier, CHANNEL_SECRET};
use esi_triage::{format, Pipeline, ProcessOutcome, ResponseTemplates, SeverityLevel, SeverityResult, SignatureVerifier};

fn pipeline(classifier: Arc<StubClassifier>, sender: Arc<RecordingSender>) -> Pipeline {
    Pipeline::new(classifier, sender, SignatureVerifier::new(CHANNEL_SECRET))
}

async fn process(pipeline: &Pipeline, body: String) -> ProcessOutcome {
    let signature = sign(&body);
    pipeline.process(Bytes::from(body), signature).await
}

#[tokio::test]
async fn test_emergency_reply() -> Result<(), Box<dyn std::error::Error>> {
    init();
    let classifier = Arc::new(StubClassifier::level(2));
    let sender = Arc::new(RecordingSender::default());
    let pipeline = pipeline(classifier.clone(), sender.clone());

    let outcome = process(&pipeline, text_event_body(&[("r1", "chest pain")])).await;
    assert_eq!(outcome, ProcessOutcome::Handled { replied: 1, failed: 0 });

    assert_eq!(*classifier.texts.lock().unwrap(), vec!["chest pain".to_string()]);
    let sent = sender.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, "r1");
    assert!(sent[0].1.starts_with("🚨"));
    assert!(sent[0].1.contains("ESI 2"));
    assert_eq!(sender.calls(), 1);
    Ok(())
}

#[tokio::test]
async fn test_indeterminate_asks_for_details() -> Result<(), Box<dyn std::error::Error>> {
    init();
    let sender = Arc::new(RecordingSender::default());
    let pipeline = pipeline(Arc::new(StubClassifier::indeterminate()), sender.clone());

    process(&pipeline, text_event_body(&[("r1", "???")])).await;

    let sent = sender.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].1, ResponseTemplates::default().clarify);
    assert_eq!(sent[0].1, format(&SeverityResult::indeterminate()));
    Ok(())
}

#[tokio::test]
async fn test_invalid_signature_discarded() {
    init();
    let classifier = Arc::new(StubClassifier::level(3));
    let sender = Arc::new(RecordingSender::default());
    let pipeline = pipeline(classifier.clone(), sender.clone());

    let body = text_event_body(&[("r1", "fever")]);
    let forged = SignatureVerifier::new("wrong-secret").sign(body.as_bytes()).unwrap();
    let outcome = pipeline.process(Bytes::from(body), forged).await;

    assert_eq!(outcome, ProcessOutcome::Rejected);
    assert!(classifier.texts.lock().unwrap().is_empty());
    assert_eq!(sender.calls(), 0);
}

#[tokio::test]
async fn test_malformed_body_discarded() {
    init();
    let sender = Arc::new(RecordingSender::default());
    let pipeline = pipeline(Arc::new(StubClassifier::level(3)), sender.clone());

    let outcome = process(&pipeline, "not a webhook".to_string()).await;
    assert_eq!(outcome, ProcessOutcome::Malformed);
    assert_eq!(sender.calls(), 0);
}

#[tokio::test]
async fn test_classifier_error_sends_nothing() {
    init();
    let sender = Arc::new(RecordingSender::default());
    let pipeline = pipeline(Arc::new(StubClassifier::failing()), sender.clone());

    let outcome = process(&pipeline, text_event_body(&[("r1", "headache")])).await;
    assert_eq!(outcome, ProcessOutcome::Handled { replied: 0, failed: 1 });
    assert_eq!(sender.calls(), 0);
}

#[tokio::test]
async fn test_delivery_failure_is_swallowed() {
    init();
    let sender = Arc::new(RecordingSender::failing());
    let pipeline = pipeline(Arc::new(StubClassifier::level(4)), sender.clone());

    let outcome = process(&pipeline, text_event_body(&[("r1", "sore throat")])).await;
    assert_eq!(outcome, ProcessOutcome::Handled { replied: 0, failed: 1 });
    // Never retried.
    assert_eq!(sender.calls(), 1);
}

#[tokio::test]
async fn test_each_event_uses_its_own_token() {
    init();
    let sender = Arc::new(RecordingSender::default());
    let pipeline = pipeline(Arc::new(StubClassifier::level(5)), sender.clone());

    let body = text_event_body(&[("r1", "rash"), ("r2", "cough")]);
    let outcome = process(&pipeline, body).await;
    assert_eq!(outcome, ProcessOutcome::Handled { replied: 2, failed: 0 });

    let tokens: Vec<String> = sender.sent().into_iter().map(|(token, _)| token).collect();
    assert_eq!(tokens, vec!["r1", "r2"]);
}

#[tokio::test]
async fn test_custom_templates() {
    init();
    let sender = Arc::new(RecordingSender::default());
    let templates = ResponseTemplates {
        urgent: "See a doctor today (ESI {level})".into(),
        ..ResponseTemplates::default()
    };
    let pipeline = pipeline(Arc::new(StubClassifier::level(3)), sender.clone()).with_templates(templates.clone());

    process(&pipeline, text_event_body(&[("r1", "high fever")])).await;
    assert_eq!(sender.sent()[0].1, "See a doctor today (ESI 3)");
    assert_eq!(
        templates.format(&SeverityResult::level(SeverityLevel::new(3).unwrap())),
        "See a doctor today (ESI 3)"
    );
}
