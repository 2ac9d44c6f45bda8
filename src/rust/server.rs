//! HTTP surface: `POST /webhook` and a `GET /` health check.

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};

use crate::classifier::SeverityClassifier;
use crate::config::Config;
use crate::line::{SignatureVerifier, SIGNATURE_HEADER};
use crate::reply::ReplySender;
use crate::webhook::{Dispatcher, Pipeline, WorkerPool};

#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Dispatcher,
}

impl AppState {
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self { dispatcher }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(health))
        .route("/webhook", post(webhook))
        .with_state(state)
}

/// Liveness plus the active classifier backend.
async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "classifier": state.dispatcher.pipeline().classifier().name(),
    }))
}

/// Answers before any classification happens.
async fn webhook(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> (StatusCode, &'static str) {
    let signature = headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok());
    state.dispatcher.handle(body, signature)
}

/// Serves webhooks until SIGINT or SIGTERM, then drains queued jobs and shuts the
/// classifier down.
pub async fn run(
    config: &Config,
    classifier: Arc<dyn SeverityClassifier>,
    sender: Arc<dyn ReplySender>,
) -> Result<()> {
    let pipeline = Arc::new(Pipeline::new(
        classifier.clone(),
        sender,
        SignatureVerifier::new(&config.line.channel_secret),
    ));
    let pool = Arc::new(WorkerPool::new(
        config.server.worker_concurrency,
        config.server.queue_capacity,
    ));
    let dispatcher = Dispatcher::new(pipeline, pool.clone());
    let app = router(AppState::new(dispatcher));

    let bind_addr = config.server.bind_addr();
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("binding to {}", bind_addr))?;
    log::info!("listening on {} (classifier: {})", bind_addr, classifier.name());

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server exited")?;

    pool.shutdown().await;
    classifier.shutdown();
    log::info!("server stopped");
    Ok(())
}

/// Completes on SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::error!("failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                log::error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    log::info!("shutdown signal received, draining connections");
}
