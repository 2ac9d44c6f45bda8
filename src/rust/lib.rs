//! A webhook service that triages chat messages into Emergency Severity Index (ESI) levels.
//!
//! The service receives LINE Messaging API webhook calls, acknowledges them right away,
//! and classifies each text message on a bounded worker pool. The classified level is
//! turned into a templated reply that is pushed back with the event's reply token.
//!
//! # Basic Usage
//!
//! ```rust,no_run
//! # async fn run() -> anyhow::Result<()> {
//! use std::sync::Arc;
//! use esi_triage::{classifier, provision, server, Config, LineClient};
//!
//! let config = Config::from_env()?;
//! let manager = provision::bootstrap(&config, false).await?;
//! let classifier = classifier::initialize(&config.classifier, &manager).await?;
//! let sender = Arc::new(LineClient::new(&config.line));
//! server::run(&config, classifier, sender).await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Formatting Only
//!
//! ```rust
//! use esi_triage::{format, SeverityLevel, SeverityResult};
//!
//! let level = SeverityLevel::new(2).unwrap();
//! let reply = format(&SeverityResult::level(level));
//! assert!(reply.contains("ESI 2"));
//! ```

pub mod classifier;
pub mod config;
mod format;
pub mod line;
pub mod model_manager;
pub mod models;
pub mod provision;
mod reply;
mod runtime;
pub mod server;
pub mod webhook;

pub use classifier::{
    parse_level, Assessment, ClassifierBuilder, ClassifierError, OnnxClassifier, GenerativeClassifier,
    SeverityClassifier, SeverityLevel, SeverityResult,
};
pub use config::{ClassifierConfig, Config, ConfigError, CredentialsConfig, LineConfig, ServerConfig};
pub use format::{format, ResponseTemplates, SeverityBand};
pub use line::{InboundEvent, LineClient, SignatureVerifier};
pub use model_manager::{ModelArtifacts, ModelError, ModelManager};
pub use models::{ModelBackend, ModelCharacteristics, ModelInfo, ModelSource};
pub use reply::{ReplyMessage, ReplySender, ReplyToken, SendError};
pub use runtime::{create_session_builder, RuntimeConfig};
pub use webhook::{Dispatcher, Pipeline, ProcessOutcome, WorkerPool};

/// Initializes `env_logger`, defaulting to the `info` level when `RUST_LOG` is unset.
pub fn init_logger() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
}
