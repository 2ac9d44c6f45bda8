//! Webhook handling: acknowledge on the request path, process on the worker pool.

mod dispatcher;
mod pipeline;
mod pool;

pub use dispatcher::{Dispatcher, ACCEPTED, MISSING_SIGNATURE};
pub use pipeline::{Pipeline, ProcessOutcome};
pub use pool::{SubmitError, WorkerPool};
