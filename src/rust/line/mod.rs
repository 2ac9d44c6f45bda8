//! LINE Messaging API: webhook parsing, signature checks and the reply client.

mod client;
mod events;
mod signature;

pub use client::LineClient;
pub use events::{parse_events, InboundEvent};
pub use signature::SignatureVerifier;

/// Header carrying the webhook body signature.
pub const SIGNATURE_HEADER: &str = "x-line-signature";
