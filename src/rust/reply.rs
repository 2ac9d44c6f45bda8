//! Outbound replies and the seam that delivers them.

use async_trait::async_trait;

/// Single-use token issued with an inbound event.
///
/// Deliberately not `Clone`: building a [`ReplyMessage`] consumes it, so one token can
/// back at most one reply.
#[derive(Debug, PartialEq, Eq)]
pub struct ReplyToken(String);

impl ReplyToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SendError {
    #[error("reply text is empty")]
    EmptyText,
    #[error("reply request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("reply api error: {status} {body}")]
    Api { status: u16, body: String },
}

/// A text reply bound to the token of the event it answers.
#[derive(Debug)]
pub struct ReplyMessage {
    token: ReplyToken,
    text: String,
}

impl ReplyMessage {
    pub fn new(token: ReplyToken, text: impl Into<String>) -> Result<Self, SendError> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(SendError::EmptyText);
        }
        Ok(Self { token, text })
    }

    pub fn token(&self) -> &ReplyToken {
        &self.token
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn into_parts(self) -> (ReplyToken, String) {
        (self.token, self.text)
    }
}

/// Delivers replies to the messaging platform. Each message is sent at most once.
#[async_trait]
pub trait ReplySender: Send + Sync {
    async fn send(&self, message: ReplyMessage) -> Result<(), SendError>;
}
