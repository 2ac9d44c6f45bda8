//! Webhook payload parsing.
//!
//! Only text messages are kept. Follow, postback and media events, standby-mode
//! deliveries and events without a reply token have nothing to answer.

use serde::Deserialize;

use crate::reply::ReplyToken;

/// A text message that can be answered with its reply token.
#[derive(Debug)]
pub struct InboundEvent {
    pub reply_token: ReplyToken,
    pub message_text: String,
}

#[derive(Debug, Deserialize)]
struct WebhookBody {
    #[serde(default)]
    events: Vec<RawEvent>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawEvent {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    mode: Option<String>,
    #[serde(default)]
    reply_token: Option<String>,
    #[serde(default)]
    message: Option<RawMessage>,
}

#[derive(Debug, Deserialize)]
struct RawMessage {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

impl RawEvent {
    fn into_inbound(self) -> Option<InboundEvent> {
        if self.kind != "message" || self.mode.as_deref() == Some("standby") {
            return None;
        }
        let message = self.message.filter(|m| m.kind == "text")?;
        let token = self.reply_token.filter(|t| !t.is_empty())?;
        Some(InboundEvent {
            reply_token: ReplyToken::new(token),
            message_text: message.text.unwrap_or_default(),
        })
    }
}

/// Parses a webhook body into answerable text events, in delivery order.
pub fn parse_events(body: &[u8]) -> Result<Vec<InboundEvent>, serde_json::Error> {
    let body: WebhookBody = serde_json::from_slice(body)?;
    Ok(body.events.into_iter().filter_map(RawEvent::into_inbound).collect())
}
