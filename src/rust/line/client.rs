//! LINE Messaging API reply client.

use async_trait::async_trait;
use serde::Serialize;

use crate::config::LineConfig;
use crate::reply::{ReplyMessage, ReplySender, SendError};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ReplyRequest<'a> {
    reply_token: &'a str,
    messages: [TextMessage<'a>; 1],
}

#[derive(Debug, Serialize)]
struct TextMessage<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    text: &'a str,
}

/// Sends replies through `POST {api_base}/v2/bot/message/reply`.
#[derive(Clone)]
pub struct LineClient {
    api_base: String,
    access_token: String,
    client: reqwest::Client,
}

impl LineClient {
    pub fn new(config: &LineConfig) -> Self {
        Self {
            api_base: config.api_base.trim_end_matches('/').to_string(),
            access_token: config.access_token.clone(),
            client: reqwest::Client::new(),
        }
    }

    pub fn reply_url(&self) -> String {
        format!("{}/v2/bot/message/reply", self.api_base)
    }
}

#[async_trait]
impl ReplySender for LineClient {
    async fn send(&self, message: ReplyMessage) -> Result<(), SendError> {
        let (token, text) = message.into_parts();
        let body = ReplyRequest {
            reply_token: token.as_str(),
            messages: [TextMessage { kind: "text", text: &text }],
        };
        let res = self
            .client
            .post(self.reply_url())
            .bearer_auth(&self.access_token)
            .json(&body)
            .send()
            .await?;
        if !res.status().is_success() {
            let status = res.status().as_u16();
            let body = res.text().await.unwrap_or_default();
            return Err(SendError::Api { status, body });
        }
        log::debug!("reply delivered ({} chars)", text.chars().count());
        Ok(())
    }
}
