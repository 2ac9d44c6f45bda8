use esi_triage::{LineClient, LineConfig, ReplyMessage, ReplySender, ReplyToken, SendError};
use httpmock::prelude::*;
use serde_json::json;

fn client(server: &MockServer) -> LineClient {
    LineClient::new(&LineConfig {
        access_token: "access-token".into(),
        channel_secret: "secret".into(),
        api_base: server.base_url(),
    })
}

#[tokio::test]
async fn test_reply_request() -> Result<(), Box<dyn std::error::Error>> {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/v2/bot/message/reply")
                .header("authorization", "Bearer access-token")
                .header("content-type", "application/json")
                .json_body(json!({
                    "replyToken": "nHuyWiB7yP5Zw52FIkcQobQuGDXCTA",
                    "messages": [{"type": "text", "text": "💊 ไปพบแพทย์พรุ่งนี้ (ESI 5)"}]
                }));
            then.status(200).json_body(json!({}));
        })
        .await;

    let message = ReplyMessage::new(
        ReplyToken::new("nHuyWiB7yP5Zw52FIkcQobQuGDXCTA"),
        "💊 ไปพบแพทย์พรุ่งนี้ (ESI 5)",
    )?;
    client(&server).send(message).await?;
    mock.assert_async().await;
    Ok(())
}

#[tokio::test]
async fn test_api_error_surfaces_status() -> Result<(), Box<dyn std::error::Error>> {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST).path("/v2/bot/message/reply");
            then.status(400).body(r#"{"message":"Invalid reply token"}"#);
        })
        .await;

    let message = ReplyMessage::new(ReplyToken::new("expired"), "hello")?;
    match client(&server).send(message).await {
        Err(SendError::Api { status, body }) => {
            assert_eq!(status, 400);
            assert!(body.contains("Invalid reply token"));
        }
        other => panic!("unexpected result: {:?}", other),
    }
    // Sent exactly once, never retried.
    assert_eq!(mock.hits_async().await, 1);
    Ok(())
}

#[tokio::test]
async fn test_unreachable_api() -> Result<(), Box<dyn std::error::Error>> {
    let client = LineClient::new(&LineConfig {
        access_token: "access-token".into(),
        channel_secret: "secret".into(),
        api_base: "http://127.0.0.1:1".into(),
    });
    let message = ReplyMessage::new(ReplyToken::new("r1"), "hello")?;
    assert!(matches!(client.send(message).await, Err(SendError::Transport(_))));
    Ok(())
}
