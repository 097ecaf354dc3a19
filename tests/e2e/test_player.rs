use crate::e2e::helpers;

use helpers::{unreachable_url, TestContext, TEST_API_KEY};
use hyper::StatusCode;
use serde_json::json;
use std::time::Duration;
use test_context::test_context;

const THREE_SENTENCES: &str = "First sentence. Second one. Third bit.";

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_accept_text_and_start_reading(ctx: &TestContext) {
    let response = ctx
        .client
        .post("/api/player/start", &json!({ "text": THREE_SENTENCES }))
        .await
        .unwrap();

    response.assert_status(StatusCode::ACCEPTED);
    assert_eq!(response.field("isPlaying").as_bool(), Some(true));
    assert_eq!(response.field("totalChunks").as_u64(), Some(3));
    assert_eq!(response.field("currentIndex").as_u64(), Some(0));
    assert!(response.field("sessionId").is_string());
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_synthesize_every_chunk_in_order(ctx: &TestContext) {
    ctx.client
        .post("/api/player/start", &json!({ "text": THREE_SENTENCES }))
        .await
        .unwrap()
        .assert_status(StatusCode::ACCEPTED);

    let status = ctx.wait_until_idle().await;
    assert_eq!(status["totalChunks"], json!(0));
    assert!(status.get("lastError").is_none());

    assert_eq!(
        ctx.speech.speech_inputs(),
        vec!["First sentence.", "Second one.", "Third bit."]
    );

    for request in ctx.speech.requests() {
        assert_eq!(
            request.authorization.as_deref(),
            Some(format!("Bearer {}", TEST_API_KEY).as_str())
        );
    }
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_reject_empty_text(ctx: &TestContext) {
    let response = ctx
        .client
        .post("/api/player/start", &json!({ "text": "   \n  " }))
        .await
        .unwrap();

    response
        .assert_status(StatusCode::BAD_REQUEST)
        .assert_error_message("No text to read");
    assert!(ctx.speech.speech_inputs().is_empty());
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_reject_zero_chunk_size(ctx: &TestContext) {
    let response = ctx
        .client
        .post(
            "/api/player/start",
            &json!({ "text": THREE_SENTENCES, "settings": { "chunkSizeChars": 0 } }),
        )
        .await
        .unwrap();

    response.assert_status(StatusCode::BAD_REQUEST);

    let status = ctx.client.get("/api/player/status").await.unwrap();
    assert_eq!(status.field("isPlaying").as_bool(), Some(false));
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_use_voice_from_request_settings(ctx: &TestContext) {
    ctx.client
        .post(
            "/api/player/start",
            &json!({ "text": "Just one.", "settings": { "voiceId": "am_adam" } }),
        )
        .await
        .unwrap()
        .assert_status(StatusCode::ACCEPTED);

    ctx.wait_until_idle().await;

    let requests = ctx.speech.requests();
    assert_eq!(requests.len(), 1);
    let body = requests[0].body.as_ref().unwrap();
    assert_eq!(body["voice"], json!("am_adam"));
    assert_eq!(body["input"], json!("Just one."));
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_stop_reading(ctx: &TestContext) {
    ctx.client
        .post("/api/player/start", &json!({ "text": THREE_SENTENCES }))
        .await
        .unwrap()
        .assert_status(StatusCode::ACCEPTED);

    let response = ctx.client.post_empty("/api/player/stop").await.unwrap();

    response.assert_status(StatusCode::OK);
    assert_eq!(response.field("isPlaying").as_bool(), Some(false));
    assert_eq!(response.field("phase"), &json!({ "state": "stopped" }));

    // Stopping twice is harmless
    ctx.client
        .post_empty("/api/player/stop")
        .await
        .unwrap()
        .assert_status(StatusCode::OK);
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_skip_a_chunk_that_fails_to_synthesize(ctx: &TestContext) {
    ctx.client
        .post(
            "/api/player/start",
            &json!({ "text": "First sentence. Please FAIL now. Third bit." }),
        )
        .await
        .unwrap()
        .assert_status(StatusCode::ACCEPTED);

    let status = ctx.wait_until_idle().await;

    let last_error = status["lastError"].as_str().expect("Missing lastError");
    assert!(last_error.contains("status 500"), "{last_error}");
    // A failed preload is retried once the chunk is reached
    let mut inputs = ctx.speech.speech_inputs();
    inputs.dedup();
    assert_eq!(inputs.first().map(String::as_str), Some("First sentence."));
    assert!(inputs.contains(&"Please FAIL now.".to_string()));
    assert!(inputs.contains(&"Third bit.".to_string()));
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_report_a_live_heartbeat(ctx: &TestContext) {
    let response = ctx.client.get("/api/player/heartbeat").await.unwrap();

    response.assert_status(StatusCode::OK);
    assert_eq!(response.field("alive").as_bool(), Some(true));
    assert_eq!(response.field("isPlaying").as_bool(), Some(false));
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_check_the_speech_server(ctx: &TestContext) {
    let response = ctx.client.get("/api/server/check").await.unwrap();

    response.assert_status(StatusCode::OK);
    assert_eq!(response.field("connected").as_bool(), Some(true));
    let message = response.field("message").as_str().unwrap();
    assert!(message.contains(&ctx.speech.base_url), "{message}");
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_report_an_unreachable_speech_server(ctx: &TestContext) {
    let endpoint = unreachable_url().await;

    let response = ctx
        .client
        .get(&format!("/api/server/check?endpoint={}", endpoint))
        .await
        .unwrap();

    response.assert_status(StatusCode::OK);
    assert_eq!(response.field("connected").as_bool(), Some(false));
    let message = response.field("message").as_str().unwrap();
    assert!(message.starts_with("Cannot connect to TTS server"), "{message}");
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_stream_player_events(ctx: &TestContext) {
    let mut stream = reqwest::get(format!("{}/api/player/events", ctx.base_url))
        .await
        .unwrap();
    assert_eq!(
        stream.headers()["content-type"].to_str().unwrap(),
        "text/event-stream"
    );

    ctx.client
        .post("/api/player/start", &json!({ "text": THREE_SENTENCES }))
        .await
        .unwrap()
        .assert_status(StatusCode::ACCEPTED);

    let received = tokio::time::timeout(Duration::from_secs(10), async {
        let mut received = String::new();
        while let Some(chunk) = stream.chunk().await.unwrap() {
            received.push_str(&String::from_utf8_lossy(&chunk));
            if received.contains("chunkStarted") {
                break;
            }
        }
        received
    })
    .await
    .expect("No chunkStarted event received");

    assert!(received.contains("processingUpdate"), "{received}");
    assert!(received.contains("\"type\":\"chunkStarted\""), "{received}");
}
