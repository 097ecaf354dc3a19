use crate::e2e::helpers;

use helpers::{unreachable_url, TestContext, TEST_API_KEY};
use readaloud::domain::playback::PlaybackSettings;
use readaloud::infrastructure::repositories::{HttpTtsRepository, SynthesisError, TtsRepository};
use serde_json::json;
use std::time::Duration;
use test_context::test_context;

fn repository() -> HttpTtsRepository {
    HttpTtsRepository::new(Duration::from_secs(5)).unwrap()
}

fn settings_for(endpoint: &str) -> PlaybackSettings {
    PlaybackSettings {
        endpoint: endpoint.to_string(),
        credential: TEST_API_KEY.to_string(),
        voice_id: "af_bella".to_string(),
        ..PlaybackSettings::default()
    }
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_post_an_openai_compatible_speech_request(ctx: &TestContext) {
    let audio = repository()
        .synthesize("Hello there.", &settings_for(&ctx.speech.base_url))
        .await
        .unwrap();

    assert_eq!(&audio[..], b"Hello there.");

    let requests = ctx.speech.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].path, "/audio/speech");
    assert_eq!(
        requests[0].authorization.as_deref(),
        Some("Bearer test-api-key")
    );
    assert_eq!(
        requests[0].body,
        Some(json!({
            "model": "kokoro",
            "voice": "af_bella",
            "input": "Hello there.",
            "response_format": "mp3"
        }))
    );
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_tolerate_a_trailing_slash_in_the_endpoint(ctx: &TestContext) {
    let endpoint = format!("{}/", ctx.speech.base_url);

    repository()
        .synthesize("Slash.", &settings_for(&endpoint))
        .await
        .unwrap();

    assert_eq!(ctx.speech.requests()[0].path, "/audio/speech");
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_surface_the_service_status_on_failure(ctx: &TestContext) {
    let result = repository()
        .synthesize("Please FAIL.", &settings_for(&ctx.speech.base_url))
        .await;

    assert_eq!(result, Err(SynthesisError::Service { status: 500 }));
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_reject_an_empty_audio_body(ctx: &TestContext) {
    let result = repository()
        .synthesize("EMPTY reply.", &settings_for(&ctx.speech.base_url))
        .await;

    assert_eq!(result, Err(SynthesisError::EmptyResponse));
}

#[tokio::test]
async fn it_should_report_network_errors_for_unreachable_servers() {
    let endpoint = unreachable_url().await;

    let result = repository()
        .synthesize("Anyone there?", &settings_for(&endpoint))
        .await;

    assert!(
        matches!(result, Err(SynthesisError::Network(_))),
        "{result:?}"
    );
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_check_connection_against_the_voices_listing(ctx: &TestContext) {
    repository()
        .check_connection(&settings_for(&ctx.speech.base_url))
        .await
        .unwrap();

    let requests = ctx.speech.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].path, "/audio/voices");
    assert_eq!(
        requests[0].authorization.as_deref(),
        Some("Bearer test-api-key")
    );
}
