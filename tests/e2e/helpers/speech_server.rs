use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;

/// A request received by the mock speech server
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub path: String,
    pub authorization: Option<String>,
    pub body: Option<Value>,
}

type Recorded = Arc<Mutex<Vec<RecordedRequest>>>;

/// In-process stand-in for an OpenAI-compatible speech endpoint
///
/// Input containing `FAIL` gets a 500, input containing `EMPTY` gets an
/// empty 200. Anything else is "synthesized" as its own UTF-8 bytes.
pub struct MockSpeechServer {
    pub base_url: String,
    requests: Recorded,
}

impl MockSpeechServer {
    pub async fn start() -> Self {
        let requests: Recorded = Arc::new(Mutex::new(Vec::new()));

        let app = Router::new()
            .route("/audio/speech", post(speech))
            .route("/audio/voices", get(voices))
            .with_state(requests.clone());

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind mock speech server");
        let addr = listener.local_addr().expect("Failed to get local addr");

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url: format!("http://{}", addr),
            requests,
        }
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Inputs of every speech request, in arrival order
    pub fn speech_inputs(&self) -> Vec<String> {
        self.requests()
            .iter()
            .filter(|r| r.path == "/audio/speech")
            .filter_map(|r| r.body.as_ref()?.get("input")?.as_str().map(str::to_string))
            .collect()
    }
}

async fn speech(
    State(requests): State<Recorded>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    let input = body
        .get("input")
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string();

    requests.lock().unwrap().push(RecordedRequest {
        path: "/audio/speech".to_string(),
        authorization: authorization(&headers),
        body: Some(body),
    });

    if input.contains("FAIL") {
        return (StatusCode::INTERNAL_SERVER_ERROR, Vec::new()).into_response();
    }
    if input.contains("EMPTY") {
        return (StatusCode::OK, Vec::new()).into_response();
    }

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "audio/mpeg")],
        input.into_bytes(),
    )
        .into_response()
}

async fn voices(State(requests): State<Recorded>, headers: HeaderMap) -> impl IntoResponse {
    requests.lock().unwrap().push(RecordedRequest {
        path: "/audio/voices".to_string(),
        authorization: authorization(&headers),
        body: None,
    });

    Json(json!({ "voices": ["af_bella", "am_adam"] }))
}

fn authorization(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}
