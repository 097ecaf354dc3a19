use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use std::sync::Arc;

use crate::domain::player::{PlayerService, PlayerServiceApi};

pub async fn health() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

pub async fn health_ready(State(player_service): State<Arc<PlayerService>>) -> impl IntoResponse {
    let heartbeat = player_service.heartbeat().await;

    if heartbeat.alive {
        (
            StatusCode::OK,
            Json(json!({
                "status": "ready",
                "engine": "alive",
                "isPlaying": heartbeat.is_playing
            })),
        )
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "status": "not_ready",
                "engine": "unresponsive"
            })),
        )
    }
}
