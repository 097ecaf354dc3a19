use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use futures::stream::{self, Stream};
use serde::Deserialize;
use std::convert::Infallible;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;

use crate::{
    domain::playback::{Heartbeat, SettingsOverrides, StatusSnapshot},
    domain::player::{PlayerService, PlayerServiceApi, ServerCheck},
    error::AppResult,
};

/// Request for POST /api/player/start
#[derive(Debug, Deserialize)]
pub struct StartRequest {
    pub text: String,
    #[serde(default)]
    pub settings: SettingsOverrides,
}

pub struct PlayerController {
    player_service: Arc<PlayerService>,
}

impl PlayerController {
    pub fn new(player_service: Arc<PlayerService>) -> Self {
        Self { player_service }
    }

    /// POST /api/player/start - Read text aloud
    pub async fn start(
        State(controller): State<Arc<PlayerController>>,
        Json(request): Json<StartRequest>,
    ) -> AppResult<(StatusCode, Json<StatusSnapshot>)> {
        let status = controller
            .player_service
            .start(request.text, request.settings)
            .await?;
        Ok((StatusCode::ACCEPTED, Json(status)))
    }

    /// POST /api/player/stop - Stop reading
    pub async fn stop(
        State(controller): State<Arc<PlayerController>>,
    ) -> AppResult<Json<StatusSnapshot>> {
        let status = controller.player_service.stop().await?;
        Ok(Json(status))
    }

    /// GET /api/player/status
    pub async fn status(
        State(controller): State<Arc<PlayerController>>,
    ) -> AppResult<Json<StatusSnapshot>> {
        let status = controller.player_service.status().await?;
        Ok(Json(status))
    }

    /// GET /api/player/heartbeat
    pub async fn heartbeat(State(controller): State<Arc<PlayerController>>) -> Json<Heartbeat> {
        Json(controller.player_service.heartbeat().await)
    }

    /// GET /api/player/events - Server-sent stream of player events
    pub async fn events(
        State(controller): State<Arc<PlayerController>>,
    ) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
        let receiver = controller.player_service.subscribe();

        let events = stream::unfold(receiver, |mut receiver| async move {
            loop {
                match receiver.recv().await {
                    Ok(event) => match Event::default().event(event.name()).json_data(&event) {
                        Ok(sse_event) => return Some((Ok::<_, Infallible>(sse_event), receiver)),
                        Err(e) => tracing::warn!(error = %e, "Failed to encode player event"),
                    },
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Event subscriber lagged behind");
                    }
                    Err(RecvError::Closed) => return None,
                }
            }
        });

        Sse::new(events).keep_alive(KeepAlive::default())
    }

    /// GET /api/server/check - Probe the speech synthesis service
    pub async fn check_server(
        State(controller): State<Arc<PlayerController>>,
        Query(overrides): Query<SettingsOverrides>,
    ) -> AppResult<Json<ServerCheck>> {
        let check = controller.player_service.check_server(overrides).await?;
        Ok(Json(check))
    }
}
