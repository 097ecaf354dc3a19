use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::controllers::{health, player::PlayerController};
use crate::domain::player::PlayerService;
use crate::infrastructure::config::Config;

/// Build the application router
pub fn build_router(player_service: Arc<PlayerService>) -> Router {
    let player_controller = Arc::new(PlayerController::new(player_service.clone()));

    let player_routes = Router::new()
        .route("/api/player/start", post(PlayerController::start))
        .route("/api/player/stop", post(PlayerController::stop))
        .route("/api/player/status", get(PlayerController::status))
        .route("/api/player/heartbeat", get(PlayerController::heartbeat))
        .route("/api/player/events", get(PlayerController::events))
        .route("/api/server/check", get(PlayerController::check_server))
        .with_state(player_controller);

    Router::new()
        .route("/health", get(health::health))
        .route("/health/ready", get(health::health_ready))
        .with_state(player_service)
        .merge(player_routes)
        // The status panel is served from another origin
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Start the HTTP server with all routes configured
pub async fn start_http_server(
    config: Arc<Config>,
    player_service: Arc<PlayerService>,
) -> Result<(), Box<dyn std::error::Error>> {
    let app = build_router(player_service);

    let listener =
        tokio::net::TcpListener::bind(format!("{}:{}", config.host, config.port)).await?;

    tracing::info!("Server listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;

    Ok(())
}
