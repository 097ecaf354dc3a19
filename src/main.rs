use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use readaloud::domain::playback::EngineDeps;
use readaloud::domain::player::PlayerService;
use readaloud::infrastructure::audio::{AudioOutput, SymphoniaDecoder, TimedOutput};
use readaloud::infrastructure::config::{AudioOutputKind, Config, LogFormat};
use readaloud::infrastructure::http::start_http_server;
use readaloud::infrastructure::repositories::HttpTtsRepository;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::from_env()?;

    // Initialize logging
    init_logging(&config);

    tracing::info!(
        "Starting readaloud on {}:{}",
        config.host,
        config.port
    );

    tracing::info!(
        endpoint = %config.tts_api_url,
        voice = %config.tts_voice,
        chunk_size = config.tts_chunk_size,
        cache_size = config.tts_cache_size,
        "Speech synthesis configuration loaded"
    );

    let config = Arc::new(config);

    // === DEPENDENCY INJECTION SETUP ===
    // 1. Instantiate repositories and audio adapters
    let tts_repo = Arc::new(HttpTtsRepository::new(config.request_timeout())?);
    let output = open_output(config.audio_output);

    let deps = EngineDeps {
        tts: tts_repo,
        decoder: Arc::new(SymphoniaDecoder::new()),
        output,
    };

    // 2. Instantiate services
    tracing::info!("Instantiating player service...");
    let player_service = Arc::new(PlayerService::new(
        deps,
        config.engine_config(),
        config.playback_defaults(),
        config.heartbeat_timeout(),
    ));
    player_service.spawn_watchdog(config.watchdog_interval());

    // Start HTTP server with all routes
    start_http_server(config, player_service).await?;

    Ok(())
}

fn open_output(kind: AudioOutputKind) -> Arc<dyn AudioOutput> {
    match kind {
        AudioOutputKind::Timed => {
            tracing::info!("Using timed headless audio output");
            Arc::new(TimedOutput::new())
        }
        AudioOutputKind::Device => open_device_output(),
    }
}

#[cfg(feature = "rodio")]
fn open_device_output() -> Arc<dyn AudioOutput> {
    match readaloud::infrastructure::audio::RodioOutput::open_default() {
        Ok(output) => Arc::new(output),
        Err(e) => {
            tracing::warn!(error = %e, "Audio device unavailable, falling back to timed output");
            Arc::new(TimedOutput::new())
        }
    }
}

#[cfg(not(feature = "rodio"))]
fn open_device_output() -> Arc<dyn AudioOutput> {
    tracing::warn!("Built without the `rodio` feature, falling back to timed output");
    Arc::new(TimedOutput::new())
}

fn init_logging(config: &Config) {
    if config.log_format == LogFormat::Json {
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "readaloud=debug,tower_http=debug".into()),
            )
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "readaloud=debug,tower_http=debug".into()),
            )
            .with(tracing_subscriber::fmt::layer().pretty())
            .init();
    }
}
