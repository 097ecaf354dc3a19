use crate::domain::playback::{
    EngineConfig, EngineDeps, EngineHandle, Heartbeat, PlaybackError, PlaybackSettings,
    PlayerEvent, SettingsOverrides, StatusSnapshot,
};
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;

const EVENT_BUFFER: usize = 256;

/// Result of probing the speech service
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServerCheck {
    pub connected: bool,
    pub message: String,
}

pub struct PlayerService {
    engine: Mutex<EngineHandle>,
    deps: EngineDeps,
    engine_config: EngineConfig,
    events: broadcast::Sender<PlayerEvent>,
    defaults: PlaybackSettings,
    heartbeat_timeout: Duration,
}

impl PlayerService {
    pub fn new(
        deps: EngineDeps,
        engine_config: EngineConfig,
        defaults: PlaybackSettings,
        heartbeat_timeout: Duration,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        let engine = EngineHandle::spawn(deps.clone(), engine_config.clone(), events.clone());

        Self {
            engine: Mutex::new(engine),
            deps,
            engine_config,
            events,
            defaults,
            heartbeat_timeout,
        }
    }

    /// Probe the engine and replace it if it is dead or wedged.
    ///
    /// Returns true when a new engine had to be spawned.
    pub async fn ensure_alive(&self) -> bool {
        let mut engine = self.engine.lock().await;

        let responsive = !engine.is_finished()
            && matches!(
                tokio::time::timeout(self.heartbeat_timeout, engine.heartbeat()).await,
                Ok(Ok(_))
            );
        if responsive {
            return false;
        }

        tracing::error!("Playback engine unresponsive, recreating it");
        engine.abort();
        *engine = EngineHandle::spawn(
            self.deps.clone(),
            self.engine_config.clone(),
            self.events.clone(),
        );

        let _ = self.events.send(PlayerEvent::Error {
            message: "Player stopped responding and was restarted".to_string(),
        });
        let _ = self.events.send(PlayerEvent::StatusUpdate {
            is_playing: false,
            current_index: 0,
            total_chunks: 0,
        });

        true
    }

    /// Periodically run [`ensure_alive`](Self::ensure_alive)
    pub fn spawn_watchdog(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let service = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            // First tick completes immediately
            ticker.tick().await;

            loop {
                ticker.tick().await;
                if service.ensure_alive().await {
                    tracing::warn!("Watchdog recreated the playback engine");
                }
            }
        })
    }
}

#[async_trait]
pub trait PlayerServiceApi: Send + Sync {
    /// Start reading `text` aloud, replacing any session in progress
    ///
    /// Settings overrides are merged over the configured defaults and
    /// validated before the current session is touched.
    async fn start(
        &self,
        text: String,
        overrides: SettingsOverrides,
    ) -> Result<StatusSnapshot, PlaybackError>;

    async fn stop(&self) -> Result<StatusSnapshot, PlaybackError>;

    async fn status(&self) -> Result<StatusSnapshot, PlaybackError>;

    /// Never fails; an engine that does not answer in time reports `alive: false`
    async fn heartbeat(&self) -> Heartbeat;

    async fn check_server(&self, overrides: SettingsOverrides) -> Result<ServerCheck, PlaybackError>;

    fn subscribe(&self) -> broadcast::Receiver<PlayerEvent>;
}

#[async_trait]
impl PlayerServiceApi for PlayerService {
    async fn start(
        &self,
        text: String,
        overrides: SettingsOverrides,
    ) -> Result<StatusSnapshot, PlaybackError> {
        let settings = self.defaults.with_overrides(overrides)?;

        tracing::info!(
            text_length = text.len(),
            voice = %settings.voice_id,
            chunk_size = settings.chunk_size_chars,
            "Start playback request"
        );

        let engine = self.engine.lock().await;
        if engine.status().await?.is_playing {
            tracing::info!("Stopping current session before starting a new one");
            engine.stop().await?;
        }
        engine.start(text, settings).await
    }

    async fn stop(&self) -> Result<StatusSnapshot, PlaybackError> {
        self.engine.lock().await.stop().await
    }

    async fn status(&self) -> Result<StatusSnapshot, PlaybackError> {
        self.engine.lock().await.status().await
    }

    async fn heartbeat(&self) -> Heartbeat {
        let engine = self.engine.lock().await;
        match tokio::time::timeout(self.heartbeat_timeout, engine.heartbeat()).await {
            Ok(Ok(heartbeat)) => heartbeat,
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "Heartbeat failed");
                Heartbeat::unresponsive()
            }
            Err(_) => {
                tracing::warn!(timeout_ms = self.heartbeat_timeout.as_millis(), "Heartbeat timed out");
                Heartbeat::unresponsive()
            }
        }
    }

    async fn check_server(&self, overrides: SettingsOverrides) -> Result<ServerCheck, PlaybackError> {
        let settings = self.defaults.with_overrides(overrides)?;

        let check = match self.deps.tts.check_connection(&settings).await {
            Ok(()) => ServerCheck {
                connected: true,
                message: format!("Connected to TTS server at {}", settings.endpoint),
            },
            Err(e) => {
                tracing::warn!(endpoint = %settings.endpoint, error = %e, "TTS server check failed");
                ServerCheck {
                    connected: false,
                    message: format!("Cannot connect to TTS server: {e}"),
                }
            }
        };

        Ok(check)
    }

    fn subscribe(&self) -> broadcast::Receiver<PlayerEvent> {
        self.events.subscribe()
    }
}
