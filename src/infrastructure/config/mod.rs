use serde::Deserialize;
use std::env;
use std::time::Duration;

use crate::domain::playback::{EngineConfig, PlaybackSettings};

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_format: LogFormat,
    // Speech synthesis
    pub tts_api_url: String,
    pub tts_api_key: String,
    pub tts_voice: String,
    pub tts_chunk_size: usize,
    pub tts_cache_size: usize,
    pub tts_clear_cache_on_stop: bool,
    pub tts_retry_delay_ms: u64,
    pub tts_request_timeout_secs: u64,
    // Engine supervision
    pub keep_alive_secs: u64,
    pub heartbeat_timeout_secs: u64,
    pub watchdog_interval_secs: u64,
    pub audio_output: AudioOutputKind,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum AudioOutputKind {
    /// Default audio device
    Device,
    /// Headless, completes after the decoded duration
    Timed,
}

impl Config {
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup; unset keys take their defaults
    pub fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let config = Config {
            host: var("HOST", "0.0.0.0"),
            port: var("PORT", "8080").parse()?,
            log_format: match var("LOG_FORMAT", "pretty").to_lowercase().as_str() {
                "json" => LogFormat::Json,
                _ => LogFormat::Pretty,
            },
            tts_api_url: var("TTS_API_URL", "http://localhost:8880"),
            tts_api_key: var("TTS_API_KEY", "not-needed"),
            tts_voice: var("TTS_VOICE", "af_bella"),
            tts_chunk_size: var("TTS_CHUNK_SIZE", "1000").parse()?,
            tts_cache_size: var("TTS_CACHE_SIZE", "10").parse()?,
            tts_clear_cache_on_stop: var("TTS_CLEAR_CACHE_ON_STOP", "false").to_lowercase() == "true",
            tts_retry_delay_ms: var("TTS_RETRY_DELAY_MS", "1000").parse()?,
            tts_request_timeout_secs: var("TTS_REQUEST_TIMEOUT_SECS", "60").parse()?,
            keep_alive_secs: var("KEEP_ALIVE_SECS", "5").parse()?,
            heartbeat_timeout_secs: var("HEARTBEAT_TIMEOUT_SECS", "5").parse()?,
            watchdog_interval_secs: var("WATCHDOG_INTERVAL_SECS", "15").parse()?,
            audio_output: match var("AUDIO_OUTPUT", "device").to_lowercase().as_str() {
                "timed" => AudioOutputKind::Timed,
                _ => AudioOutputKind::Device,
            },
        };

        config.playback_defaults().validate()?;
        if config.keep_alive_secs == 0 || config.watchdog_interval_secs == 0 {
            return Err("KEEP_ALIVE_SECS and WATCHDOG_INTERVAL_SECS must be greater than zero".into());
        }

        Ok(config)
    }

    /// Settings every session starts from before request overrides
    pub fn playback_defaults(&self) -> PlaybackSettings {
        PlaybackSettings {
            endpoint: self.tts_api_url.clone(),
            credential: self.tts_api_key.clone(),
            voice_id: self.tts_voice.clone(),
            chunk_size_chars: self.tts_chunk_size,
            cache_capacity: self.tts_cache_size,
        }
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            retry_delay: Duration::from_millis(self.tts_retry_delay_ms),
            keep_alive_interval: Duration::from_secs(self.keep_alive_secs),
            clear_cache_on_stop: self.tts_clear_cache_on_stop,
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.tts_request_timeout_secs)
    }

    pub fn heartbeat_timeout(&self) -> Duration {
        Duration::from_secs(self.heartbeat_timeout_secs)
    }

    pub fn watchdog_interval(&self) -> Duration {
        Duration::from_secs(self.watchdog_interval_secs)
    }
}
