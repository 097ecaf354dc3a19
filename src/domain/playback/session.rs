use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use super::cache::DEFAULT_CACHE_CAPACITY;
use super::error::PlaybackError;

pub const DEFAULT_ENDPOINT: &str = "http://localhost:8880";
pub const DEFAULT_CREDENTIAL: &str = "not-needed";
pub const DEFAULT_VOICE: &str = "af_bella";
pub const DEFAULT_CHUNK_SIZE_CHARS: usize = 1000;

/// Fully resolved settings for one playback session
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackSettings {
    pub endpoint: String,
    #[serde(skip_serializing)]
    pub credential: String,
    pub voice_id: String,
    pub chunk_size_chars: usize,
    pub cache_capacity: usize,
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            credential: DEFAULT_CREDENTIAL.to_string(),
            voice_id: DEFAULT_VOICE.to_string(),
            chunk_size_chars: DEFAULT_CHUNK_SIZE_CHARS,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
        }
    }
}

/// Per-request settings; anything left out falls back to the configured defaults
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsOverrides {
    pub endpoint: Option<String>,
    pub credential: Option<String>,
    pub voice_id: Option<String>,
    pub chunk_size_chars: Option<usize>,
    pub cache_capacity: Option<usize>,
}

impl PlaybackSettings {
    /// Merge overrides over these settings and validate the result
    pub fn with_overrides(&self, overrides: SettingsOverrides) -> Result<Self, PlaybackError> {
        let settings = Self {
            endpoint: overrides.endpoint.unwrap_or_else(|| self.endpoint.clone()),
            credential: overrides.credential.unwrap_or_else(|| self.credential.clone()),
            voice_id: overrides.voice_id.unwrap_or_else(|| self.voice_id.clone()),
            chunk_size_chars: overrides.chunk_size_chars.unwrap_or(self.chunk_size_chars),
            cache_capacity: overrides.cache_capacity.unwrap_or(self.cache_capacity),
        };
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), PlaybackError> {
        if self.chunk_size_chars == 0 {
            return Err(PlaybackError::InvalidSettings(
                "chunkSizeChars must be greater than zero".to_string(),
            ));
        }
        if self.endpoint.trim().is_empty() {
            return Err(PlaybackError::InvalidSettings(
                "endpoint cannot be empty".to_string(),
            ));
        }
        if self.voice_id.trim().is_empty() {
            return Err(PlaybackError::InvalidSettings(
                "voiceId cannot be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Whether audio synthesized under `other` sounds the same as under these settings
    pub fn same_voice_as(&self, other: &PlaybackSettings) -> bool {
        self.endpoint == other.endpoint && self.voice_id == other.voice_id
    }
}

/// One start-to-stop playback of a text
#[derive(Debug, Clone)]
pub struct PlaybackSession {
    pub id: Uuid,
    pub chunks: Arc<[String]>,
    pub current_index: usize,
    pub is_playing: bool,
    pub settings: Arc<PlaybackSettings>,
}

impl PlaybackSession {
    pub fn new(chunks: Vec<String>, settings: PlaybackSettings) -> Self {
        Self {
            id: Uuid::new_v4(),
            chunks: chunks.into(),
            current_index: 0,
            is_playing: true,
            settings: Arc::new(settings),
        }
    }

    pub fn total_chunks(&self) -> usize {
        self.chunks.len()
    }

    pub fn chunk(&self, index: usize) -> Option<&str> {
        self.chunks.get(index).map(String::as_str)
    }

    pub fn is_last(&self, index: usize) -> bool {
        index + 1 >= self.chunks.len()
    }
}
