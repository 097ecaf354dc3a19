use crate::domain::playback::PlaybackSettings;
use async_trait::async_trait;
use bytes::Bytes;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SynthesisError {
    #[error("Network error: {0}")]
    Network(String),
    #[error("API request failed with status {status}")]
    Service { status: u16 },
    #[error("Received empty audio data from server")]
    EmptyResponse,
}

/// Repository for speech synthesis.
/// Abstracts the HTTP speech service behind one request per chunk.
///
/// Implementations must not retry or cache; both are playback concerns.
#[async_trait]
pub trait TtsRepository: Send + Sync {
    /// Synthesize one chunk of text into encoded audio (MP3)
    ///
    /// # Errors
    /// `Network` when the service cannot be reached, `Service` on a non-2xx
    /// status and `EmptyResponse` when a 2xx carries no audio.
    async fn synthesize(&self, text: &str, settings: &PlaybackSettings) -> Result<Bytes, SynthesisError>;

    /// Verify the service is reachable with the given settings
    async fn check_connection(&self, settings: &PlaybackSettings) -> Result<(), SynthesisError>;
}
