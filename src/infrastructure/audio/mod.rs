//! Audio decode and output seams
//!
//! Decoding turns the encoded bytes returned by the speech service into
//! interleaved PCM. Output plays PCM and reports natural completion through
//! an [`OutputHandle`]; stopping a handle never reports completion.

pub mod symphonia_decoder;
pub mod timed_output;

#[cfg(feature = "rodio")]
pub mod rodio_output;

use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;

pub use symphonia_decoder::SymphoniaDecoder;
pub use timed_output::TimedOutput;

#[cfg(feature = "rodio")]
pub use rodio_output::RodioOutput;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("unsupported audio format: {0}")]
    Unsupported(String),
    #[error("malformed audio: {0}")]
    Malformed(String),
    #[error("no audio track found")]
    NoAudioTrack,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OutputError {
    #[error("audio output unavailable: {0}")]
    ResourceUnavailable(String),
}

/// Interleaved PCM ready for output
#[derive(Debug, Clone)]
pub struct DecodedAudio {
    pub channels: u16,
    pub sample_rate: u32,
    pub samples: Arc<[f32]>,
}

impl DecodedAudio {
    pub fn new(channels: u16, sample_rate: u32, samples: Vec<f32>) -> Self {
        Self {
            channels: channels.max(1),
            sample_rate,
            samples: samples.into(),
        }
    }

    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels as usize
    }

    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.frames() as f64 / self.sample_rate as f64)
    }
}

#[async_trait]
pub trait AudioDecoder: Send + Sync {
    async fn decode(&self, encoded: Bytes) -> Result<DecodedAudio, DecodeError>;
}

pub trait AudioOutput: Send + Sync {
    /// Start playing `audio` and return immediately
    fn play(&self, audio: DecodedAudio) -> Result<OutputHandle, OutputError>;
}

/// Live playback of one decoded buffer
///
/// `finished` resolves with `Ok(())` only when the audio played to its end.
pub struct OutputHandle {
    finished: oneshot::Receiver<()>,
    stopper: OutputStopper,
}

impl OutputHandle {
    pub fn new(finished: oneshot::Receiver<()>, stop: impl FnOnce() + Send + 'static) -> Self {
        Self {
            finished,
            stopper: OutputStopper(Box::new(stop)),
        }
    }

    pub fn into_parts(self) -> (OutputStopper, oneshot::Receiver<()>) {
        (self.stopper, self.finished)
    }
}

pub struct OutputStopper(Box<dyn FnOnce() + Send>);

impl OutputStopper {
    /// Halt output immediately
    pub fn stop(self) {
        (self.0)()
    }
}

impl std::fmt::Debug for OutputStopper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("OutputStopper")
    }
}
