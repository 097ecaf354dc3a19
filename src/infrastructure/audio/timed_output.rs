use super::{AudioOutput, DecodedAudio, OutputError, OutputHandle};
use tokio::runtime::Handle;
use tokio::sync::oneshot;

/// Headless output that "plays" for the decoded duration
///
/// Used when no audio device is available and in tests, where the paused
/// tokio clock makes playback instantaneous and deterministic.
#[derive(Debug, Default, Clone, Copy)]
pub struct TimedOutput;

impl TimedOutput {
    pub fn new() -> Self {
        Self
    }
}

impl AudioOutput for TimedOutput {
    fn play(&self, audio: DecodedAudio) -> Result<OutputHandle, OutputError> {
        let runtime = Handle::try_current()
            .map_err(|e| OutputError::ResourceUnavailable(e.to_string()))?;

        let duration = audio.duration();
        let (finished_tx, finished_rx) = oneshot::channel();
        let playback = runtime.spawn(async move {
            tokio::time::sleep(duration).await;
            let _ = finished_tx.send(());
        });

        Ok(OutputHandle::new(finished_rx, move || playback.abort()))
    }
}
