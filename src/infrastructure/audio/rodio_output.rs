use super::{AudioOutput, DecodedAudio, OutputError, OutputHandle};
use rodio::buffer::SamplesBuffer;
use rodio::{OutputStream, OutputStreamHandle, Sink};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use tokio::runtime::Handle;
use tokio::sync::oneshot;

/// Default audio device output
///
/// `OutputStream` is `!Send`, so it lives on a dedicated thread for as long
/// as this value exists.
pub struct RodioOutput {
    stream_handle: OutputStreamHandle,
    _keep_alive: Mutex<mpsc::Sender<()>>,
}

impl RodioOutput {
    pub fn open_default() -> Result<Self, OutputError> {
        let (handle_tx, handle_rx) = mpsc::channel();
        let (keep_alive_tx, keep_alive_rx) = mpsc::channel::<()>();

        std::thread::Builder::new()
            .name("readaloud-audio".into())
            .spawn(move || match OutputStream::try_default() {
                Ok((_stream, stream_handle)) => {
                    let _ = handle_tx.send(Ok(stream_handle));
                    // Blocks until the owning RodioOutput is dropped
                    let _ = keep_alive_rx.recv();
                }
                Err(e) => {
                    let _ = handle_tx.send(Err(e.to_string()));
                }
            })
            .map_err(|e| OutputError::ResourceUnavailable(e.to_string()))?;

        let stream_handle = handle_rx
            .recv()
            .map_err(|e| OutputError::ResourceUnavailable(e.to_string()))?
            .map_err(OutputError::ResourceUnavailable)?;

        tracing::info!("Opened default audio output device");

        Ok(Self {
            stream_handle,
            _keep_alive: Mutex::new(keep_alive_tx),
        })
    }
}

impl AudioOutput for RodioOutput {
    fn play(&self, audio: DecodedAudio) -> Result<OutputHandle, OutputError> {
        let runtime = Handle::try_current()
            .map_err(|e| OutputError::ResourceUnavailable(e.to_string()))?;

        let sink = Sink::try_new(&self.stream_handle)
            .map_err(|e| OutputError::ResourceUnavailable(e.to_string()))?;
        sink.append(SamplesBuffer::new(
            audio.channels,
            audio.sample_rate,
            audio.samples.to_vec(),
        ));
        let sink = Arc::new(sink);

        let stopped = Arc::new(AtomicBool::new(false));

        let (finished_tx, finished_rx) = oneshot::channel();
        let waiter = Arc::clone(&sink);
        let waiter_stopped = Arc::clone(&stopped);
        runtime.spawn_blocking(move || {
            waiter.sleep_until_end();
            if !waiter_stopped.load(Ordering::SeqCst) {
                let _ = finished_tx.send(());
            }
        });

        Ok(OutputHandle::new(finished_rx, move || {
            stopped.store(true, Ordering::SeqCst);
            sink.stop();
        }))
    }
}
