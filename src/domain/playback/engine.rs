//! Playback Engine
//!
//! A single task owns the session, the audio cache and the live output. It
//! reacts to three inputs: commands from the player service, completions
//! from the fetch/decode/output tasks it spawned, and a keep-alive tick.
//! Handlers never await, so a `stop` is applied as soon as it is received.
//!
//! Every spawned task carries the generation it was started under. `start`
//! and `stop` bump the generation, which turns any late completion into a
//! no-op. Output completions additionally carry the id of the output they
//! belong to, so only the live output can advance playback.

use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use uuid::Uuid;

use super::cache::AudioCache;
use super::chunker::{count_words, split_into_chunks};
use super::error::PlaybackError;
use super::events::{EnginePhase, Heartbeat, PlayerEvent, StatusSnapshot};
use super::session::{PlaybackSession, PlaybackSettings};
use crate::infrastructure::audio::{
    AudioDecoder, AudioOutput, DecodeError, DecodedAudio, OutputStopper,
};
use crate::infrastructure::repositories::{SynthesisError, TtsRepository};

/// Chunks ahead of the playing one that may be preloaded
const PRELOAD_WINDOW: usize = 2;
const LARGE_TEXT_WORDS: usize = 2000;
const COMMAND_BUFFER: usize = 32;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Pause before moving past a chunk that failed
    pub retry_delay: Duration,
    pub keep_alive_interval: Duration,
    pub clear_cache_on_stop: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            retry_delay: Duration::from_secs(1),
            keep_alive_interval: Duration::from_secs(5),
            clear_cache_on_stop: false,
        }
    }
}

/// Collaborators the engine drives
#[derive(Clone)]
pub struct EngineDeps {
    pub tts: Arc<dyn TtsRepository>,
    pub decoder: Arc<dyn AudioDecoder>,
    pub output: Arc<dyn AudioOutput>,
}

enum Command {
    Start {
        text: String,
        settings: PlaybackSettings,
        reply: oneshot::Sender<Result<StatusSnapshot, PlaybackError>>,
    },
    Stop {
        reply: oneshot::Sender<StatusSnapshot>,
    },
    Status {
        reply: oneshot::Sender<StatusSnapshot>,
    },
    Heartbeat {
        reply: oneshot::Sender<Heartbeat>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FetchPurpose {
    Play,
    Preload,
}

enum Completion {
    Fetched {
        generation: u64,
        index: usize,
        purpose: FetchPurpose,
        result: Result<Bytes, SynthesisError>,
    },
    Decoded {
        generation: u64,
        index: usize,
        result: Result<DecodedAudio, DecodeError>,
    },
    OutputEnded {
        generation: u64,
        index: usize,
        output_id: u64,
    },
    BackoffElapsed {
        generation: u64,
        failed_index: usize,
    },
}

/// Handle to a running engine task
pub struct EngineHandle {
    commands: mpsc::Sender<Command>,
    task: JoinHandle<()>,
}

impl EngineHandle {
    pub fn spawn(
        deps: EngineDeps,
        config: EngineConfig,
        events: broadcast::Sender<PlayerEvent>,
    ) -> Self {
        let (commands_tx, commands_rx) = mpsc::channel(COMMAND_BUFFER);
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();

        let engine = PlaybackEngine::new(deps, config, events, completions_tx);
        let task = tokio::spawn(engine.run(commands_rx, completions_rx));

        Self {
            commands: commands_tx,
            task,
        }
    }

    pub async fn start(
        &self,
        text: String,
        settings: PlaybackSettings,
    ) -> Result<StatusSnapshot, PlaybackError> {
        self.request(|reply| Command::Start {
            text,
            settings,
            reply,
        })
        .await?
    }

    pub async fn stop(&self) -> Result<StatusSnapshot, PlaybackError> {
        self.request(|reply| Command::Stop { reply }).await
    }

    pub async fn status(&self) -> Result<StatusSnapshot, PlaybackError> {
        self.request(|reply| Command::Status { reply }).await
    }

    pub async fn heartbeat(&self) -> Result<Heartbeat, PlaybackError> {
        self.request(|reply| Command::Heartbeat { reply }).await
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    pub fn abort(&self) {
        self.task.abort();
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, PlaybackError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.commands
            .send(command(reply_tx))
            .await
            .map_err(|_| PlaybackError::EngineUnavailable)?;
        reply_rx.await.map_err(|_| PlaybackError::EngineUnavailable)
    }
}

struct ActiveOutput {
    id: u64,
    stopper: OutputStopper,
}

struct PlaybackEngine {
    deps: EngineDeps,
    config: EngineConfig,
    events: broadcast::Sender<PlayerEvent>,
    completions: mpsc::UnboundedSender<Completion>,

    session: Option<PlaybackSession>,
    phase: EnginePhase,
    generation: u64,

    cache: AudioCache,
    /// Chunks and settings the cached audio was synthesized from
    cache_origin: Option<(Arc<[String]>, Arc<PlaybackSettings>)>,
    preloading: Option<usize>,

    active_output: Option<ActiveOutput>,
    next_output_id: u64,

    is_processing: bool,
    processing_message: Option<String>,
    last_error: Option<String>,
}

impl PlaybackEngine {
    fn new(
        deps: EngineDeps,
        config: EngineConfig,
        events: broadcast::Sender<PlayerEvent>,
        completions: mpsc::UnboundedSender<Completion>,
    ) -> Self {
        Self {
            deps,
            config,
            events,
            completions,
            session: None,
            phase: EnginePhase::Idle,
            generation: 0,
            cache: AudioCache::default(),
            cache_origin: None,
            preloading: None,
            active_output: None,
            next_output_id: 0,
            is_processing: false,
            processing_message: None,
            last_error: None,
        }
    }

    async fn run(
        mut self,
        mut commands: mpsc::Receiver<Command>,
        mut completions: mpsc::UnboundedReceiver<Completion>,
    ) {
        let period = self.config.keep_alive_interval;
        let mut keep_alive = tokio::time::interval_at(Instant::now() + period, period);
        keep_alive.set_missed_tick_behavior(MissedTickBehavior::Skip);

        tracing::debug!("Playback engine started");

        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => self.handle_command(command),
                    None => break,
                },
                Some(completion) = completions.recv() => self.handle_completion(completion),
                _ = keep_alive.tick() => self.emit_keep_alive(),
            }
        }

        self.halt_output();
        tracing::debug!("Playback engine shut down");
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Start {
                text,
                settings,
                reply,
            } => {
                let result = self.start(&text, settings).map(|_| self.snapshot());
                let _ = reply.send(result);
            }
            Command::Stop { reply } => {
                self.stop();
                let _ = reply.send(self.snapshot());
            }
            Command::Status { reply } => {
                let _ = reply.send(self.snapshot());
            }
            Command::Heartbeat { reply } => {
                let _ = reply.send(self.heartbeat());
            }
        }
    }

    fn handle_completion(&mut self, completion: Completion) {
        match completion {
            Completion::Fetched {
                generation,
                index,
                purpose,
                result,
            } => self.on_fetched(generation, index, purpose, result),
            Completion::Decoded {
                generation,
                index,
                result,
            } => self.on_decoded(generation, index, result),
            Completion::OutputEnded {
                generation,
                index,
                output_id,
            } => self.on_output_ended(generation, index, output_id),
            Completion::BackoffElapsed {
                generation,
                failed_index,
            } => self.on_backoff_elapsed(generation, failed_index),
        }
    }

    // === Commands ===

    fn start(&mut self, text: &str, settings: PlaybackSettings) -> Result<(), PlaybackError> {
        self.teardown();
        self.session = None;
        self.last_error = None;

        self.report_processing("Splitting text into manageable chunks...");
        let chunks = split_into_chunks(text, settings.chunk_size_chars);

        if chunks.is_empty() {
            self.report_error(PlaybackError::EmptyInput.to_string());
            self.transition(EnginePhase::Idle);
            return Err(PlaybackError::EmptyInput);
        }

        if count_words(text) > LARGE_TEXT_WORDS {
            self.report_processing("Processing large text (performance may be affected)...");
        }
        self.report_processing(format!(
            "Preparing to process {} audio chunks...",
            chunks.len()
        ));

        let session = PlaybackSession::new(chunks, settings);
        self.prepare_cache(&session);

        tracing::info!(
            session_id = %session.id,
            total_chunks = session.total_chunks(),
            voice = %session.settings.voice_id,
            cached_chunks = self.cache.len(),
            "Playback session started"
        );

        self.session = Some(session);
        self.begin_chunk(0);
        Ok(())
    }

    fn stop(&mut self) {
        self.teardown();
        if let Some(session) = self.session.take() {
            tracing::info!(
                session_id = %session.id,
                current_index = session.current_index,
                "Playback stopped"
            );
        }
        self.clear_processing();

        if self.config.clear_cache_on_stop {
            if !self.cache.is_empty() {
                tracing::debug!(cleared_chunks = self.cache.len(), "Clearing audio cache on stop");
                self.cache.clear();
            }
            self.cache_origin = None;
        }

        self.transition(EnginePhase::Stopped);
    }

    // === State machine ===

    fn begin_chunk(&mut self, index: usize) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        session.current_index = index;
        let total = session.total_chunks();

        self.transition(EnginePhase::Fetching { index });

        if let Some(audio) = self.cache.get(index) {
            tracing::debug!(chunk_index = index, "Chunk audio served from cache");
            self.begin_decode(index, audio);
            return;
        }

        self.report_processing(format!(
            "Generating audio for chunk {} of {}...",
            index + 1,
            total
        ));

        if self.preloading == Some(index) {
            tracing::debug!(chunk_index = index, "Waiting for in-flight preload");
            return;
        }

        self.spawn_fetch(index, FetchPurpose::Play);
    }

    fn on_fetched(
        &mut self,
        generation: u64,
        index: usize,
        purpose: FetchPurpose,
        result: Result<Bytes, SynthesisError>,
    ) {
        if generation != self.generation {
            tracing::debug!(chunk_index = index, ?purpose, "Discarding stale fetch result");
            return;
        }
        if purpose == FetchPurpose::Preload {
            self.preloading = None;
        }

        let awaited = self.phase == EnginePhase::Fetching { index };

        match result {
            Ok(audio) => {
                self.cache.put(index, audio.clone());
                if awaited {
                    self.begin_decode(index, audio);
                } else {
                    tracing::debug!(chunk_index = index, "Chunk preloaded");
                    self.schedule_preload();
                }
            }
            Err(e) if awaited => {
                self.skip_chunk(index, format!("Error fetching audio: {e}"));
            }
            Err(e) => {
                tracing::warn!(chunk_index = index, error = %e, "Preload failed");
            }
        }
    }

    fn begin_decode(&mut self, index: usize, audio: Bytes) {
        self.transition(EnginePhase::Decoding { index });
        self.report_processing(format!("Processing audio for chunk {}...", index + 1));

        let decoder = Arc::clone(&self.deps.decoder);
        let completions = self.completions.clone();
        let generation = self.generation;

        tokio::spawn(async move {
            let result = decoder.decode(audio).await;
            let _ = completions.send(Completion::Decoded {
                generation,
                index,
                result,
            });
        });
    }

    fn on_decoded(
        &mut self,
        generation: u64,
        index: usize,
        result: Result<DecodedAudio, DecodeError>,
    ) {
        if generation != self.generation || self.phase != (EnginePhase::Decoding { index }) {
            return;
        }

        match result {
            Ok(audio) => self.begin_output(index, audio),
            Err(e) => self.skip_chunk(index, format!("Error decoding audio: {e}")),
        }
    }

    fn begin_output(&mut self, index: usize, audio: DecodedAudio) {
        self.halt_output();

        let handle = match self.deps.output.play(audio) {
            Ok(handle) => handle,
            Err(e) => {
                self.report_error(format!("Error playing audio: {e}"));
                self.end_session();
                return;
            }
        };

        let (stopper, finished) = handle.into_parts();
        self.next_output_id += 1;
        let output_id = self.next_output_id;
        self.active_output = Some(ActiveOutput {
            id: output_id,
            stopper,
        });

        let completions = self.completions.clone();
        let generation = self.generation;
        tokio::spawn(async move {
            // Err means the output was stopped
            if finished.await.is_ok() {
                let _ = completions.send(Completion::OutputEnded {
                    generation,
                    index,
                    output_id,
                });
            }
        });

        self.clear_processing();
        self.transition(EnginePhase::Playing { index });

        let total_chunks = self.total_chunks();
        self.emit(PlayerEvent::ChunkStarted {
            index,
            total_chunks,
        });
        tracing::info!(
            session_id = ?self.session_id(),
            chunk_index = index,
            total_chunks,
            "Playing chunk"
        );

        self.schedule_preload();
    }

    fn on_output_ended(&mut self, generation: u64, index: usize, output_id: u64) {
        if generation != self.generation || self.phase != (EnginePhase::Playing { index }) {
            return;
        }
        if self.active_output.as_ref().map(|active| active.id) != Some(output_id) {
            return;
        }
        self.active_output = None;

        let Some(session) = &self.session else {
            return;
        };

        if session.is_last(index) {
            tracing::info!(session_id = %session.id, "Playback finished");
            self.end_session();
            return;
        }

        let total = session.total_chunks();
        self.report_processing(format!(
            "Preparing next audio chunk ({} of {})...",
            index + 2,
            total
        ));
        self.begin_chunk(index + 1);
    }

    /// Report a per-chunk failure and move past it after the back-off
    fn skip_chunk(&mut self, index: usize, message: String) {
        self.report_error(message);

        let Some(session) = &self.session else {
            return;
        };
        if session.is_last(index) {
            self.end_session();
            return;
        }

        let completions = self.completions.clone();
        let generation = self.generation;
        let delay = self.config.retry_delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = completions.send(Completion::BackoffElapsed {
                generation,
                failed_index: index,
            });
        });
    }

    fn on_backoff_elapsed(&mut self, generation: u64, failed_index: usize) {
        if generation != self.generation {
            return;
        }
        let still_current = self
            .session
            .as_ref()
            .is_some_and(|session| session.current_index == failed_index);
        if still_current {
            self.begin_chunk(failed_index + 1);
        }
    }

    /// Start fetching the nearest uncached chunk ahead of the playing one
    fn schedule_preload(&mut self) {
        if self.preloading.is_some() {
            return;
        }
        let EnginePhase::Playing { index } = self.phase else {
            return;
        };

        // The playing chunk holds one slot; a look-ahead that needs more
        // would evict a preloaded chunk before it plays
        let total = self.total_chunks();
        let window = PRELOAD_WINDOW.min(self.cache.capacity().saturating_sub(1));
        let candidate = (index + 1..=index + window)
            .take_while(|&i| i < total)
            .find(|&i| !self.cache.has(i));

        if let Some(next) = candidate {
            self.preloading = Some(next);
            self.spawn_fetch(next, FetchPurpose::Preload);
        }
    }

    fn spawn_fetch(&self, index: usize, purpose: FetchPurpose) {
        let Some(session) = &self.session else {
            return;
        };
        let Some(text) = session.chunk(index).map(str::to_owned) else {
            return;
        };

        let settings = Arc::clone(&session.settings);
        let tts = Arc::clone(&self.deps.tts);
        let completions = self.completions.clone();
        let generation = self.generation;

        tracing::debug!(chunk_index = index, ?purpose, "Requesting chunk audio");

        tokio::spawn(async move {
            let result = tts.synthesize(&text, &settings).await;
            let _ = completions.send(Completion::Fetched {
                generation,
                index,
                purpose,
                result,
            });
        });
    }

    // === Session bookkeeping ===

    /// Invalidate everything in flight and silence the output
    fn teardown(&mut self) {
        self.generation += 1;
        self.preloading = None;
        self.halt_output();
    }

    fn end_session(&mut self) {
        self.teardown();
        self.session = None;
        self.clear_processing();
        self.transition(EnginePhase::Stopped);
    }

    fn halt_output(&mut self) {
        if let Some(active) = self.active_output.take() {
            active.stopper.stop();
        }
    }

    /// Keep audio still valid for the new session and resize to its capacity
    fn prepare_cache(&mut self, session: &PlaybackSession) {
        match &self.cache_origin {
            Some((previous_chunks, previous_settings))
                if previous_settings.same_voice_as(&session.settings) =>
            {
                let previous = Arc::clone(previous_chunks);
                let current = Arc::clone(&session.chunks);
                self.cache
                    .retain(|i| previous.get(i).is_some() && previous.get(i) == current.get(i));
            }
            _ => self.cache.clear(),
        }

        self.cache.set_capacity(session.settings.cache_capacity);
        self.cache_origin = Some((Arc::clone(&session.chunks), Arc::clone(&session.settings)));
    }

    fn transition(&mut self, phase: EnginePhase) {
        self.phase = phase;
        self.emit_status();
    }

    fn report_processing(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::debug!(message = %message, "Processing update");
        self.is_processing = true;
        self.processing_message = Some(message.clone());
        self.emit(PlayerEvent::ProcessingUpdate { message });
    }

    fn report_error(&mut self, message: String) {
        tracing::warn!(session_id = ?self.session_id(), error = %message, "Playback error");
        self.clear_processing();
        self.last_error = Some(message.clone());
        self.emit(PlayerEvent::Error { message });
    }

    fn clear_processing(&mut self) {
        self.is_processing = false;
        self.processing_message = None;
    }

    // === Reporting ===

    fn emit(&self, event: PlayerEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    fn emit_status(&self) {
        let (is_playing, current_index, total_chunks) = self.position();
        self.emit(PlayerEvent::StatusUpdate {
            is_playing,
            current_index,
            total_chunks,
        });
    }

    fn emit_keep_alive(&self) {
        let (is_playing, current_index, total_chunks) = self.position();
        if is_playing {
            self.emit(PlayerEvent::KeepAlive {
                is_playing,
                current_index,
                total_chunks,
            });
        }
    }

    fn position(&self) -> (bool, usize, usize) {
        match &self.session {
            Some(session) => (
                session.is_playing,
                session.current_index,
                session.total_chunks(),
            ),
            None => (false, 0, 0),
        }
    }

    fn total_chunks(&self) -> usize {
        self.session.as_ref().map_or(0, PlaybackSession::total_chunks)
    }

    fn session_id(&self) -> Option<Uuid> {
        self.session.as_ref().map(|s| s.id)
    }

    fn snapshot(&self) -> StatusSnapshot {
        let (is_playing, current_index, total_chunks) = self.position();
        StatusSnapshot {
            is_playing,
            current_index,
            total_chunks,
            phase: self.phase,
            is_processing: self.is_processing,
            processing_message: self.processing_message.clone(),
            last_error: self.last_error.clone(),
            session_id: self.session_id(),
        }
    }

    fn heartbeat(&self) -> Heartbeat {
        let (is_playing, current_index, total_chunks) = self.position();
        Heartbeat {
            alive: true,
            is_playing,
            current_index,
            total_chunks,
        }
    }
}
