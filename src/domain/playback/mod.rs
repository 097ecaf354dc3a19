pub mod cache;
pub mod chunker;
pub mod engine;
pub mod error;
pub mod events;
pub mod session;

pub use cache::{AudioCache, DEFAULT_CACHE_CAPACITY};
pub use chunker::split_into_chunks;
pub use engine::{EngineConfig, EngineDeps, EngineHandle};
pub use error::PlaybackError;
pub use events::{EnginePhase, Heartbeat, PlayerEvent, StatusSnapshot};
pub use session::{PlaybackSession, PlaybackSettings, SettingsOverrides};
