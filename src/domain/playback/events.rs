use serde::Serialize;
use uuid::Uuid;

/// Outbound notifications pushed to every subscriber
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum PlayerEvent {
    StatusUpdate {
        is_playing: bool,
        current_index: usize,
        total_chunks: usize,
    },
    ProcessingUpdate {
        message: String,
    },
    Error {
        message: String,
    },
    ChunkStarted {
        index: usize,
        total_chunks: usize,
    },
    KeepAlive {
        is_playing: bool,
        current_index: usize,
        total_chunks: usize,
    },
}

impl PlayerEvent {
    /// Name used for the SSE `event:` field
    pub fn name(&self) -> &'static str {
        match self {
            Self::StatusUpdate { .. } => "statusUpdate",
            Self::ProcessingUpdate { .. } => "processingUpdate",
            Self::Error { .. } => "error",
            Self::ChunkStarted { .. } => "chunkStarted",
            Self::KeepAlive { .. } => "keepAlive",
        }
    }
}

/// Engine state machine position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum EnginePhase {
    Idle,
    Fetching { index: usize },
    Decoding { index: usize },
    Playing { index: usize },
    Stopped,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSnapshot {
    pub is_playing: bool,
    pub current_index: usize,
    pub total_chunks: usize,
    pub phase: EnginePhase,
    pub is_processing: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processing_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<Uuid>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Heartbeat {
    pub alive: bool,
    pub is_playing: bool,
    pub current_index: usize,
    pub total_chunks: usize,
}

impl Heartbeat {
    /// Reported when the engine did not answer in time
    pub fn unresponsive() -> Self {
        Self {
            alive: false,
            is_playing: false,
            current_index: 0,
            total_chunks: 0,
        }
    }
}
