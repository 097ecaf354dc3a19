use crate::error::AppError;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PlaybackError {
    #[error("No text to read")]
    EmptyInput,
    #[error("invalid settings: {0}")]
    InvalidSettings(String),
    #[error("playback engine is not responding")]
    EngineUnavailable,
}

impl From<PlaybackError> for AppError {
    fn from(err: PlaybackError) -> Self {
        let message = err.to_string();
        match err {
            PlaybackError::EmptyInput => AppError::BadRequest(message),
            PlaybackError::InvalidSettings(msg) => AppError::BadRequest(msg),
            PlaybackError::EngineUnavailable => AppError::ServiceUnavailable(message),
        }
    }
}
