use core_playback::PlaybackError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Service initialization failed: {0}")]
    InitializationFailed(String),

    #[error("Service task failed: {0}")]
    TaskFailed(String),

    #[error("Runtime error: {0}")]
    Runtime(#[from] core_runtime::Error),

    #[error("Playback error: {0}")]
    Playback(#[from] PlaybackError),
}

impl ServiceError {
    /// The playback error behind this failure, if any.
    pub fn playback(&self) -> Option<&PlaybackError> {
        match self {
            ServiceError::Playback(err) => Some(err),
            _ => None,
        }
    }

    /// Whether the service was already shut down.
    pub fn is_stopped(&self) -> bool {
        matches!(self, ServiceError::Playback(PlaybackError::ServiceStopped))
    }
}

pub type Result<T> = std::result::Result<T, ServiceError>;
