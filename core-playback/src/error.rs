//! # Playback Error Types
//!
//! Errors returned synchronously by controller commands. Decoder failures
//! that happen asynchronously never show up here; they are emitted as
//! [`PlayerEvent::Error`](core_runtime::events::PlayerEvent::Error).

use crate::types::AudioId;
use bridge_traits::error::BridgeError;
use core_runtime::events::ErrorCode;
use thiserror::Error;

/// Errors that can occur during playback operations.
#[derive(Error, Debug)]
pub enum PlaybackError {
    // ========================================================================
    // Validation Errors
    // ========================================================================
    /// The endpoint is not in the future of the current position.
    #[error("Invalid endpoint: {endpoint_ms} ms is not after position {position_ms} ms")]
    InvalidEndpoint { endpoint_ms: u64, position_ms: u64 },

    /// Volume outside `[0.0, 1.0]` or not a number.
    #[error("Invalid volume: {0} (must be between 0.0 and 1.0)")]
    InvalidVolume(f64),

    /// Seek target is not a finite number.
    #[error("Invalid seek position: {0}")]
    InvalidSeekPosition(f64),

    /// Endpoint wire value below the play-to-end sentinel.
    #[error("Invalid endpoint value: {0} ms")]
    InvalidEndpointValue(i64),

    /// Controller configuration rejected by `validate()`.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ========================================================================
    // Lifecycle Errors
    // ========================================================================
    /// Command issued after `release()`.
    #[error("Controller already released: {0}")]
    AlreadyReleased(AudioId),

    /// A controller with this audio id is already loaded.
    #[error("Audio id already loaded: {0}")]
    DuplicateAudioId(AudioId),

    /// No controller is loaded for this audio id.
    #[error("Unknown audio id: {0}")]
    UnknownAudio(AudioId),

    /// The playback queue has shut down.
    #[error("Playback service stopped")]
    ServiceStopped,

    // ========================================================================
    // Decoder Errors
    // ========================================================================
    /// The platform could not create a decoder for the source.
    #[error("Failed to create decoder: {0}")]
    DecoderCreateFailed(#[source] BridgeError),

    /// The source could not be prepared.
    #[error("Decoder preparation failed (code {code}): {message}")]
    DecoderPrepareFailed { code: i32, message: String },

    /// A prepared decoder failed.
    #[error("Decoder runtime error (code {code}): {message}")]
    DecoderRuntimeError { code: i32, message: String },

    /// Bridge error surfaced unchanged.
    #[error("Bridge error: {0}")]
    Bridge(#[from] BridgeError),
}

impl PlaybackError {
    /// Returns `true` if the command was rejected before any state changed.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            PlaybackError::InvalidEndpoint { .. }
                | PlaybackError::InvalidVolume(_)
                | PlaybackError::InvalidSeekPosition(_)
                | PlaybackError::InvalidEndpointValue(_)
                | PlaybackError::InvalidConfig(_)
        )
    }

    /// Returns `true` for failures that originate in a platform decoder.
    pub fn is_decoder_error(&self) -> bool {
        matches!(
            self,
            PlaybackError::DecoderCreateFailed(_)
                | PlaybackError::DecoderPrepareFailed { .. }
                | PlaybackError::DecoderRuntimeError { .. }
                | PlaybackError::Bridge(_)
        )
    }

    /// Platform error code carried by decoder failures, `-1` otherwise.
    pub fn native_code(&self) -> i32 {
        match self {
            PlaybackError::DecoderPrepareFailed { code, .. }
            | PlaybackError::DecoderRuntimeError { code, .. } => *code,
            PlaybackError::DecoderCreateFailed(err) | PlaybackError::Bridge(err) => err.code(),
            _ => -1,
        }
    }

    /// Event classification for decoder failures.
    pub fn event_code(&self) -> Option<ErrorCode> {
        match self {
            PlaybackError::DecoderCreateFailed(_) => Some(ErrorCode::DecoderCreateFailed),
            PlaybackError::DecoderPrepareFailed { .. } => Some(ErrorCode::DecoderPrepareFailed),
            PlaybackError::DecoderRuntimeError { .. } | PlaybackError::Bridge(_) => {
                Some(ErrorCode::DecoderRuntimeError)
            }
            _ => None,
        }
    }
}

/// Result type for playback operations.
pub type Result<T> = std::result::Result<T, PlaybackError>;
