use thiserror::Error;

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Bridge capability not available: {0}")]
    NotAvailable(String),

    #[error("Bridge operation failed: {0}")]
    OperationFailed(String),

    #[error("Unsupported audio source: {0}")]
    UnsupportedSource(String),

    #[error("Decoder error {code}: {message}")]
    Decoder { code: i32, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    /// Platform error code carried by this error, if any.
    ///
    /// Errors that did not originate in a native decoder map to `-1`, which
    /// matches the "unknown" code most platform players report.
    pub fn code(&self) -> i32 {
        match self {
            BridgeError::Decoder { code, .. } => *code,
            _ => -1,
        }
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;
