//! Engine error types

use thiserror::Error;

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;

/// Engine errors
#[derive(Debug, Error)]
pub enum EngineError {
    /// Named output device not found
    #[error("audio device '{0}' not found")]
    DeviceNotFound(String),

    /// No default output device available
    #[error("no default audio device available")]
    NoDefaultDevice,

    /// Failed to enumerate devices
    #[error("failed to enumerate audio devices: {0}")]
    EnumerationFailed(String),

    /// Failed to decode the clip file
    #[error("failed to decode '{0}': {1}")]
    DecodeFailed(String, String),

    /// Failed to build or start an output stream
    #[error("failed to open output stream: {0}")]
    StreamOpenFailed(String),

    /// Failed to pause or resume an output stream
    #[error("stream control failed: {0}")]
    StreamControlFailed(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
