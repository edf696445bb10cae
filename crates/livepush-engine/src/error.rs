//! Error types for the engine module.

use thiserror::Error;

use livepush_encoder::EncoderError;
use livepush_transport::TransportError;

/// Errors returned by session and configuration calls.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Sender thread could not be spawned.
    #[error("Failed to spawn sender thread: {0}")]
    Spawn(#[source] std::io::Error),

    /// Configuration file could not be read.
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration is not valid JSON for a stream config.
    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    /// Configuration values are invalid.
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    /// Encoder error.
    #[error(transparent)]
    Encoder(#[from] EncoderError),

    /// Transport error.
    #[error(transparent)]
    Transport(#[from] TransportError),
}
