//! Error types for the encoder module.

use thiserror::Error;

/// Errors that can occur during encoding operations.
#[derive(Debug, Error)]
pub enum EncoderError {
    /// x264 initialization failed.
    #[error("x264 initialization failed: {0}")]
    X264InitFailed(String),

    /// AAC encoder initialization failed.
    #[error("AAC encoder initialization failed: {0}")]
    AacInitFailed(String),

    /// General encoding error.
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// Invalid input data.
    #[error("Invalid input data: {0}")]
    InvalidInput(String),

    /// Invalid encoder configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Encoder not configured.
    #[error("Encoder not initialized")]
    NotInitialized,

    /// Encoder backend not compiled into this build.
    #[error("Not supported: {0}")]
    NotSupported(String),
}
