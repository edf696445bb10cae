//! Error types for the transport module.

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur during transport operations.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Connection failed.
    #[error("Connection failed: {0}")]
    Connection(String),

    /// Connection request or publish request rejected by the server.
    #[error("Rejected by server: {0}")]
    Rejected(String),

    /// Invalid RTMP URL.
    #[error("Invalid RTMP URL: {0}")]
    InvalidUrl(String),

    /// Operation did not complete within the timeout.
    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    /// Send failed.
    #[error("Send failed: {0}")]
    Send(String),

    /// Not connected.
    #[error("Not connected")]
    NotConnected,

    /// Already connected.
    #[error("Already connected")]
    AlreadyConnected,

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// RTMP protocol error.
    #[error("RTMP protocol error: {0}")]
    Protocol(String),
}
