//! RTMP packet framing and publishing connection.
//!
//! This crate turns encoder output into wire-ready [`PacketBuffer`]s and
//! provides the [`Connection`] seam the streaming session sends them through.

mod connection;
mod error;
pub mod flv;
pub mod nal;
mod packet;
mod rtmp;

pub use connection::{Clock, Connection, MonotonicClock};
pub use error::TransportError;
pub use packet::{Channel, HeaderCompaction, PacketBuffer, PacketKind};
pub use rtmp::{RtmpConnection, RtmpTarget};

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// Default RTMP port.
pub const DEFAULT_RTMP_PORT: u16 = 1935;

/// Default connect timeout in seconds.
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 5;
