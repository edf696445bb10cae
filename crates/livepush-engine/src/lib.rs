//! Live push engine.
//!
//! A [`StreamSession`] owns one publishing connection and a sender thread.
//! Encoder adapters run on producer threads, turn raw frames into packets
//! and enqueue them through a [`SessionHandle`]; the sender thread drains
//! the shared [`ThreadSafeQueue`] into the connection in FIFO order.

mod adapter;
mod config;
mod error;
mod queue;
mod session;
mod sink;
mod stats;

pub use adapter::{AudioAdapter, AudioOpener, VideoAdapter, VideoOpener};
pub use config::StreamConfig;
pub use error::SessionError;
pub use queue::ThreadSafeQueue;
pub use session::{SessionHandle, SessionPhase, StreamSession};
pub use sink::{error_sink_fn, ErrorCode, ErrorSink, LogErrorSink, PacketSink};
pub use stats::{SessionStats, StatsSnapshot};

/// Result type for session operations.
pub type SessionResult<T> = Result<T, SessionError>;
