//! Connection and clock collaborators.

use std::time::{Duration, Instant};

use crate::packet::PacketBuffer;
use crate::TransportResult;

/// A publishing connection to a media-ingest server.
///
/// Calls happen in order `connect`, `connect_stream`, then any number of
/// `send`, then `close`. All calls are made from the session's sender thread.
pub trait Connection: Send {
    /// Establish the transport session (socket, handshake, application connect).
    fn connect(&mut self, url: &str, timeout: Duration) -> TransportResult<()>;

    /// Open the outgoing media stream.
    fn connect_stream(&mut self) -> TransportResult<()>;

    /// Message stream id assigned to outgoing packets.
    fn stream_id(&self) -> u32;

    /// Send one packet.
    fn send(&mut self, packet: &PacketBuffer) -> TransportResult<()>;

    /// Release network resources. Safe to call more than once.
    fn close(&mut self);
}

/// Millisecond clock shared by the session and its producers.
pub trait Clock: Send + Sync {
    /// Current time in milliseconds. Wraps at `u32::MAX`.
    fn now(&self) -> u32;
}

/// Milliseconds elapsed since the clock was created.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> u32 {
        self.origin.elapsed().as_millis() as u32
    }
}
