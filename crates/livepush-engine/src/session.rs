//! Streaming session state machine and sender thread.

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument, trace, warn};

use livepush_transport::{Clock, Connection, PacketBuffer, DEFAULT_CONNECT_TIMEOUT_SECS};

use crate::error::SessionError;
use crate::queue::ThreadSafeQueue;
use crate::sink::{ErrorCode, ErrorSink, PacketSink};
use crate::stats::{SessionStats, StatsSnapshot};
use crate::SessionResult;

/// Lifecycle of a push session.
///
/// `Idle -> Connecting -> Streaming -> Stopping -> Closed`, with `Failed`
/// reachable from `Connecting` and `Streaming`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SessionPhase {
    Idle,
    Connecting,
    Streaming,
    Stopping,
    Closed,
    Failed,
}

impl SessionPhase {
    pub fn name(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Streaming => "streaming",
            Self::Stopping => "stopping",
            Self::Closed => "closed",
            Self::Failed => "failed",
        }
    }

    /// Whether the session has ended and will not stream again.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Closed | Self::Failed)
    }
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn transition(phase: &mut SessionPhase, next: SessionPhase) {
    let previous = std::mem::replace(phase, next);
    debug!(previous = %previous, current = %next, "Session transition");
}

/// State shared by the session owner, its handles and the sender thread.
struct Shared {
    queue: ThreadSafeQueue<PacketBuffer>,
    phase: RwLock<SessionPhase>,
    start_clock: AtomicU32,
    clock: Arc<dyn Clock>,
    error_sink: Arc<dyn ErrorSink>,
    audio_config: Mutex<Option<PacketBuffer>>,
    stats: Arc<SessionStats>,
}

impl Shared {
    fn phase(&self) -> SessionPhase {
        *self.phase.read()
    }

    fn is_streaming(&self) -> bool {
        self.phase() == SessionPhase::Streaming
    }

    fn push(&self, packet: PacketBuffer) {
        self.stats.record_enqueued();
        self.queue.push(packet);
    }

    fn enqueue(&self, packet: PacketBuffer) {
        if !self.is_streaming() {
            self.stats.record_dropped();
            trace!(kind = ?packet.kind(), "Dropping packet, session not streaming");
            return;
        }

        let timestamp_ms = self
            .clock
            .now()
            .wrapping_sub(self.start_clock.load(Ordering::Acquire));
        self.push(packet.with_timestamp(timestamp_ms));
    }

    fn set_audio_config(&self, packet: PacketBuffer) {
        let mut stored = self.audio_config.lock();
        if self.is_streaming() {
            debug!("Session already streaming, sending audio config now");
            self.push(packet);
        } else {
            *stored = Some(packet);
        }
    }

    fn clear_audio_config(&self) {
        if self.audio_config.lock().take().is_some() {
            debug!("Withdrew pending audio config");
        }
    }

    /// Move from `Connecting` to `Streaming`, queueing the audio
    /// configuration ahead of anything a producer can enqueue.
    fn begin_streaming(&self) -> bool {
        let mut audio_config = self.audio_config.lock();
        let mut phase = self.phase.write();
        if *phase != SessionPhase::Connecting {
            return false;
        }

        self.queue.start();
        if let Some(packet) = audio_config.take() {
            self.push(packet);
        }
        transition(&mut phase, SessionPhase::Streaming);
        true
    }

    /// Enter `Failed` and report `code`, unless a stop was already requested.
    fn fail(&self, code: ErrorCode) {
        let failed = {
            let mut phase = self.phase.write();
            if matches!(*phase, SessionPhase::Connecting | SessionPhase::Streaming) {
                transition(&mut phase, SessionPhase::Failed);
                true
            } else {
                false
            }
        };

        self.queue.stop();
        let released = self.queue.drain();
        if released > 0 {
            debug!(released, "Released queued packets after failure");
        }

        if failed {
            self.error_sink.report(code);
        } else {
            debug!(code = code.code(), "Failure during stop, not reported");
        }
    }
}

/// Cloneable producer-side view of a session.
///
/// Encoder adapters hold one of these to enqueue packets; it never owns the
/// sender thread or the connection.
#[derive(Clone)]
pub struct SessionHandle {
    shared: Arc<Shared>,
}

impl SessionHandle {
    pub fn phase(&self) -> SessionPhase {
        self.shared.phase()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.shared.stats.snapshot()
    }
}

impl fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionHandle")
            .field("phase", &self.phase())
            .finish()
    }
}

impl PacketSink for SessionHandle {
    fn is_streaming(&self) -> bool {
        self.shared.is_streaming()
    }

    fn enqueue(&self, packet: PacketBuffer) {
        self.shared.enqueue(packet);
    }

    fn set_audio_config(&self, packet: PacketBuffer) {
        self.shared.set_audio_config(packet);
    }

    fn clear_audio_config(&self) {
        self.shared.clear_audio_config();
    }

    fn report(&self, code: ErrorCode) {
        self.shared.error_sink.report(code);
    }
}

/// One push session: a connection, a packet queue and the sender thread
/// that drains the queue into the connection.
///
/// A session streams at most once. `start` is honoured only from `Idle`;
/// `stop` may be called from any phase and returns once the sender thread
/// has released the connection.
pub struct StreamSession {
    shared: Arc<Shared>,
    connection: Mutex<Option<Box<dyn Connection>>>,
    sender: Mutex<Option<JoinHandle<()>>>,
    connect_timeout: Duration,
}

impl StreamSession {
    /// Create an idle session.
    pub fn new(
        connection: Box<dyn Connection>,
        clock: Arc<dyn Clock>,
        error_sink: Arc<dyn ErrorSink>,
    ) -> Self {
        let stats = Arc::new(SessionStats::new());
        let released = Arc::clone(&stats);
        let queue = ThreadSafeQueue::with_release(move |packet: PacketBuffer| {
            trace!(kind = ?packet.kind(), len = packet.len(), "Releasing unsent packet");
            released.record_released();
        });

        Self {
            shared: Arc::new(Shared {
                queue,
                phase: RwLock::new(SessionPhase::Idle),
                start_clock: AtomicU32::new(0),
                clock,
                error_sink,
                audio_config: Mutex::new(None),
                stats,
            }),
            connection: Mutex::new(Some(connection)),
            sender: Mutex::new(None),
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
        }
    }

    /// Set the bound on connection establishment.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Producer-side handle for encoder adapters.
    pub fn handle(&self) -> SessionHandle {
        SessionHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.shared.phase()
    }

    pub fn is_streaming(&self) -> bool {
        self.shared.is_streaming()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.shared.stats.snapshot()
    }

    /// Begin connecting to `url` on a new sender thread.
    ///
    /// A call while not `Idle` does nothing.
    #[instrument(name = "session_start", skip(self, url))]
    pub fn start(&self, url: &str) -> SessionResult<()> {
        let connection = {
            let mut phase = self.shared.phase.write();
            if *phase != SessionPhase::Idle {
                debug!(phase = phase.name(), "Session not idle, ignoring start");
                return Ok(());
            }
            let Some(connection) = self.connection.lock().take() else {
                debug!("Connection already consumed, ignoring start");
                return Ok(());
            };
            transition(&mut phase, SessionPhase::Connecting);
            connection
        };

        info!("Starting session");

        let shared = Arc::clone(&self.shared);
        let url = url.to_string();
        let timeout = self.connect_timeout;
        let spawned = thread::Builder::new()
            .name("livepush-sender".to_string())
            .spawn(move || run_sender(shared, connection, url, timeout));

        match spawned {
            Ok(handle) => {
                *self.sender.lock() = Some(handle);
                Ok(())
            }
            Err(e) => {
                error!("Failed to spawn sender thread: {}", e);
                transition(&mut self.shared.phase.write(), SessionPhase::Failed);
                Err(SessionError::Spawn(e))
            }
        }
    }

    /// Stop the session and wait for the sender thread to exit.
    ///
    /// Packets still queued are released. A failed session stays `Failed`.
    #[instrument(name = "session_stop", skip(self))]
    pub fn stop(&self) {
        {
            let mut phase = self.shared.phase.write();
            let current = *phase;
            match current {
                SessionPhase::Idle => transition(&mut phase, SessionPhase::Closed),
                SessionPhase::Connecting | SessionPhase::Streaming => {
                    info!("Stopping session");
                    transition(&mut phase, SessionPhase::Stopping);
                }
                SessionPhase::Stopping | SessionPhase::Closed | SessionPhase::Failed => {}
            }
        }

        self.shared.queue.stop();

        let sender = self.sender.lock().take();
        if let Some(handle) = sender {
            if handle.thread().id() == thread::current().id() {
                warn!("stop called from the sender thread, not joining");
            } else if handle.join().is_err() {
                error!("Sender thread panicked");
            }
        }

        {
            let mut phase = self.shared.phase.write();
            if *phase == SessionPhase::Stopping {
                transition(&mut phase, SessionPhase::Closed);
            }
        }

        let released = self.shared.queue.drain();
        if released > 0 {
            debug!(released, "Released packets left after stop");
        }
    }
}

impl fmt::Debug for StreamSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamSession")
            .field("phase", &self.phase())
            .field("connect_timeout", &self.connect_timeout)
            .finish()
    }
}

impl Drop for StreamSession {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Sender thread body: connect, open the stream, then drain the queue.
fn run_sender(
    shared: Arc<Shared>,
    mut connection: Box<dyn Connection>,
    url: String,
    timeout: Duration,
) {
    debug!(timeout_secs = timeout.as_secs(), "Sender thread starting");

    if let Err(e) = connection.connect(&url, timeout) {
        error!("Connect failed: {}", e);
        connection.close();
        shared.fail(ErrorCode::Connect);
        return;
    }

    if let Err(e) = connection.connect_stream() {
        error!("Connect stream failed: {}", e);
        connection.close();
        shared.fail(ErrorCode::ConnectStream);
        return;
    }

    shared
        .start_clock
        .store(shared.clock.now(), Ordering::Release);

    if !shared.begin_streaming() {
        debug!("Stop requested before streaming began");
        connection.close();
        return;
    }

    info!("Streaming");
    let stream_id = connection.stream_id();

    while let Some(packet) = shared.queue.pop() {
        if !shared.is_streaming() {
            shared.queue.release(packet);
            break;
        }

        let packet = packet.with_stream_id(stream_id);
        match connection.send(&packet) {
            Ok(()) => {
                trace!(
                    kind = ?packet.kind(),
                    timestamp_ms = packet.timestamp_ms(),
                    len = packet.len(),
                    "Sent packet"
                );
                shared.stats.record_sent(&packet);
            }
            Err(e) => {
                warn!("Failed to send packet: {}", e);
                shared.queue.release(packet);
                connection.close();
                shared.fail(ErrorCode::Send);
                log_summary(&shared);
                return;
            }
        }
    }

    connection.close();
    log_summary(&shared);
}

fn log_summary(shared: &Shared) {
    let stats = shared.stats.snapshot();
    info!(
        sent = stats.packets_sent,
        bytes = stats.bytes_sent,
        released = stats.packets_released,
        dropped = stats.packets_dropped,
        "Sender thread finished"
    );
}
