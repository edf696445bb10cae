//! Error codes and the sinks that receive them.

use std::sync::Arc;

use crossbeam_channel::Sender;
use thiserror::Error;
use tracing::{error, warn};

use livepush_transport::PacketBuffer;

/// Failure surfaced to the application layer.
///
/// The discriminants are the integer codes reported to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
#[repr(i32)]
pub enum ErrorCode {
    #[error("failed to open video encoder")]
    VideoEncoderOpen = 0x01,
    #[error("failed to encode video frame")]
    VideoEncode = 0x02,
    #[error("failed to open audio encoder")]
    AudioEncoderOpen = 0x03,
    #[error("failed to encode audio frame")]
    AudioEncode = 0x04,
    #[error("failed to connect to server")]
    Connect = 0x05,
    #[error("failed to open stream")]
    ConnectStream = 0x06,
    #[error("failed to send packet")]
    Send = 0x07,
}

impl ErrorCode {
    /// Integer code reported to the host.
    pub fn code(self) -> i32 {
        self as i32
    }

    /// Look up an error code by its integer value.
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0x01 => Some(Self::VideoEncoderOpen),
            0x02 => Some(Self::VideoEncode),
            0x03 => Some(Self::AudioEncoderOpen),
            0x04 => Some(Self::AudioEncode),
            0x05 => Some(Self::Connect),
            0x06 => Some(Self::ConnectStream),
            0x07 => Some(Self::Send),
            _ => None,
        }
    }

    /// Whether this failure ends the session.
    pub fn is_fatal(self) -> bool {
        matches!(self, Self::Connect | Self::ConnectStream | Self::Send)
    }
}

/// External receiver of error codes.
///
/// Sessions call `report` without holding any internal lock, so a sink may
/// call back into the session.
pub trait ErrorSink: Send + Sync {
    fn report(&self, code: ErrorCode);
}

impl ErrorSink for Sender<ErrorCode> {
    fn report(&self, code: ErrorCode) {
        if let Err(e) = self.try_send(code) {
            warn!("Failed to deliver error code {:#04x}: {}", code.code(), e);
        }
    }
}

/// Sink that only logs.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogErrorSink;

impl ErrorSink for LogErrorSink {
    fn report(&self, code: ErrorCode) {
        error!(code = code.code(), "{}", code);
    }
}

struct FnErrorSink<F>(F);

impl<F> ErrorSink for FnErrorSink<F>
where
    F: Fn(ErrorCode) + Send + Sync,
{
    fn report(&self, code: ErrorCode) {
        (self.0)(code)
    }
}

/// Wrap a closure as an error sink.
pub fn error_sink_fn<F>(f: F) -> impl ErrorSink
where
    F: Fn(ErrorCode) + Send + Sync,
{
    FnErrorSink(f)
}

/// Where encoder adapters deliver packets.
pub trait PacketSink: Send + Sync {
    /// Whether packets are currently accepted. Adapters skip encoding
    /// while this is false.
    fn is_streaming(&self) -> bool;

    /// Stamp and queue a packet for sending.
    fn enqueue(&self, packet: PacketBuffer);

    /// Register the audio configuration packet sent at stream start.
    fn set_audio_config(&self, packet: PacketBuffer);

    /// Withdraw a registered audio configuration packet that has not been
    /// queued yet.
    fn clear_audio_config(&self);

    /// Report a failure.
    fn report(&self, code: ErrorCode);
}

impl<T: PacketSink + ?Sized> PacketSink for Arc<T> {
    fn is_streaming(&self) -> bool {
        (**self).is_streaming()
    }

    fn enqueue(&self, packet: PacketBuffer) {
        (**self).enqueue(packet)
    }

    fn set_audio_config(&self, packet: PacketBuffer) {
        (**self).set_audio_config(packet)
    }

    fn clear_audio_config(&self) {
        (**self).clear_audio_config()
    }

    fn report(&self, code: ErrorCode) {
        (**self).report(code)
    }
}
