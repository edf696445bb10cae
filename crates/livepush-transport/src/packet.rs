//! Wire-ready packet type.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Logical RTMP channel a packet travels on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Channel {
    Audio,
    Video,
}

impl Channel {
    /// Chunk stream id used for this channel.
    pub fn chunk_stream_id(self) -> u32 {
        match self {
            Self::Audio => 0x11,
            Self::Video => 0x10,
        }
    }

    /// RTMP message type id ("Audio" = 8, "Video" = 9).
    pub fn message_type_id(self) -> u8 {
        match self {
            Self::Audio => 0x08,
            Self::Video => 0x09,
        }
    }
}

/// What a packet body carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PacketKind {
    /// AAC sequence header (AudioSpecificConfig).
    AudioConfig,
    /// Raw AAC frame.
    AudioFrame,
    /// AVC decoder configuration record.
    VideoConfig,
    /// IDR slice.
    VideoKeyFrame,
    /// Non-IDR slice.
    VideoInterFrame,
}

impl PacketKind {
    /// Channel this kind of packet is sent on.
    pub fn channel(self) -> Channel {
        match self {
            Self::AudioConfig | Self::AudioFrame => Channel::Audio,
            Self::VideoConfig | Self::VideoKeyFrame | Self::VideoInterFrame => Channel::Video,
        }
    }

    /// Whether this is a one-time configuration packet.
    pub fn is_config(self) -> bool {
        matches!(self, Self::AudioConfig | Self::VideoConfig)
    }

    /// Header compaction used for this kind of packet.
    pub fn header_compaction(self) -> HeaderCompaction {
        if self.is_config() {
            HeaderCompaction::Medium
        } else {
            HeaderCompaction::Full
        }
    }
}

/// How much chunk header the transport should send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HeaderCompaction {
    /// Full header with an explicit timestamp.
    Full,
    /// Medium header, no timestamp (time 0).
    Medium,
}

/// A wire-ready packet.
///
/// Packets are not `Clone`: each one is owned by exactly one pipeline stage
/// at a time and moves from packetizer to queue to sender.
#[derive(Debug, PartialEq, Eq)]
pub struct PacketBuffer {
    timestamp_ms: u32,
    kind: PacketKind,
    stream_id: u32,
    body: Bytes,
}

impl PacketBuffer {
    /// Create an unstamped packet.
    pub fn new(kind: PacketKind, body: Bytes) -> Self {
        Self {
            timestamp_ms: 0,
            kind,
            stream_id: 0,
            body,
        }
    }

    /// Return this packet stamped with a session-relative timestamp.
    ///
    /// Medium-header packets carry no timestamp and stay at 0.
    pub fn with_timestamp(mut self, timestamp_ms: u32) -> Self {
        if self.header_compaction() == HeaderCompaction::Full {
            self.timestamp_ms = timestamp_ms;
        }
        self
    }

    /// Return this packet addressed to an outgoing message stream.
    pub fn with_stream_id(mut self, stream_id: u32) -> Self {
        self.stream_id = stream_id;
        self
    }

    pub fn timestamp_ms(&self) -> u32 {
        self.timestamp_ms
    }

    pub fn kind(&self) -> PacketKind {
        self.kind
    }

    pub fn channel(&self) -> Channel {
        self.kind.channel()
    }

    pub fn header_compaction(&self) -> HeaderCompaction {
        self.kind.header_compaction()
    }

    pub fn stream_id(&self) -> u32 {
        self.stream_id
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Body length in bytes.
    pub fn len(&self) -> usize {
        self.body.len()
    }

    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }

    /// Consume the packet, returning its body.
    pub fn into_body(self) -> Bytes {
        self.body
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_packets_ignore_timestamp() {
        let packet = PacketBuffer::new(PacketKind::VideoConfig, Bytes::from_static(&[0x17]))
            .with_timestamp(1234);
        assert_eq!(packet.timestamp_ms(), 0);
        assert_eq!(packet.header_compaction(), HeaderCompaction::Medium);
    }

    #[test]
    fn test_frame_packets_carry_timestamp() {
        let packet = PacketBuffer::new(PacketKind::AudioFrame, Bytes::from_static(&[0xAF, 0x01]))
            .with_timestamp(1234)
            .with_stream_id(1);
        assert_eq!(packet.timestamp_ms(), 1234);
        assert_eq!(packet.stream_id(), 1);
        assert_eq!(packet.header_compaction(), HeaderCompaction::Full);
    }

    #[test]
    fn test_channel_metadata() {
        assert_eq!(PacketKind::AudioConfig.channel(), Channel::Audio);
        assert_eq!(PacketKind::VideoInterFrame.channel(), Channel::Video);
        assert_ne!(
            Channel::Audio.chunk_stream_id(),
            Channel::Video.chunk_stream_id()
        );
        assert_eq!(Channel::Audio.message_type_id(), 0x08);
        assert_eq!(Channel::Video.message_type_id(), 0x09);
    }
}
