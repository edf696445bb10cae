//! Packet accounting for a streaming session.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use livepush_transport::PacketBuffer;

/// Counters updated by producers, the sender thread and the queue release hook.
#[derive(Debug, Default)]
pub struct SessionStats {
    packets_enqueued: AtomicU64,
    packets_sent: AtomicU64,
    bytes_sent: AtomicU64,
    packets_released: AtomicU64,
    packets_dropped: AtomicU64,
}

impl SessionStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a packet accepted into the send queue.
    pub fn record_enqueued(&self) {
        self.packets_enqueued.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a packet written to the connection.
    pub fn record_sent(&self, packet: &PacketBuffer) {
        self.packets_sent.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent
            .fetch_add(packet.len() as u64, Ordering::Relaxed);
    }

    /// Record a packet freed without being sent.
    pub fn record_released(&self) {
        self.packets_released.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a packet rejected because the session was not streaming.
    pub fn record_dropped(&self) {
        self.packets_dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current counters.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            packets_enqueued: self.packets_enqueued.load(Ordering::Relaxed),
            packets_sent: self.packets_sent.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            packets_released: self.packets_released.load(Ordering::Relaxed),
            packets_dropped: self.packets_dropped.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`SessionStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsSnapshot {
    pub packets_enqueued: u64,
    pub packets_sent: u64,
    pub bytes_sent: u64,
    pub packets_released: u64,
    pub packets_dropped: u64,
}

impl StatsSnapshot {
    /// Queued packets not yet accounted for as sent or released.
    pub fn in_flight(&self) -> u64 {
        self.packets_enqueued
            .saturating_sub(self.packets_sent + self.packets_released)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use livepush_transport::PacketKind;

    #[test]
    fn test_counters() {
        let stats = SessionStats::new();
        let packet = PacketBuffer::new(PacketKind::AudioFrame, Bytes::from_static(&[0xAF, 0x01, 0x21]));

        stats.record_enqueued();
        stats.record_enqueued();
        stats.record_sent(&packet);
        stats.record_dropped();

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.packets_enqueued, 2);
        assert_eq!(snapshot.packets_sent, 1);
        assert_eq!(snapshot.bytes_sent, 3);
        assert_eq!(snapshot.packets_dropped, 1);
        assert_eq!(snapshot.in_flight(), 1);

        stats.record_released();
        assert_eq!(stats.snapshot().in_flight(), 0);
    }

    #[test]
    fn test_snapshot_serializes_camel_case() {
        let json = serde_json::to_string(&StatsSnapshot::default()).unwrap();
        assert!(json.contains("\"packetsSent\":0"));
        assert!(json.contains("\"bytesSent\":0"));
    }
}
