//! Traffic statistics for the bridge
//!
//! Thread-safe counters shared by the session, packetizer and reply writer.
//! Uses lock-free atomics for all operations.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Relay counters (fully lock-free)
#[derive(Default)]
pub struct Stats {
    /// Bytes received from the upstream transport
    rx_bytes: AtomicU64,
    /// Completed lines (blank ones included)
    lines: AtomicU64,
    /// Telemetry records handed to the packetizer
    records: AtomicU64,
    /// `ping` keywords answered
    pings: AtomicU64,
    /// Records rejected in strict mode
    rejected: AtomicU64,
    /// CAN frames sent
    frames_sent: AtomicU64,
    /// CAN frames that failed to send
    frames_failed: AtomicU64,
    /// Replies written to the upstream transport
    responses_sent: AtomicU64,
    /// Replies dropped (link down or channel full)
    responses_dropped: AtomicU64,
}

/// Point-in-time copy of the counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub rx_bytes: u64,
    pub lines: u64,
    pub records: u64,
    pub pings: u64,
    pub rejected: u64,
    pub frames_sent: u64,
    pub frames_failed: u64,
    pub responses_sent: u64,
    pub responses_dropped: u64,
}

impl Stats {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn add_rx(&self, bytes: usize) {
        self.rx_bytes.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    #[inline]
    pub fn add_line(&self) {
        self.lines.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn add_record(&self) {
        self.records.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn add_ping(&self) {
        self.pings.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn add_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn add_frame_sent(&self) {
        self.frames_sent.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn add_frame_failed(&self) {
        self.frames_failed.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn add_response_sent(&self) {
        self.responses_sent.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn add_response_dropped(&self) {
        self.responses_dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// Copy all counters
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            rx_bytes: self.rx_bytes.load(Ordering::Relaxed),
            lines: self.lines.load(Ordering::Relaxed),
            records: self.records.load(Ordering::Relaxed),
            pings: self.pings.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            frames_sent: self.frames_sent.load(Ordering::Relaxed),
            frames_failed: self.frames_failed.load(Ordering::Relaxed),
            responses_sent: self.responses_sent.load(Ordering::Relaxed),
            responses_dropped: self.responses_dropped.load(Ordering::Relaxed),
        }
    }
}

impl fmt::Display for StatsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} bytes, {} lines, {} records, {} pings, {} rejected, \
             CAN {} sent / {} failed, replies {} sent / {} dropped",
            self.rx_bytes,
            self.lines,
            self.records,
            self.pings,
            self.rejected,
            self.frames_sent,
            self.frames_failed,
            self.responses_sent,
            self.responses_dropped
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_accumulate() {
        let stats = Stats::new();
        stats.add_rx(10);
        stats.add_rx(5);
        stats.add_line();
        stats.add_record();
        stats.add_frame_sent();
        stats.add_frame_sent();
        stats.add_frame_failed();

        let snap = stats.snapshot();
        assert_eq!(snap.rx_bytes, 15);
        assert_eq!(snap.lines, 1);
        assert_eq!(snap.records, 1);
        assert_eq!(snap.frames_sent, 2);
        assert_eq!(snap.frames_failed, 1);
        assert_eq!(snap.pings, 0);
    }

    #[test]
    fn test_snapshot_display() {
        let snap = StatsSnapshot {
            records: 2,
            frames_sent: 8,
            ..Default::default()
        };
        let text = snap.to_string();
        assert!(text.contains("2 records"));
        assert!(text.contains("CAN 8 sent / 0 failed"));
    }
}
