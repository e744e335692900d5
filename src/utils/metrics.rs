//! Observability and Metrics
//!
//! Counters for the session layer, owned by each server instance (there is
//! no process-wide collector). Atomic so a snapshot can be taken through a
//! shared reference, e.g. from a task that periodically logs it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::{debug, info};

/// Metrics collector for one session server
#[derive(Debug)]
pub struct Metrics {
    /// Datagrams read from the transport
    pub datagrams_received: AtomicU64,
    /// Bytes read from the transport
    pub bytes_received: AtomicU64,
    /// Datagrams handed to the transport successfully
    pub datagrams_sent: AtomicU64,
    /// Bytes handed to the transport successfully
    pub bytes_sent: AtomicU64,
    /// Datagrams the transport refused to send
    pub send_failures: AtomicU64,
    /// Datagrams discarded because they could not be decoded
    pub decode_failures: AtomicU64,
    /// Sessions created by a handshake
    pub handshakes: AtomicU64,
    /// Sessions currently registered
    pub sessions_active: AtomicU64,
    /// Sessions removed by maintenance
    pub sessions_evicted: AtomicU64,
    /// Datagrams naming an unknown or evicted session
    pub unknown_session_drops: AtomicU64,
    /// Payloads delivered to the application
    pub payloads_accepted: AtomicU64,
    /// Reliable payloads dropped as duplicates
    pub duplicates_suppressed: AtomicU64,
    /// Acknowledgments queued for reliable requests
    pub acks_queued: AtomicU64,
    /// Dedup records removed by maintenance
    pub dedup_records_evicted: AtomicU64,
    /// Outbound datagrams dropped because the queue was full
    pub outbound_dropped: AtomicU64,
    /// Start time for uptime calculation
    start_time: Instant,
}

impl Metrics {
    /// Create a new metrics collector
    pub fn new() -> Self {
        Self {
            datagrams_received: AtomicU64::new(0),
            bytes_received: AtomicU64::new(0),
            datagrams_sent: AtomicU64::new(0),
            bytes_sent: AtomicU64::new(0),
            send_failures: AtomicU64::new(0),
            decode_failures: AtomicU64::new(0),
            handshakes: AtomicU64::new(0),
            sessions_active: AtomicU64::new(0),
            sessions_evicted: AtomicU64::new(0),
            unknown_session_drops: AtomicU64::new(0),
            payloads_accepted: AtomicU64::new(0),
            duplicates_suppressed: AtomicU64::new(0),
            acks_queued: AtomicU64::new(0),
            dedup_records_evicted: AtomicU64::new(0),
            outbound_dropped: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    /// Record a datagram read from the transport
    pub fn datagram_received(&self, byte_count: u64) {
        self.datagrams_received.fetch_add(1, Ordering::Relaxed);
        self.bytes_received.fetch_add(byte_count, Ordering::Relaxed);
    }

    /// Record a datagram sent
    pub fn datagram_sent(&self, byte_count: u64) {
        self.datagrams_sent.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(byte_count, Ordering::Relaxed);
    }

    pub fn send_failed(&self) {
        self.send_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn decode_failed(&self) {
        self.decode_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a session created by a handshake
    pub fn session_created(&self) {
        self.handshakes.fetch_add(1, Ordering::Relaxed);
        self.sessions_active.fetch_add(1, Ordering::Relaxed);
    }

    /// Record sessions evicted by maintenance
    pub fn sessions_evicted(&self, count: u64) {
        self.sessions_evicted.fetch_add(count, Ordering::Relaxed);
        self.sessions_active.fetch_sub(count, Ordering::Relaxed);
    }

    pub fn unknown_session(&self) {
        self.unknown_session_drops.fetch_add(1, Ordering::Relaxed);
    }

    pub fn payload_accepted(&self) {
        self.payloads_accepted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn duplicate_suppressed(&self) {
        self.duplicates_suppressed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn ack_queued(&self) {
        self.acks_queued.fetch_add(1, Ordering::Relaxed);
    }

    pub fn dedup_records_evicted(&self, count: u64) {
        self.dedup_records_evicted.fetch_add(count, Ordering::Relaxed);
    }

    pub fn outbound_dropped(&self) {
        self.outbound_dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current metrics snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            datagrams_received: self.datagrams_received.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            datagrams_sent: self.datagrams_sent.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            send_failures: self.send_failures.load(Ordering::Relaxed),
            decode_failures: self.decode_failures.load(Ordering::Relaxed),
            handshakes: self.handshakes.load(Ordering::Relaxed),
            sessions_active: self.sessions_active.load(Ordering::Relaxed),
            sessions_evicted: self.sessions_evicted.load(Ordering::Relaxed),
            unknown_session_drops: self.unknown_session_drops.load(Ordering::Relaxed),
            payloads_accepted: self.payloads_accepted.load(Ordering::Relaxed),
            duplicates_suppressed: self.duplicates_suppressed.load(Ordering::Relaxed),
            acks_queued: self.acks_queued.load(Ordering::Relaxed),
            dedup_records_evicted: self.dedup_records_evicted.load(Ordering::Relaxed),
            outbound_dropped: self.outbound_dropped.load(Ordering::Relaxed),
            uptime_seconds: self.start_time.elapsed().as_secs(),
        }
    }

    /// Log current metrics
    pub fn log_metrics(&self) {
        let snapshot = self.snapshot();
        info!(
            datagrams_received = snapshot.datagrams_received,
            bytes_received = snapshot.bytes_received,
            datagrams_sent = snapshot.datagrams_sent,
            bytes_sent = snapshot.bytes_sent,
            send_failures = snapshot.send_failures,
            decode_failures = snapshot.decode_failures,
            handshakes = snapshot.handshakes,
            sessions_active = snapshot.sessions_active,
            sessions_evicted = snapshot.sessions_evicted,
            unknown_session_drops = snapshot.unknown_session_drops,
            payloads_accepted = snapshot.payloads_accepted,
            duplicates_suppressed = snapshot.duplicates_suppressed,
            acks_queued = snapshot.acks_queued,
            dedup_records_evicted = snapshot.dedup_records_evicted,
            outbound_dropped = snapshot.outbound_dropped,
            uptime_seconds = snapshot.uptime_seconds,
            "Session metrics snapshot"
        );
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of metrics at a point in time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub datagrams_received: u64,
    pub bytes_received: u64,
    pub datagrams_sent: u64,
    pub bytes_sent: u64,
    pub send_failures: u64,
    pub decode_failures: u64,
    pub handshakes: u64,
    pub sessions_active: u64,
    pub sessions_evicted: u64,
    pub unknown_session_drops: u64,
    pub payloads_accepted: u64,
    pub duplicates_suppressed: u64,
    pub acks_queued: u64,
    pub dedup_records_evicted: u64,
    pub outbound_dropped: u64,
    pub uptime_seconds: u64,
}

/// Timer for measuring operation duration
pub struct Timer {
    start: Instant,
    operation: &'static str,
}

impl Timer {
    /// Start timing an operation
    pub fn start(operation: &'static str) -> Self {
        Self {
            start: Instant::now(),
            operation,
        }
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        let duration = self.start.elapsed();
        debug!(
            operation = self.operation,
            duration_us = duration.as_micros() as u64,
            "Operation completed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_gauge_follows_create_and_evict() {
        let metrics = Metrics::new();
        metrics.session_created();
        metrics.session_created();
        metrics.sessions_evicted(1);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.handshakes, 2);
        assert_eq!(snapshot.sessions_active, 1);
        assert_eq!(snapshot.sessions_evicted, 1);
    }

    #[test]
    fn test_byte_counters() {
        let metrics = Metrics::new();
        metrics.datagram_received(10);
        metrics.datagram_received(5);
        metrics.datagram_sent(7);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.datagrams_received, 2);
        assert_eq!(snapshot.bytes_received, 15);
        assert_eq!(snapshot.datagrams_sent, 1);
        assert_eq!(snapshot.bytes_sent, 7);
    }
}
