//! Outbound queue for batched, non-blocking transmission.
//!
//! Replies produced while routing a cycle are encoded immediately and queued
//! here; the driver flushes them in one go after the cycle. Sending is
//! best-effort: a datagram that fails to go out is dropped and the flush moves
//! on to the next one.

use std::collections::VecDeque;
use std::net::SocketAddr;

use bytes::Bytes;
use tracing::{trace, warn};

use super::DatagramTransport;
use crate::utils::metrics::Metrics;

/// Outcome of one flush
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushReport {
    pub sent: usize,
    pub failed: usize,
}

/// FIFO of encoded datagrams and their destinations
#[derive(Debug, Default)]
pub struct OutboundQueue {
    entries: VecDeque<(Bytes, SocketAddr)>,
    /// `None` means unbounded
    limit: Option<usize>,
}

impl OutboundQueue {
    /// Unbounded queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue holding at most `limit` datagrams when set; once full, the
    /// oldest entry makes room for the newest
    pub fn with_limit(limit: Option<usize>) -> Self {
        Self {
            entries: VecDeque::new(),
            limit,
        }
    }

    /// Append a datagram. Never blocks.
    ///
    /// Returns the entry dropped to make room, if any.
    pub fn enqueue(&mut self, datagram: Bytes, target: SocketAddr) -> Option<(Bytes, SocketAddr)> {
        let dropped = match self.limit {
            Some(limit) if self.entries.len() >= limit => self.entries.pop_front(),
            _ => None,
        };
        if let Some((_, dropped_target)) = &dropped {
            warn!(target_addr = %dropped_target, "Outbound queue full, dropped oldest datagram");
        }

        self.entries.push_back((datagram, target));
        trace!(queued = self.entries.len(), "Datagram queued");
        dropped
    }

    /// Send every queued datagram in enqueue order, removing each as it goes
    pub fn flush<T: DatagramTransport>(&mut self, transport: &mut T, metrics: &Metrics) -> FlushReport {
        let mut report = FlushReport::default();

        while let Some((datagram, target)) = self.entries.pop_front() {
            match transport.try_send(&datagram, target) {
                Ok(written) => {
                    report.sent += 1;
                    metrics.datagram_sent(written as u64);
                }
                Err(e) => {
                    report.failed += 1;
                    metrics.send_failed();
                    warn!(error = %e, target_addr = %target, "Failed to send datagram");
                }
            }
        }

        report
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Queued datagrams in send order
    pub fn iter(&self) -> impl Iterator<Item = &(Bytes, SocketAddr)> {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::transport::memory::MemoryTransport;

    fn addr(port: u16) -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], port))
    }

    #[test]
    fn test_flush_preserves_order_and_empties_queue() {
        let handle = MemoryTransport::new(addr(1));
        let mut transport = handle.clone();
        let metrics = Metrics::new();
        let mut queue = OutboundQueue::new();

        queue.enqueue(Bytes::from_static(b"a"), addr(2));
        queue.enqueue(Bytes::from_static(b"b"), addr(3));
        queue.enqueue(Bytes::from_static(b"c"), addr(2));

        let report = queue.flush(&mut transport, &metrics);

        assert_eq!(report, FlushReport { sent: 3, failed: 0 });
        assert!(queue.is_empty());
        let sent: Vec<_> = handle.take_sent().into_iter().map(|(b, _)| b).collect();
        assert_eq!(sent, vec![&b"a"[..], &b"b"[..], &b"c"[..]]);
        assert_eq!(metrics.snapshot().bytes_sent, 3);
    }

    #[test]
    fn test_failed_send_does_not_stop_flush() {
        let handle = MemoryTransport::new(addr(1));
        let mut transport = handle.clone();
        let metrics = Metrics::new();
        let mut queue = OutboundQueue::new();
        handle.make_unreachable(addr(9));

        queue.enqueue(Bytes::from_static(b"lost"), addr(9));
        queue.enqueue(Bytes::from_static(b"kept"), addr(2));

        let report = queue.flush(&mut transport, &metrics);

        assert_eq!(report, FlushReport { sent: 1, failed: 1 });
        assert!(queue.is_empty());
        let sent = handle.take_sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].1, addr(2));
        assert_eq!(metrics.snapshot().send_failures, 1);
    }

    #[test]
    fn test_bounded_queue_drops_oldest() {
        let mut queue = OutboundQueue::with_limit(Some(2));

        assert!(queue.enqueue(Bytes::from_static(b"1"), addr(2)).is_none());
        assert!(queue.enqueue(Bytes::from_static(b"2"), addr(2)).is_none());
        let dropped = queue.enqueue(Bytes::from_static(b"3"), addr(2)).unwrap();

        assert_eq!(&dropped.0[..], b"1");
        let remaining: Vec<_> = queue.iter().map(|(b, _)| b.clone()).collect();
        assert_eq!(remaining, vec![&b"2"[..], &b"3"[..]]);
    }

    #[test]
    fn test_unbounded_by_default() {
        let mut queue = OutboundQueue::new();
        for _ in 0..1000 {
            assert!(queue.enqueue(Bytes::from_static(b"x"), addr(2)).is_none());
        }
        assert_eq!(queue.len(), 1000);
    }
}
