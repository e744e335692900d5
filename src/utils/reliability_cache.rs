//! Reliability Cache for duplicate suppression of reliable messages
//!
//! Every reliable general request is acknowledged, but its payload must reach
//! the application at most once. This cache remembers which
//! `(session, messageId)` pairs have already been delivered for a retention
//! window, long enough for a client to stop retransmitting once it sees the
//! acknowledgment.
//!
//! Expiry is driven by the maintenance pass rather than by lookups, so a
//! record is never dropped in the middle of a dispatch cycle.

use crate::core::message::{MessageId, SessionId};
use crate::utils::time::is_expired;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// Key for dedup records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DedupKey {
    pub session_id: SessionId,
    pub message_id: MessageId,
}

impl DedupKey {
    pub fn new(session_id: SessionId, message_id: MessageId) -> Self {
        Self {
            session_id,
            message_id,
        }
    }
}

/// Set of recently delivered reliable messages, keyed by sender and sequence
/// number, each stamped with its first receipt time
#[derive(Debug, Default)]
pub struct ReliabilityCache {
    /// Receipt time per key
    records: HashMap<DedupKey, Instant>,
}

impl ReliabilityCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// True iff a record for this key is currently held
    pub fn is_duplicate(&self, session_id: SessionId, message_id: MessageId) -> bool {
        self.records
            .contains_key(&DedupKey::new(session_id, message_id))
    }

    /// Remember a delivered message. The first receipt keeps its timestamp;
    /// recording an existing key again changes nothing.
    pub fn record(&mut self, session_id: SessionId, message_id: MessageId, now: Instant) {
        self.records
            .entry(DedupKey::new(session_id, message_id))
            .or_insert(now);
        trace!(%session_id, message_id, "Dedup record stored");
    }

    /// Remove every record older than `retention`; returns how many went
    pub fn evict_expired(&mut self, retention: Duration, now: Instant) -> usize {
        let before = self.records.len();
        self.records
            .retain(|_, received| !is_expired(*received, now, retention));

        let removed = before - self.records.len();
        if removed > 0 {
            debug!(
                removed_count = removed,
                remaining_count = self.records.len(),
                "Expired dedup records evicted"
            );
        }
        removed
    }

    /// Number of records currently held
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Receipt time of a record, if held
    pub fn received_at(&self, session_id: SessionId, message_id: MessageId) -> Option<Instant> {
        self.records
            .get(&DedupKey::new(session_id, message_id))
            .copied()
    }

    /// Clear all records
    pub fn clear(&mut self) {
        self.records.clear();
        debug!("Reliability cache cleared");
    }
}
