//! # Session Registry
//!
//! Owns the set of live client sessions.
//!
//! A session exists here exactly while its client is considered connected.
//! Lookups for an identity that is absent mean "never connected or already
//! evicted"; nothing in this module recreates a session implicitly.
//!
//! ## Identity allocation
//! Identities come from a counter owned by the registry instance. They start
//! at 1, strictly increase, and are never reused, even after eviction.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use tracing::{debug, trace};

use crate::core::message::SessionId;
use crate::utils::time::is_expired;

/// One connected client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    id: SessionId,
    /// Endpoint most recently observed for this identity
    endpoint: SocketAddr,
    /// Time of the last accepted message
    last_seen: Instant,
}

impl Session {
    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn endpoint(&self) -> SocketAddr {
        self.endpoint
    }

    pub fn last_seen(&self) -> Instant {
        self.last_seen
    }
}

/// Live sessions keyed by identity
#[derive(Debug)]
pub struct SessionRegistry {
    sessions: HashMap<SessionId, Session>,
    /// Last identity handed out; 0 means none yet
    last_id: u64,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            sessions: HashMap::new(),
            last_id: 0,
        }
    }

    /// Register a new session for `endpoint` and return its identity
    pub fn create(&mut self, endpoint: SocketAddr, now: Instant) -> SessionId {
        self.last_id += 1;
        let id = SessionId::new(self.last_id);

        self.sessions.insert(
            id,
            Session {
                id,
                endpoint,
                last_seen: now,
            },
        );

        debug!(session_id = %id, %endpoint, session_count = self.sessions.len(), "Session created");
        id
    }

    pub fn lookup(&self, id: SessionId) -> Option<&Session> {
        self.sessions.get(&id)
    }

    /// Refresh endpoint and liveness of a known session.
    ///
    /// Returns false, and changes nothing, if the identity is unknown.
    pub fn touch(&mut self, id: SessionId, endpoint: SocketAddr, now: Instant) -> bool {
        match self.sessions.get_mut(&id) {
            Some(session) => {
                if session.endpoint != endpoint {
                    debug!(session_id = %id, old = %session.endpoint, new = %endpoint, "Session endpoint migrated");
                }
                session.endpoint = endpoint;
                session.last_seen = now;
                trace!(session_id = %id, "Session touched");
                true
            }
            None => false,
        }
    }

    /// Remove every session silent for longer than `timeout` and return them
    pub fn evict_expired(&mut self, timeout: Duration, now: Instant) -> Vec<Session> {
        let expired: Vec<SessionId> = self
            .sessions
            .values()
            .filter(|session| is_expired(session.last_seen, now, timeout))
            .map(|session| session.id)
            .collect();

        let evicted: Vec<Session> = expired
            .into_iter()
            .filter_map(|id| self.sessions.remove(&id))
            .collect();

        if !evicted.is_empty() {
            debug!(
                removed_count = evicted.len(),
                remaining_count = self.sessions.len(),
                "Expired sessions evicted"
            );
        }
        evicted
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Live sessions in no particular order
    pub fn iter(&self) -> impl Iterator<Item = &Session> {
        self.sessions.values()
    }
}
