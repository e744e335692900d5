//! # Dispatch Loop
//!
//! One call to [`Dispatcher::run_cycle`] is one polling iteration:
//!
//! 1. **Maintenance gate**: at most once per `maintenance_interval`, evict
//!    silent sessions (queueing a disconnect notice to each) and expired
//!    dedup records.
//! 2. **Drain**: read every datagram that is immediately available.
//! 3. **Decode & route**: handshakes create sessions; everything else must
//!    name a live session; reliable requests are acknowledged and
//!    de-duplicated.
//! 4. Return the payloads accepted this cycle, in arrival order.
//!
//! Replies are only queued here. [`Dispatcher::flush`] sends them.
//!
//! Invalid or unknown-session traffic is dropped without any reply so that
//! unsolicited datagrams are never amplified.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use tracing::{debug, info, instrument, trace, warn};

use crate::config::ServerConfig;
use crate::core::codec::{Received, WireCodec};
use crate::core::message::{Delivery, Message, Payload, SessionId, Settings};
use crate::error::{ProtocolError, Result};
use crate::protocol::registry::{Session, SessionRegistry};
use crate::protocol::reply::{disconnect_notice, reply_for};
use crate::transport::outbound::{FlushReport, OutboundQueue};
use crate::transport::DatagramTransport;
use crate::utils::metrics::{Metrics, Timer};
use crate::utils::reliability_cache::ReliabilityCache;
use crate::utils::time::{Clock, SystemClock};

/// Application payload accepted during a cycle
#[derive(Debug, Clone, PartialEq)]
pub struct AcceptedPayload {
    /// Session that sent it
    pub session_id: SessionId,
    /// Endpoint it arrived from
    pub from: SocketAddr,
    pub data: Payload,
}

/// What a maintenance pass removed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MaintenanceReport {
    pub sessions_evicted: usize,
    pub records_evicted: usize,
}

/// Result of one dispatch cycle
#[derive(Debug, Default)]
pub struct CycleReport {
    /// Accepted payloads in arrival order
    pub payloads: Vec<AcceptedPayload>,
    /// `None` if the maintenance gate skipped this cycle
    pub maintenance: Option<MaintenanceReport>,
    /// Read failure that ended the drain early; datagrams read before it
    /// were still processed
    pub read_error: Option<io::Error>,
}

/// Read every immediately available datagram.
///
/// Stops at the first would-block or at the first real read failure, which
/// is returned alongside whatever was read before it.
pub fn drain<T: DatagramTransport>(
    transport: &mut T,
    metrics: &Metrics,
) -> (Vec<(Bytes, SocketAddr)>, Option<io::Error>) {
    let mut datagrams = Vec::new();
    loop {
        match transport.try_recv() {
            Ok(Some((bytes, from))) => {
                metrics.datagram_received(bytes.len() as u64);
                trace!(%from, len = bytes.len(), "Datagram read");
                datagrams.push((bytes, from));
            }
            Ok(None) => return (datagrams, None),
            Err(e) => {
                warn!(error = %e, drained = datagrams.len(), "Transport read failed");
                return (datagrams, Some(e));
            }
        }
    }
}

/// Session state machine for one server: registry, dedup cache, and the
/// replies waiting to be sent
#[derive(Debug)]
pub struct Dispatcher<C: Clock = SystemClock> {
    codec: WireCodec,
    session_timeout: Duration,
    message_retention: Duration,
    maintenance_interval: Duration,
    registry: SessionRegistry,
    reliability: ReliabilityCache,
    outbound: OutboundQueue,
    clock: C,
    last_maintenance: Instant,
    metrics: Arc<Metrics>,
}

impl Dispatcher<SystemClock> {
    pub fn new(config: &ServerConfig) -> Self {
        Self::with_clock(config, SystemClock)
    }
}

impl<C: Clock> Dispatcher<C> {
    /// Build a dispatcher reading time from `clock`. The maintenance gate
    /// counts from construction.
    pub fn with_clock(config: &ServerConfig, clock: C) -> Self {
        let last_maintenance = clock.now();
        Self {
            codec: WireCodec::new(config.wire_format),
            session_timeout: config.session_timeout,
            message_retention: config.message_retention,
            maintenance_interval: config.maintenance_interval,
            registry: SessionRegistry::new(),
            reliability: ReliabilityCache::new(),
            outbound: OutboundQueue::with_limit(config.outbound_queue_limit),
            clock,
            last_maintenance,
            metrics: Arc::new(Metrics::new()),
        }
    }

    /// Settings echoed to clients in handshake responses
    pub fn settings(&self) -> Settings {
        Settings::new(self.session_timeout)
    }

    /// Run one full cycle: maintenance gate, drain, decode and route
    #[instrument(skip_all)]
    pub fn run_cycle<T: DatagramTransport>(&mut self, transport: &mut T) -> CycleReport {
        let _timer = Timer::start("run_cycle");

        let maintenance = self.maintain();
        let (datagrams, read_error) = drain(transport, &self.metrics);

        let mut payloads = Vec::new();
        for (bytes, from) in datagrams {
            match self.route(&bytes, from) {
                Ok(Some(payload)) => payloads.push(payload),
                Ok(None) => {}
                Err(e) => self.discard(e, from),
            }
        }

        CycleReport {
            payloads,
            maintenance,
            read_error,
        }
    }

    /// Run maintenance if at least `maintenance_interval` has passed since
    /// the last pass; `None` if skipped
    pub fn maintain(&mut self) -> Option<MaintenanceReport> {
        let now = self.clock.now();
        if now.saturating_duration_since(self.last_maintenance) < self.maintenance_interval {
            return None;
        }
        Some(self.maintain_at(now))
    }

    /// Run maintenance regardless of the gate
    pub fn force_maintenance(&mut self) -> MaintenanceReport {
        let now = self.clock.now();
        self.maintain_at(now)
    }

    fn maintain_at(&mut self, now: Instant) -> MaintenanceReport {
        self.last_maintenance = now;

        let evicted = self.registry.evict_expired(self.session_timeout, now);
        for session in &evicted {
            info!(session_id = %session.id(), endpoint = %session.endpoint(), "Session timed out");
            self.queue_reply(&disconnect_notice(session.id()), session.endpoint());
        }

        let records_evicted = self.reliability.evict_expired(self.message_retention, now);

        self.metrics.sessions_evicted(evicted.len() as u64);
        self.metrics.dedup_records_evicted(records_evicted as u64);

        let report = MaintenanceReport {
            sessions_evicted: evicted.len(),
            records_evicted,
        };
        if report.sessions_evicted > 0 {
            info!(
                sessions_evicted = report.sessions_evicted,
                records_evicted = report.records_evicted,
                "Maintenance pass"
            );
        } else {
            debug!(records_evicted = report.records_evicted, "Maintenance pass");
        }
        report
    }

    /// Decode one datagram and apply it.
    ///
    /// Returns the payload to deliver, if the datagram carried a new one.
    ///
    /// # Errors
    /// `MalformedMessage` / `UnknownMessageKind` if it does not decode,
    /// `UnknownSession` if it names a session that is not live. None of
    /// these change any state.
    pub fn route(&mut self, datagram: &[u8], from: SocketAddr) -> Result<Option<AcceptedPayload>> {
        let Received { message, from } = self.codec.decode(datagram, from)?;
        let now = self.clock.now();

        let Some(session_id) = message.session_id() else {
            self.accept_handshake(&message, from, now);
            return Ok(None);
        };

        if !self.registry.touch(session_id, from, now) {
            self.metrics.unknown_session();
            return Err(ProtocolError::UnknownSession(session_id));
        }

        // Acknowledge before the duplicate check: a duplicate means the
        // client missed the previous acknowledgment.
        if let Some(ack) = reply_for(&message, None, self.settings()) {
            self.queue_reply(&ack, from);
            self.metrics.ack_queued();
        }

        let kind = message.kind();
        match message {
            Message::GeneralRequest { delivery, data, .. } => {
                if let Delivery::Reliable { message_id } = delivery {
                    if self.reliability.is_duplicate(session_id, message_id) {
                        self.metrics.duplicate_suppressed();
                        debug!(%session_id, message_id, "Duplicate reliable message suppressed");
                        return Ok(None);
                    }
                    self.reliability.record(session_id, message_id, now);
                }
                self.metrics.payload_accepted();
                Ok(Some(AcceptedPayload {
                    session_id,
                    from,
                    data,
                }))
            }
            Message::Heartbeat { .. } => {
                trace!(%session_id, "Heartbeat");
                Ok(None)
            }
            Message::HandshakeRequest
            | Message::HandshakeResponse { .. }
            | Message::DisconnectNotice { .. }
            | Message::GeneralResponse { .. } => {
                debug!(%session_id, %kind, "Server-bound message needs no handling");
                Ok(None)
            }
        }
    }

    fn accept_handshake(&mut self, request: &Message, from: SocketAddr, now: Instant) {
        let session_id = self.registry.create(from, now);
        self.metrics.session_created();
        info!(%session_id, %from, "Handshake accepted");

        if let Some(response) = reply_for(request, Some(session_id), self.settings()) {
            self.queue_reply(&response, from);
        }
    }

    fn discard(&self, error: ProtocolError, from: SocketAddr) {
        match error {
            ProtocolError::MalformedMessage(_) | ProtocolError::UnknownMessageKind(_) => {
                self.metrics.decode_failed();
                debug!(error = %error, %from, "Discarded undecodable datagram");
            }
            ProtocolError::UnknownSession(session_id) => {
                debug!(%session_id, %from, "Discarded datagram for unknown session");
            }
            other => warn!(error = %other, %from, "Discarded datagram"),
        }
    }

    fn queue_reply(&mut self, message: &Message, target: SocketAddr) {
        if let Err(e) = self.enqueue(message, target) {
            warn!(error = %e, kind = %message.kind(), %target, "Failed to queue reply");
        }
    }

    /// Encode `message` and queue it for `target`
    pub fn enqueue(&mut self, message: &Message, target: SocketAddr) -> Result<()> {
        let bytes = self.codec.encode(message)?;
        if self.outbound.enqueue(bytes, target).is_some() {
            self.metrics.outbound_dropped();
        }
        Ok(())
    }

    /// Queue a fire-and-forget payload to a live session's last known
    /// endpoint
    ///
    /// # Errors
    /// `UnknownSession` if the session is not live.
    pub fn send_unreliable(&mut self, session_id: SessionId, data: Payload) -> Result<()> {
        let endpoint = self
            .registry
            .lookup(session_id)
            .map(Session::endpoint)
            .ok_or(ProtocolError::UnknownSession(session_id))?;

        self.enqueue(
            &Message::GeneralRequest {
                session_id,
                delivery: Delivery::Unreliable,
                data,
            },
            endpoint,
        )
    }

    /// Send everything queued so far
    pub fn flush<T: DatagramTransport>(&mut self, transport: &mut T) -> FlushReport {
        let report = self.outbound.flush(transport, &self.metrics);
        if report.sent + report.failed > 0 {
            trace!(sent = report.sent, failed = report.failed, "Outbound queue flushed");
        }
        report
    }

    pub fn codec(&self) -> &WireCodec {
        &self.codec
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    pub fn reliability(&self) -> &ReliabilityCache {
        &self.reliability
    }

    pub fn outbound(&self) -> &OutboundQueue {
        &self.outbound
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }
}
