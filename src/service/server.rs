//! # Session Server
//!
//! Owns a [`Dispatcher`] and the transport it runs on.
//!
//! The server is driven one cycle at a time ([`SessionServer::poll`]) or by
//! the async [`SessionServer::serve`] loop, which repeats
//! maintenance → drain/route → flush → sleep until told to shut down.
//!
//! ```no_run
//! use tokio::sync::mpsc;
//! use udp_session::config::ServerConfig;
//! use udp_session::service::server::SessionServer;
//!
//! # async fn run() -> udp_session::error::Result<()> {
//! let mut server = SessionServer::new(ServerConfig::default());
//! let local_addr = server.start().await?;
//! println!("listening on {local_addr}");
//!
//! let (_shutdown_tx, shutdown_rx) = mpsc::channel::<()>(1);
//! server
//!     .serve(shutdown_rx, |payloads| {
//!         for payload in payloads {
//!             println!("{}: {}", payload.session_id, payload.data);
//!         }
//!     })
//!     .await
//! # }
//! ```

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, instrument, warn};

use crate::config::ServerConfig;
use crate::core::message::{Message, Payload, SessionId, Settings};
use crate::error::{ProtocolError, Result};
use crate::protocol::dispatcher::{AcceptedPayload, CycleReport, Dispatcher};
use crate::transport::outbound::FlushReport;
use crate::transport::udp::UdpTransport;
use crate::transport::DatagramTransport;
use crate::utils::metrics::Metrics;
use crate::utils::time::{Clock, SystemClock};

/// Session server bound to at most one transport at a time
#[derive(Debug)]
pub struct SessionServer<T: DatagramTransport = UdpTransport, C: Clock = SystemClock> {
    config: ServerConfig,
    dispatcher: Dispatcher<C>,
    transport: Option<T>,
}

impl SessionServer<UdpTransport, SystemClock> {
    pub fn new(config: ServerConfig) -> Self {
        Self::with_clock(config, SystemClock)
    }

    /// Bind a UDP socket to the configured address and start accepting
    /// traffic. Returns the bound address (useful with port 0).
    ///
    /// # Errors
    /// `AlreadyStarted` if a transport is attached, `ConfigError` if the
    /// address does not parse, `Io` if the bind fails.
    #[instrument(skip(self), fields(address = %self.config.address))]
    pub async fn start(&mut self) -> Result<SocketAddr> {
        if self.transport.is_some() {
            return Err(ProtocolError::AlreadyStarted);
        }
        let addr: SocketAddr = self.config.address.parse().map_err(|e| {
            ProtocolError::ConfigError(format!("Invalid server address '{}': {e}", self.config.address))
        })?;
        let transport = UdpTransport::bind(addr, self.config.receive_buffer_size).await?;
        self.attach(transport)
    }
}

impl<T: DatagramTransport, C: Clock> SessionServer<T, C> {
    /// Build a stopped server reading time from `clock`
    pub fn with_clock(config: ServerConfig, clock: C) -> Self {
        let dispatcher = Dispatcher::with_clock(&config, clock);
        Self {
            config,
            dispatcher,
            transport: None,
        }
    }

    /// Start on an already constructed transport
    ///
    /// # Errors
    /// `AlreadyStarted` if a transport is attached, `Io` if the transport
    /// cannot report its local address.
    pub fn attach(&mut self, transport: T) -> Result<SocketAddr> {
        if self.transport.is_some() {
            return Err(ProtocolError::AlreadyStarted);
        }
        let local_addr = transport.local_addr()?;
        self.transport = Some(transport);
        info!(%local_addr, wire_format = self.dispatcher.codec().format().name(), "Session server started");
        Ok(local_addr)
    }

    /// Detach and return the transport. Sessions and dedup records are
    /// kept, and queued replies stay queued.
    pub fn stop(&mut self) -> Option<T> {
        let transport = self.transport.take();
        if transport.is_some() {
            info!(
                session_count = self.session_count(),
                queued = self.dispatcher.outbound().len(),
                "Session server stopped"
            );
        }
        transport
    }

    pub fn is_running(&self) -> bool {
        self.transport.is_some()
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.transport()?.local_addr()?)
    }

    fn transport(&self) -> Result<&T> {
        self.transport.as_ref().ok_or(ProtocolError::NotStarted)
    }

    /// Run one dispatch cycle without flushing
    pub fn run_cycle(&mut self) -> Result<CycleReport> {
        let transport = self.transport.as_mut().ok_or(ProtocolError::NotStarted)?;
        Ok(self.dispatcher.run_cycle(transport))
    }

    /// Send every queued datagram
    pub fn flush(&mut self) -> Result<FlushReport> {
        let transport = self.transport.as_mut().ok_or(ProtocolError::NotStarted)?;
        Ok(self.dispatcher.flush(transport))
    }

    /// One cycle plus flush; returns the payloads accepted
    pub fn poll(&mut self) -> Result<Vec<AcceptedPayload>> {
        let report = self.run_cycle()?;
        self.flush()?;
        Ok(report.payloads)
    }

    /// Encode and send `message` right away, bypassing the outbound queue
    ///
    /// # Errors
    /// `NotStarted`, `SerializeError`, or `Io` if the send fails.
    pub fn send_immediate(&mut self, message: &Message, target: SocketAddr) -> Result<usize> {
        let bytes = self.dispatcher.codec().encode(message)?;
        let transport = self.transport.as_mut().ok_or(ProtocolError::NotStarted)?;
        let metrics = self.dispatcher.metrics();
        match transport.try_send(&bytes, target) {
            Ok(sent) => {
                metrics.datagram_sent(sent as u64);
                debug!(kind = %message.kind(), %target, bytes = sent, "Sent immediately");
                Ok(sent)
            }
            Err(e) => {
                metrics.send_failed();
                warn!(error = %e, kind = %message.kind(), %target, "Immediate send failed");
                Err(e.into())
            }
        }
    }

    /// Queue a fire-and-forget payload for a live session
    pub fn send_unreliable(&mut self, session_id: SessionId, data: Payload) -> Result<()> {
        self.dispatcher.send_unreliable(session_id, data)
    }

    pub fn settings(&self) -> Settings {
        self.dispatcher.settings()
    }

    pub fn session_count(&self) -> usize {
        self.dispatcher.registry().len()
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        self.dispatcher.metrics()
    }

    pub fn dispatcher(&self) -> &Dispatcher<C> {
        &self.dispatcher
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Drive cycles until a shutdown signal arrives, handing each cycle's
    /// accepted payloads to `on_payloads`.
    ///
    /// A closed shutdown channel counts as a signal. The server is stopped
    /// on return.
    ///
    /// # Errors
    /// `NotStarted` if no transport is attached.
    #[instrument(skip_all)]
    pub async fn serve<F>(&mut self, mut shutdown_rx: mpsc::Receiver<()>, mut on_payloads: F) -> Result<()>
    where
        F: FnMut(Vec<AcceptedPayload>),
    {
        let local_addr = self.local_addr()?;
        info!(%local_addr, poll_interval = ?self.config.poll_interval, "Serving");

        loop {
            let report = self.run_cycle()?;
            if let Some(maintenance) = report.maintenance {
                if maintenance.sessions_evicted > 0 {
                    info!(
                        sessions_evicted = maintenance.sessions_evicted,
                        session_count = self.session_count(),
                        "Cleaned up idle sessions"
                    );
                }
            }
            if !report.payloads.is_empty() {
                on_payloads(report.payloads);
            }
            self.flush()?;

            tokio::select! {
                _ = shutdown_rx.recv() => {
                    info!("Shutdown requested");
                    self.metrics().log_metrics();
                    self.stop();
                    return Ok(());
                }
                _ = tokio::time::sleep(self.config.poll_interval) => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;
    use crate::core::codec::WireCodec;
    use crate::core::message::Delivery;
    use crate::transport::memory::MemoryTransport;
    use crate::utils::time::ManualClock;
    use serde_json::json;
    use std::time::Duration;

    fn addr(port: u16) -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], port))
    }

    fn memory_server() -> (SessionServer<MemoryTransport, ManualClock>, MemoryTransport) {
        let network = MemoryTransport::new(addr(5555));
        let mut server = SessionServer::with_clock(ServerConfig::default(), ManualClock::new());
        server.attach(network.clone()).unwrap();
        (server, network)
    }

    fn decode_sent(network: &MemoryTransport) -> Vec<(Message, SocketAddr)> {
        let codec = WireCodec::default();
        network
            .take_sent()
            .into_iter()
            .map(|(bytes, to)| (codec.decode(&bytes, to).unwrap().message, to))
            .collect()
    }

    #[test]
    fn test_operations_require_transport() {
        let mut server: SessionServer<MemoryTransport, ManualClock> =
            SessionServer::with_clock(ServerConfig::default(), ManualClock::new());

        assert!(!server.is_running());
        assert!(matches!(server.run_cycle(), Err(ProtocolError::NotStarted)));
        assert!(matches!(server.flush(), Err(ProtocolError::NotStarted)));
        assert!(matches!(server.poll(), Err(ProtocolError::NotStarted)));
        assert!(matches!(server.local_addr(), Err(ProtocolError::NotStarted)));
        assert!(matches!(
            server.send_immediate(&Message::HandshakeRequest, addr(1)),
            Err(ProtocolError::NotStarted)
        ));
    }

    #[test]
    fn test_attach_twice_fails_and_stop_detaches() {
        let (mut server, network) = memory_server();
        assert!(server.is_running());
        assert!(matches!(
            server.attach(network.clone()),
            Err(ProtocolError::AlreadyStarted)
        ));

        assert!(server.stop().is_some());
        assert!(!server.is_running());
        assert!(server.stop().is_none());
        assert_eq!(server.attach(network).unwrap(), addr(5555));
    }

    #[test]
    fn test_poll_routes_and_flushes() {
        let (mut server, network) = memory_server();
        let codec = WireCodec::default();
        let client = addr(40000);

        network.inject(codec.encode(&Message::HandshakeRequest).unwrap(), client);
        assert!(server.poll().unwrap().is_empty());
        assert_eq!(server.session_count(), 1);

        let sent = decode_sent(&network);
        let id = match sent.as_slice() {
            [(Message::HandshakeResponse { session_id, settings }, to)] => {
                assert_eq!(*to, client);
                assert_eq!(*settings, server.settings());
                *session_id
            }
            other => panic!("unexpected {other:?}"),
        };

        let request = Message::GeneralRequest {
            session_id: id,
            delivery: Delivery::Reliable { message_id: 3 },
            data: json!({"move": [1, 2]}),
        };
        network.inject(codec.encode(&request).unwrap(), client);
        let payloads = server.poll().unwrap();
        assert_eq!(payloads.len(), 1);
        assert_eq!(payloads[0].session_id, id);
        assert_eq!(payloads[0].from, client);
        assert_eq!(payloads[0].data, json!({"move": [1, 2]}));
        assert_eq!(
            decode_sent(&network),
            vec![(
                Message::GeneralResponse {
                    session_id: id,
                    message_id: 3
                },
                client
            )]
        );
    }

    #[test]
    fn test_send_immediate_bypasses_queue() {
        let (mut server, network) = memory_server();

        let notice = Message::DisconnectNotice {
            session_id: SessionId::new(9),
        };
        let sent = server.send_immediate(&notice, addr(40000)).unwrap();
        assert!(sent > 0);
        assert!(server.dispatcher().outbound().is_empty());
        assert_eq!(decode_sent(&network), vec![(notice.clone(), addr(40000))]);

        network.make_unreachable(addr(40001));
        assert!(matches!(
            server.send_immediate(&notice, addr(40001)),
            Err(ProtocolError::Io(_))
        ));
        assert_eq!(server.metrics().snapshot().send_failures, 1);
    }

    #[test]
    fn test_send_unreliable_unknown_session() {
        let (mut server, _network) = memory_server();
        assert!(matches!(
            server.send_unreliable(SessionId::new(1), json!("hi")),
            Err(ProtocolError::UnknownSession(_))
        ));
    }

    #[tokio::test]
    async fn test_serve_runs_until_shutdown() {
        let (mut server, network) = memory_server();
        let codec = WireCodec::default();
        network.inject(codec.encode(&Message::HandshakeRequest).unwrap(), addr(40000));
        network.inject(
            codec
                .encode(&Message::GeneralRequest {
                    session_id: SessionId::new(1),
                    delivery: Delivery::Unreliable,
                    data: json!("hello"),
                })
                .unwrap(),
            addr(40000),
        );

        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>(1);
        shutdown_tx.send(()).await.unwrap();

        let mut delivered = Vec::new();
        tokio::time::timeout(
            Duration::from_secs(5),
            server.serve(shutdown_rx, |payloads| delivered.extend(payloads)),
        )
        .await
        .expect("serve should return after shutdown")
        .unwrap();

        assert!(!server.is_running());
        assert_eq!(delivered.len(), 1);
        assert_eq!(delivered[0].data, json!("hello"));
        // The cycle's replies were flushed before shutting down
        assert_eq!(decode_sent(&network).len(), 1);
    }

    #[tokio::test]
    async fn test_serve_requires_transport() {
        let mut server: SessionServer<MemoryTransport, ManualClock> =
            SessionServer::with_clock(ServerConfig::default(), ManualClock::new());
        let (_tx, rx) = mpsc::channel::<()>(1);
        assert!(matches!(
            server.serve(rx, |_| {}).await,
            Err(ProtocolError::NotStarted)
        ));
    }
}
