//! # udp-session
//!
//! A lightweight session and reliability layer over connectionless UDP.
//!
//! Clients obtain a server-assigned identity through a handshake, then send
//! unreliable (fire-and-forget) or reliable (acknowledged, de-duplicated)
//! payloads. Sessions that stay silent longer than the configured timeout
//! are evicted and sent a disconnect notice.
//!
//! ## Layout
//! - [`core`]: message model and wire codec
//! - [`protocol`]: session registry, reply rules, dispatch cycle
//! - [`transport`]: non-blocking datagram transports and the outbound queue
//! - [`service`]: the server lifecycle and serve loop
//! - [`utils`]: clocks, dedup records, metrics, logging
//! - [`config`], [`error`]
//!
//! ## Quick start
//! ```no_run
//! use udp_session::{NetworkConfig, SessionServer};
//!
//! # async fn run() -> udp_session::Result<()> {
//! let config = NetworkConfig::from_env()?;
//! config.validate_strict()?;
//!
//! let mut server = SessionServer::new(config.server);
//! server.start().await?;
//! loop {
//!     for payload in server.poll()? {
//!         println!("{} sent {}", payload.session_id, payload.data);
//!     }
//!     tokio::time::sleep(server.config().poll_interval).await;
//! }
//! # }
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod protocol;
pub mod service;
pub mod transport;
pub mod utils;

pub use crate::config::{LoggingConfig, NetworkConfig, ServerConfig};
pub use crate::core::codec::WireCodec;
pub use crate::core::message::{Delivery, Message, MessageId, MessageKind, Payload, SessionId, Settings};
pub use crate::core::serialization::WireFormat;
pub use crate::error::{ProtocolError, Result};
pub use crate::protocol::dispatcher::{AcceptedPayload, CycleReport, Dispatcher, MaintenanceReport};
pub use crate::service::server::SessionServer;
pub use crate::transport::DatagramTransport;
