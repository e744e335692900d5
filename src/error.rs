//! # Error Types
//!
//! Error handling for the session layer.
//!
//! Most failures on the receive path are not fatal: a datagram that cannot be
//! decoded, or that names a session the server does not know, is discarded
//! without a reply. The variants below still exist so that the discard can be
//! logged and counted, and so that the public API can report them to callers
//! who ask for something explicitly (e.g. sending to an evicted session).
//!
//! ## Error Categories
//! - **Decode Errors**: `MalformedMessage`, `UnknownMessageKind`
//! - **Routing Errors**: `UnknownSession`
//! - **Transport Errors**: I/O failures other than would-block
//! - **Lifecycle Errors**: using the server before `start` or starting it twice
//! - **Configuration Errors**: invalid or unreadable configuration
//!
//! ## Example Usage
//! ```rust
//! use udp_session::core::codec::WireCodec;
//! use udp_session::error::ProtocolError;
//!
//! let codec = WireCodec::default();
//! let from = "127.0.0.1:4000".parse().unwrap();
//! match codec.decode(br#"{"type":"rtt","response":false}"#, from) {
//!     Err(ProtocolError::UnknownMessageKind(kind)) => assert_eq!(kind, "rtt"),
//!     other => panic!("unexpected: {other:?}"),
//! }
//! ```

use crate::core::message::SessionId;
use std::io;
use thiserror::Error;

/// Error message constants to reduce allocations in error paths.
pub mod constants {
    /// Decode errors
    pub const ERR_MISSING_TYPE: &str = "missing field `type`";
    pub const ERR_MISSING_RESPONSE: &str = "missing field `response`";
    pub const ERR_MISSING_ID: &str = "missing field `id`";
    pub const ERR_MISSING_SETTINGS: &str = "missing field `settings`";
    pub const ERR_MISSING_RELIABLE: &str = "missing field `reliable`";
    pub const ERR_MISSING_MESSAGE_ID: &str = "missing field `messageId`";
    pub const ERR_MISSING_DATA: &str = "missing field `data`";

    /// Logging setup
    pub const ERR_SUBSCRIBER_INSTALLED: &str = "A global tracing subscriber is already installed";
}

// ProtocolError is the primary error type for all session-layer operations
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Malformed message: {0}")]
    MalformedMessage(String),

    #[error("Unknown message kind: {0}")]
    UnknownMessageKind(String),

    #[error("Unknown session: {0}")]
    UnknownSession(SessionId),

    #[error("Serialize error: {0}")]
    SerializeError(String),

    #[error("Server is not started")]
    NotStarted,

    #[error("Server is already started")]
    AlreadyStarted,

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Type alias for Results using ProtocolError
pub type Result<T> = std::result::Result<T, ProtocolError>;
