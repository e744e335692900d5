//! Typed transport messages.
//!
//! A [`Message`] is a closed enum over the six kinds the session layer
//! speaks. The sender's network endpoint is never part of a message; it
//! travels next to it (see [`crate::core::codec::Received`]).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Opaque application payload carried by general messages.
pub type Payload = serde_json::Value;

/// Per-session sequence number of a reliable message.
pub type MessageId = u64;

/// Server-assigned session identity.
///
/// Allocated by [`crate::protocol::registry::SessionRegistry`], starting at 1
/// and never reused for the lifetime of the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(u64);

impl SessionId {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for SessionId {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

/// Delivery mode of a general request.
///
/// The sequence number only exists for reliable delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Unreliable,
    Reliable { message_id: MessageId },
}

impl Delivery {
    pub fn is_reliable(&self) -> bool {
        matches!(self, Delivery::Reliable { .. })
    }

    pub fn message_id(&self) -> Option<MessageId> {
        match self {
            Delivery::Unreliable => None,
            Delivery::Reliable { message_id } => Some(*message_id),
        }
    }
}

/// Settings echoed to a client in the handshake response.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Seconds of silence after which the server evicts the session
    #[serde(rename = "sessionTimeout")]
    pub session_timeout: f64,
}

impl Settings {
    pub fn new(session_timeout: Duration) -> Self {
        Self {
            session_timeout: session_timeout.as_secs_f64(),
        }
    }
}

/// Discriminant of a [`Message`], also the value of the wire `type` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    HandshakeRequest,
    HandshakeResponse,
    Heartbeat,
    DisconnectNotice,
    GeneralRequest,
    GeneralResponse,
}

impl MessageKind {
    /// Wire name of the kind. Request and response share a name and are
    /// told apart by the `response` flag.
    pub fn wire_name(self) -> &'static str {
        match self {
            MessageKind::HandshakeRequest | MessageKind::HandshakeResponse => "handshake",
            MessageKind::Heartbeat => "heartbeat",
            MessageKind::DisconnectNotice => "disconnectNotice",
            MessageKind::GeneralRequest | MessageKind::GeneralResponse => "general",
        }
    }

    pub fn is_response(self) -> bool {
        match self {
            MessageKind::HandshakeResponse
            | MessageKind::Heartbeat
            | MessageKind::GeneralResponse => true,
            MessageKind::HandshakeRequest
            | MessageKind::DisconnectNotice
            | MessageKind::GeneralRequest => false,
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MessageKind::HandshakeRequest => "handshake-request",
            MessageKind::HandshakeResponse => "handshake-response",
            MessageKind::Heartbeat => "heartbeat",
            MessageKind::DisconnectNotice => "disconnect-notice",
            MessageKind::GeneralRequest => "general-request",
            MessageKind::GeneralResponse => "general-response",
        };
        f.write_str(name)
    }
}

/// A decoded transport message.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    /// Client asks for an identity. Carries nothing.
    HandshakeRequest,
    /// Server hands out an identity together with its settings.
    HandshakeResponse {
        session_id: SessionId,
        settings: Settings,
    },
    /// Client liveness signal.
    Heartbeat { session_id: SessionId },
    /// Server tells a client its session was evicted.
    DisconnectNotice { session_id: SessionId },
    /// Application payload, reliable or not.
    GeneralRequest {
        session_id: SessionId,
        delivery: Delivery,
        data: Payload,
    },
    /// Acknowledgment of a reliable general request.
    GeneralResponse {
        session_id: SessionId,
        message_id: MessageId,
    },
}

impl Message {
    pub fn kind(&self) -> MessageKind {
        match self {
            Message::HandshakeRequest => MessageKind::HandshakeRequest,
            Message::HandshakeResponse { .. } => MessageKind::HandshakeResponse,
            Message::Heartbeat { .. } => MessageKind::Heartbeat,
            Message::DisconnectNotice { .. } => MessageKind::DisconnectNotice,
            Message::GeneralRequest { .. } => MessageKind::GeneralRequest,
            Message::GeneralResponse { .. } => MessageKind::GeneralResponse,
        }
    }

    /// Identity the message declares, if its kind carries one.
    pub fn session_id(&self) -> Option<SessionId> {
        match self {
            Message::HandshakeRequest => None,
            Message::HandshakeResponse { session_id, .. }
            | Message::Heartbeat { session_id }
            | Message::DisconnectNotice { session_id }
            | Message::GeneralRequest { session_id, .. }
            | Message::GeneralResponse { session_id, .. } => Some(*session_id),
        }
    }

    pub fn is_response(&self) -> bool {
        self.kind().is_response()
    }
}
