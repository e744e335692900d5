//! Reply construction, one arm per message kind.
//!
//! Only two kinds ever get an answer from the server: a handshake request
//! (answered with the identity assigned to it) and a reliable general
//! request (answered with an acknowledgment). Everything else yields `None`.

use crate::core::message::{Delivery, Message, SessionId, Settings};

/// Reply owed for `message`.
///
/// `assigned` is the identity just created for a handshake request; it is
/// ignored for every other kind.
pub fn reply_for(message: &Message, assigned: Option<SessionId>, settings: Settings) -> Option<Message> {
    match message {
        Message::HandshakeRequest => assigned.map(|session_id| Message::HandshakeResponse {
            session_id,
            settings,
        }),
        Message::GeneralRequest {
            session_id,
            delivery: Delivery::Reliable { message_id },
            ..
        } => Some(Message::GeneralResponse {
            session_id: *session_id,
            message_id: *message_id,
        }),
        Message::GeneralRequest {
            delivery: Delivery::Unreliable,
            ..
        }
        | Message::HandshakeResponse { .. }
        | Message::Heartbeat { .. }
        | Message::DisconnectNotice { .. }
        | Message::GeneralResponse { .. } => None,
    }
}

/// Notice sent to the last known endpoint of an evicted session
pub fn disconnect_notice(session_id: SessionId) -> Message {
    Message::DisconnectNotice { session_id }
}
