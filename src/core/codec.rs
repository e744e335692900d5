//! # Wire Codec
//!
//! Converts between [`Message`] and its serialized datagram form.
//!
//! On the wire every message is a flat map of optional fields. Decoding first
//! reads that map, then picks the variant from `type` (and `response` where a
//! name is shared by request and response) and checks that the fields the
//! variant needs are present.
//!
//! ```text
//! {"type":"general","response":false,"id":1,"reliable":true,"messageId":1,"data":"x"}
//! ```

use crate::core::message::{Delivery, Message, MessageId, Payload, SessionId, Settings};
use crate::core::serialization::WireFormat;
use crate::error::{constants, ProtocolError, Result};
use bytes::Bytes;
use serde::{Deserialize, Deserializer, Serialize};
use std::net::SocketAddr;
use tracing::trace;

/// A decoded message together with the endpoint it arrived from.
#[derive(Debug, Clone, PartialEq)]
pub struct Received {
    pub message: Message,
    pub from: SocketAddr,
}

/// Flat wire representation shared by every kind.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct Envelope {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<SessionId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reliable: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    message_id: Option<MessageId>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        deserialize_with = "present_payload"
    )]
    data: Option<Payload>,
    #[serde(skip_serializing_if = "Option::is_none")]
    settings: Option<Settings>,
}

impl Envelope {
    fn header(message: &Message) -> Self {
        let kind = message.kind();
        Self {
            kind: Some(kind.wire_name().to_string()),
            response: Some(kind.is_response()),
            ..Self::default()
        }
    }
}

/// A `data` key that is present is a payload, even when it holds `null`.
/// Only a missing key leaves the field `None`.
fn present_payload<'de, D>(deserializer: D) -> std::result::Result<Option<Payload>, D::Error>
where
    D: Deserializer<'de>,
{
    Payload::deserialize(deserializer).map(Some)
}

fn require<T>(field: Option<T>, missing: &'static str) -> Result<T> {
    field.ok_or_else(|| ProtocolError::MalformedMessage(missing.to_string()))
}

impl From<&Message> for Envelope {
    fn from(message: &Message) -> Self {
        let header = Envelope::header(message);
        match message {
            Message::HandshakeRequest => header,
            Message::HandshakeResponse {
                session_id,
                settings,
            } => Envelope {
                id: Some(*session_id),
                settings: Some(*settings),
                ..header
            },
            Message::Heartbeat { session_id } | Message::DisconnectNotice { session_id } => {
                Envelope {
                    id: Some(*session_id),
                    ..header
                }
            }
            Message::GeneralRequest {
                session_id,
                delivery,
                data,
            } => Envelope {
                id: Some(*session_id),
                reliable: Some(delivery.is_reliable()),
                message_id: delivery.message_id(),
                data: Some(data.clone()),
                ..header
            },
            Message::GeneralResponse {
                session_id,
                message_id,
            } => Envelope {
                id: Some(*session_id),
                reliable: Some(true),
                message_id: Some(*message_id),
                ..header
            },
        }
    }
}

impl TryFrom<Envelope> for Message {
    type Error = ProtocolError;

    fn try_from(envelope: Envelope) -> Result<Self> {
        let kind = require(envelope.kind, constants::ERR_MISSING_TYPE)?;
        // `response` only selects the variant for kinds shared by a request
        // and its reply
        let response = envelope.response;
        let response = move || require(response, constants::ERR_MISSING_RESPONSE);

        match kind.as_str() {
            "handshake" if !response()? => Ok(Message::HandshakeRequest),
            "handshake" => Ok(Message::HandshakeResponse {
                session_id: require(envelope.id, constants::ERR_MISSING_ID)?,
                settings: require(envelope.settings, constants::ERR_MISSING_SETTINGS)?,
            }),
            "heartbeat" => Ok(Message::Heartbeat {
                session_id: require(envelope.id, constants::ERR_MISSING_ID)?,
            }),
            "disconnectNotice" => Ok(Message::DisconnectNotice {
                session_id: require(envelope.id, constants::ERR_MISSING_ID)?,
            }),
            "general" if !response()? => {
                let session_id = require(envelope.id, constants::ERR_MISSING_ID)?;
                let delivery = if require(envelope.reliable, constants::ERR_MISSING_RELIABLE)? {
                    Delivery::Reliable {
                        message_id: require(envelope.message_id, constants::ERR_MISSING_MESSAGE_ID)?,
                    }
                } else {
                    Delivery::Unreliable
                };
                Ok(Message::GeneralRequest {
                    session_id,
                    delivery,
                    data: require(envelope.data, constants::ERR_MISSING_DATA)?,
                })
            }
            "general" => Ok(Message::GeneralResponse {
                session_id: require(envelope.id, constants::ERR_MISSING_ID)?,
                message_id: require(envelope.message_id, constants::ERR_MISSING_MESSAGE_ID)?,
            }),
            other => Err(ProtocolError::UnknownMessageKind(other.to_string())),
        }
    }
}

/// Stateless encoder/decoder bound to one [`WireFormat`].
#[derive(Debug, Clone, Copy, Default)]
pub struct WireCodec {
    format: WireFormat,
}

impl WireCodec {
    pub fn new(format: WireFormat) -> Self {
        Self { format }
    }

    pub fn format(&self) -> WireFormat {
        self.format
    }

    /// Serialize a message. The endpoint is never part of the encoding.
    pub fn encode(&self, message: &Message) -> Result<Bytes> {
        let bytes = self.format.to_vec(&Envelope::from(message))?;
        Ok(Bytes::from(bytes))
    }

    /// Parse a datagram received from `from`.
    ///
    /// # Errors
    /// `MalformedMessage` if the bytes are not a well-formed map or a field
    /// the decoded kind needs is absent; `UnknownMessageKind` if `type` names
    /// a kind this layer does not speak.
    pub fn decode(&self, bytes: &[u8], from: SocketAddr) -> Result<Received> {
        let envelope: Envelope = self.format.from_slice(bytes)?;
        let message = Message::try_from(envelope)?;
        trace!(kind = %message.kind(), %from, "Decoded datagram");
        Ok(Received { message, from })
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;
    use serde_json::json;

    fn from() -> SocketAddr {
        "127.0.0.1:40000".parse().unwrap()
    }

    fn every_kind() -> Vec<Message> {
        vec![
            Message::HandshakeRequest,
            Message::HandshakeResponse {
                session_id: SessionId::new(1),
                settings: Settings {
                    session_timeout: 5.0,
                },
            },
            Message::Heartbeat {
                session_id: SessionId::new(2),
            },
            Message::DisconnectNotice {
                session_id: SessionId::new(3),
            },
            Message::GeneralRequest {
                session_id: SessionId::new(4),
                delivery: Delivery::Reliable { message_id: 11 },
                data: json!({"move": [1, 2]}),
            },
            Message::GeneralRequest {
                session_id: SessionId::new(4),
                delivery: Delivery::Unreliable,
                data: json!("some data"),
            },
            Message::GeneralResponse {
                session_id: SessionId::new(5),
                message_id: 11,
            },
        ]
    }

    #[test]
    fn test_every_kind_survives_both_formats() {
        for format in [WireFormat::Json, WireFormat::MessagePack] {
            let codec = WireCodec::new(format);
            for message in every_kind() {
                let bytes = codec.encode(&message).expect("encode");
                let received = codec.decode(&bytes, from()).expect("decode");
                assert_eq!(received.message, message, "format {}", format.name());
                assert_eq!(received.from, from());
            }
        }
    }

    #[test]
    fn test_json_field_names() {
        let codec = WireCodec::default();
        let bytes = codec
            .encode(&Message::GeneralRequest {
                session_id: SessionId::new(1),
                delivery: Delivery::Reliable { message_id: 1 },
                data: json!("x"),
            })
            .unwrap();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "general",
                "response": false,
                "id": 1,
                "reliable": true,
                "messageId": 1,
                "data": "x"
            })
        );
    }

    #[test]
    fn test_unreliable_request_omits_message_id() {
        let codec = WireCodec::default();
        let bytes = codec
            .encode(&Message::GeneralRequest {
                session_id: SessionId::new(1),
                delivery: Delivery::Unreliable,
                data: json!(1),
            })
            .unwrap();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert!(value.get("messageId").is_none());
        assert_eq!(value["reliable"], json!(false));
    }

    #[test]
    fn test_handshake_request_ignores_extra_fields() {
        let codec = WireCodec::default();
        let raw = br#"{"type":"handshake","data":"this should be empty","response":false}"#;
        let received = codec.decode(raw, from()).unwrap();
        assert_eq!(received.message, Message::HandshakeRequest);
    }

    #[test]
    fn test_missing_required_fields_are_malformed() {
        let codec = WireCodec::default();
        let cases: &[&[u8]] = &[
            br#"{"response":false}"#,
            br#"{"type":"heartbeat"}"#,
            br#"{"type":"heartbeat","response":true}"#,
            br#"{"type":"handshake","response":true,"id":1}"#,
            br#"{"type":"general","response":false,"id":1,"data":"x"}"#,
            br#"{"type":"general","response":false,"id":1,"reliable":true,"data":"x"}"#,
            br#"{"type":"general","response":false,"id":1,"reliable":false}"#,
            br#"{"type":"general","response":true,"id":1}"#,
        ];
        for raw in cases {
            let result = codec.decode(raw, from());
            assert!(
                matches!(result, Err(ProtocolError::MalformedMessage(_))),
                "expected malformed for {}: {result:?}",
                String::from_utf8_lossy(raw)
            );
        }
    }

    #[test]
    fn test_not_well_formed_is_malformed() {
        let codec = WireCodec::default();
        for raw in [&b""[..], b"\xff\xfe", b"[1,2,3]", b"{\"type\":"] {
            assert!(matches!(
                codec.decode(raw, from()),
                Err(ProtocolError::MalformedMessage(_))
            ));
        }
    }

    #[test]
    fn test_wrong_field_type_is_malformed() {
        let codec = WireCodec::default();
        let raw = br#"{"type":"heartbeat","response":true,"id":"one"}"#;
        assert!(matches!(
            codec.decode(raw, from()),
            Err(ProtocolError::MalformedMessage(_))
        ));
    }

    #[test]
    fn test_unknown_kind() {
        let codec = WireCodec::default();
        let raw = br#"{"type":"rtt","id":1,"response":false}"#;
        match codec.decode(raw, from()) {
            Err(ProtocolError::UnknownMessageKind(kind)) => assert_eq!(kind, "rtt"),
            other => panic!("expected unknown kind, got {other:?}"),
        }
    }

    #[test]
    fn test_unknown_kind_without_response_flag() {
        let codec = WireCodec::default();
        match codec.decode(br#"{"type":"rtt","id":1}"#, from()) {
            Err(ProtocolError::UnknownMessageKind(kind)) => assert_eq!(kind, "rtt"),
            other => panic!("expected unknown kind, got {other:?}"),
        }
    }

    #[test]
    fn test_response_flag_only_required_where_it_selects_the_variant() {
        let codec = WireCodec::default();
        let heartbeat = codec.decode(br#"{"type":"heartbeat","id":3}"#, from()).unwrap();
        assert_eq!(
            heartbeat.message,
            Message::Heartbeat {
                session_id: SessionId::new(3)
            }
        );
        let notice = codec
            .decode(br#"{"type":"disconnectNotice","id":3}"#, from())
            .unwrap();
        assert_eq!(
            notice.message,
            Message::DisconnectNotice {
                session_id: SessionId::new(3)
            }
        );

        for raw in [
            &br#"{"type":"handshake"}"#[..],
            br#"{"type":"general","id":1,"reliable":false,"data":"x"}"#,
        ] {
            assert!(matches!(
                codec.decode(raw, from()),
                Err(ProtocolError::MalformedMessage(_))
            ));
        }
    }

    #[test]
    fn test_null_payload_survives_both_formats() {
        for format in [WireFormat::Json, WireFormat::MessagePack] {
            let codec = WireCodec::new(format);
            for delivery in [Delivery::Unreliable, Delivery::Reliable { message_id: 7 }] {
                let message = Message::GeneralRequest {
                    session_id: SessionId::new(1),
                    delivery,
                    data: serde_json::Value::Null,
                };
                let bytes = codec.encode(&message).expect("encode");
                let received = codec.decode(&bytes, from()).expect("decode");
                assert_eq!(received.message, message, "format {}", format.name());
            }
        }
    }

    #[test]
    fn test_explicit_null_data_is_a_payload() {
        let codec = WireCodec::default();
        let raw = br#"{"type":"general","response":false,"id":1,"reliable":false,"data":null}"#;
        let received = codec.decode(raw, from()).unwrap();
        assert_eq!(
            received.message,
            Message::GeneralRequest {
                session_id: SessionId::new(1),
                delivery: Delivery::Unreliable,
                data: serde_json::Value::Null,
            }
        );
    }

    #[test]
    fn test_unreliable_request_tolerates_stray_message_id() {
        let codec = WireCodec::default();
        let raw = br#"{"type":"general","response":false,"id":2,"reliable":false,"messageId":null,"data":"d"}"#;
        let received = codec.decode(raw, from()).unwrap();
        assert_eq!(
            received.message,
            Message::GeneralRequest {
                session_id: SessionId::new(2),
                delivery: Delivery::Unreliable,
                data: json!("d"),
            }
        );
    }
}
