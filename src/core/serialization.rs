//! # Wire Formats
//!
//! Both supported encodings are self-describing field-name/value maps, so a
//! peer can decode a datagram without knowing its kind in advance.
//!
//! - **JSON** (default): UTF-8 text, interoperable with scripting clients
//! - **MessagePack**: compact binary, structs written as named maps
//!
//! The format is a server-wide setting; datagrams carry no format marker.

use crate::error::{ProtocolError, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Supported serialization formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WireFormat {
    /// Human-readable JSON
    #[default]
    Json,
    /// MessagePack with named fields
    #[serde(rename = "msgpack")]
    MessagePack,
}

impl WireFormat {
    /// Get human-readable name
    pub fn name(self) -> &'static str {
        match self {
            WireFormat::Json => "JSON",
            WireFormat::MessagePack => "MessagePack",
        }
    }

    /// Serialize a value as a field-name/value map
    pub fn to_vec<T: Serialize>(self, value: &T) -> Result<Vec<u8>> {
        match self {
            WireFormat::Json => serde_json::to_vec(value)
                .map_err(|e| ProtocolError::SerializeError(e.to_string())),
            WireFormat::MessagePack => rmp_serde::to_vec_named(value)
                .map_err(|e| ProtocolError::SerializeError(e.to_string())),
        }
    }

    /// Deserialize a value; any parse failure is a malformed message
    pub fn from_slice<T: DeserializeOwned>(self, data: &[u8]) -> Result<T> {
        match self {
            WireFormat::Json => serde_json::from_slice(data)
                .map_err(|e| ProtocolError::MalformedMessage(e.to_string())),
            WireFormat::MessagePack => rmp_serde::from_slice(data)
                .map_err(|e| ProtocolError::MalformedMessage(e.to_string())),
        }
    }
}
