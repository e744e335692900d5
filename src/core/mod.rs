//! # Core Protocol Components
//!
//! Message model and wire encoding.
//!
//! ## Components
//! - **Message**: closed enum over the six transport message kinds
//! - **Codec**: encode/decode between messages and datagram bytes
//! - **Serialization**: the self-describing wire formats (JSON, MessagePack)
//!
//! ## Wire Format
//! ```text
//! {"type": <kind>, "response": <bool>, "id": <session>, ...kind-specific fields}
//! ```
//!
//! The sender's endpoint is transport metadata and never appears in the
//! encoded map.

pub mod codec;
pub mod message;
pub mod serialization;
