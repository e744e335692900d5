//! # Session Protocol
//!
//! Session lifecycle and reliable delivery on top of the wire codec.
//!
//! ## Components
//! - **Registry**: live sessions, identity allocation, timeout eviction
//! - **Reply**: which reply, if any, each message kind gets
//! - **Dispatcher**: the per-cycle maintenance, drain, and routing loop
//!
//! ## Guarantees
//! - Session identities are unique and strictly increasing
//! - A reliable payload is delivered to the application at most once while
//!   its dedup record is retained, and acknowledged every time it arrives
//! - Unknown or undecodable traffic changes no state and gets no reply

pub mod dispatcher;
pub mod registry;
pub mod reply;
