//! # Service Layer
//!
//! Server lifecycle on top of the dispatcher: start/stop of the socket,
//! single-cycle polling, and the async serve loop.

pub mod server;
