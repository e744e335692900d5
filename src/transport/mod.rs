//! # Transport Layer
//!
//! The session layer sits on a connectionless datagram transport that it
//! only ever uses without blocking:
//!
//! - reading returns the next datagram or "nothing pending right now"
//! - sending is best-effort and may fail per datagram
//!
//! ## Implementations
//! - **UDP**: [`udp::UdpTransport`] over a tokio `UdpSocket`
//! - **Memory**: [`memory::MemoryTransport`] for tests and simulations
//!
//! The [`outbound::OutboundQueue`] buffers encoded replies between flushes.

pub mod memory;
pub mod outbound;
pub mod udp;

use bytes::Bytes;
use std::io;
use std::net::SocketAddr;

/// Non-blocking datagram transport
pub trait DatagramTransport {
    /// Read one pending datagram.
    ///
    /// Returns `Ok(None)` when nothing is immediately available (would-block).
    fn try_recv(&mut self) -> io::Result<Option<(Bytes, SocketAddr)>>;

    /// Send one datagram to `target` without waiting.
    fn try_send(&mut self, datagram: &[u8], target: SocketAddr) -> io::Result<usize>;

    /// Address the transport is bound to.
    fn local_addr(&self) -> io::Result<SocketAddr>;
}
