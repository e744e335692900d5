//! UDP transport over a tokio socket.
//!
//! Binding is async, but reads and writes use the socket's `try_*` methods so
//! a dispatch cycle never suspends.

use std::io;
use std::net::SocketAddr;

use bytes::Bytes;
use tokio::net::UdpSocket;
use tracing::{info, instrument};

use super::DatagramTransport;
use crate::config::DEFAULT_RECEIVE_BUFFER_SIZE;

/// UDP socket with a fixed-size receive buffer
#[derive(Debug)]
pub struct UdpTransport {
    socket: UdpSocket,
    recv_buffer: Vec<u8>,
}

impl UdpTransport {
    /// Bind a socket to `addr`, reading at most `receive_buffer_size` bytes
    /// per datagram
    #[instrument]
    pub async fn bind(addr: SocketAddr, receive_buffer_size: usize) -> io::Result<Self> {
        let socket = UdpSocket::bind(addr).await?;
        info!(local_addr = %socket.local_addr()?, "UDP socket bound");
        Ok(Self::from_socket(socket, receive_buffer_size))
    }

    /// Bind with the default receive buffer size
    pub async fn bind_default(addr: SocketAddr) -> io::Result<Self> {
        Self::bind(addr, DEFAULT_RECEIVE_BUFFER_SIZE).await
    }

    /// Wrap an already bound socket
    pub fn from_socket(socket: UdpSocket, receive_buffer_size: usize) -> Self {
        Self {
            socket,
            recv_buffer: vec![0u8; receive_buffer_size],
        }
    }

    /// Receive buffer size in bytes
    pub fn receive_buffer_size(&self) -> usize {
        self.recv_buffer.len()
    }

    /// Get a reference to the underlying socket.
    pub fn inner(&self) -> &UdpSocket {
        &self.socket
    }
}

impl DatagramTransport for UdpTransport {
    fn try_recv(&mut self) -> io::Result<Option<(Bytes, SocketAddr)>> {
        match self.socket.try_recv_from(&mut self.recv_buffer) {
            Ok((len, from)) => Ok(Some((Bytes::copy_from_slice(&self.recv_buffer[..len]), from))),
            Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn try_send(&mut self, datagram: &[u8], target: SocketAddr) -> io::Result<usize> {
        self.socket.try_send_to(datagram, target)
    }

    fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }
}
