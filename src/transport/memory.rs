//! In-process datagram transport.
//!
//! Stands in for a UDP socket in tests and simulations. Clones share the
//! same queues, so a test keeps one handle to inject datagrams and inspect
//! what the server sent while the server owns another.

use std::collections::{HashSet, VecDeque};
use std::io;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bytes::Bytes;

use super::DatagramTransport;

#[derive(Debug)]
enum Inbound {
    Datagram(Bytes, SocketAddr),
    Failure(io::ErrorKind),
}

#[derive(Debug)]
struct MemoryInner {
    local_addr: SocketAddr,
    inbound: VecDeque<Inbound>,
    sent: Vec<(Bytes, SocketAddr)>,
    unreachable: HashSet<SocketAddr>,
}

/// Shared-queue transport with failure injection
#[derive(Debug, Clone)]
pub struct MemoryTransport {
    inner: Arc<Mutex<MemoryInner>>,
}

impl MemoryTransport {
    pub fn new(local_addr: SocketAddr) -> Self {
        Self {
            inner: Arc::new(Mutex::new(MemoryInner {
                local_addr,
                inbound: VecDeque::new(),
                sent: Vec::new(),
                unreachable: HashSet::new(),
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MemoryInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue a datagram as if it arrived from `from`
    pub fn inject(&self, datagram: impl Into<Bytes>, from: SocketAddr) {
        self.lock()
            .inbound
            .push_back(Inbound::Datagram(datagram.into(), from));
    }

    /// Datagrams and failures waiting to be read
    pub fn pending(&self) -> usize {
        self.lock().inbound.len()
    }

    /// Take everything sent so far, in send order
    pub fn take_sent(&self) -> Vec<(Bytes, SocketAddr)> {
        std::mem::take(&mut self.lock().sent)
    }

    /// Make every send to `target` fail
    pub fn make_unreachable(&self, target: SocketAddr) {
        self.lock().unreachable.insert(target);
    }

    /// Queue a read failure behind the datagrams injected so far
    pub fn inject_read_error(&self, kind: io::ErrorKind) {
        self.lock().inbound.push_back(Inbound::Failure(kind));
    }
}

impl DatagramTransport for MemoryTransport {
    fn try_recv(&mut self) -> io::Result<Option<(Bytes, SocketAddr)>> {
        match self.lock().inbound.pop_front() {
            Some(Inbound::Datagram(bytes, from)) => Ok(Some((bytes, from))),
            Some(Inbound::Failure(kind)) => Err(io::Error::new(kind, "injected read failure")),
            None => Ok(None),
        }
    }

    fn try_send(&mut self, datagram: &[u8], target: SocketAddr) -> io::Result<usize> {
        let mut inner = self.lock();
        if inner.unreachable.contains(&target) {
            return Err(io::Error::new(
                io::ErrorKind::ConnectionRefused,
                "injected send failure",
            ));
        }
        inner.sent.push((Bytes::copy_from_slice(datagram), target));
        Ok(datagram.len())
    }

    fn local_addr(&self) -> io::Result<SocketAddr> {
        Ok(self.lock().local_addr)
    }
}
