// Connection module
// An accepted TCP stream plus the identity the relay tracks it by

use std::fmt;
use std::io;
use std::net::SocketAddr;
use std::task::{Context, Poll};

use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

/// Process-unique connection identifier, assigned in accept order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Hands out increasing ids; never reuses one
#[derive(Debug)]
pub struct IdAllocator {
    next: u64,
}

impl IdAllocator {
    pub const fn new() -> Self {
        Self { next: 1 }
    }

    pub fn allocate(&mut self) -> ConnectionId {
        let id = ConnectionId::new(self.next);
        self.next += 1;
        id
    }
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

/// An accepted client stream
#[derive(Debug)]
pub struct Connection {
    id: ConnectionId,
    peer_addr: SocketAddr,
    stream: TcpStream,
}

impl Connection {
    pub const fn new(id: ConnectionId, stream: TcpStream, peer_addr: SocketAddr) -> Self {
        Self {
            id,
            peer_addr,
            stream,
        }
    }

    pub const fn id(&self) -> ConnectionId {
        self.id
    }

    pub const fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    /// Register interest in read readiness with the current task.
    /// An error counts as ready so the next read reports it.
    pub fn poll_read_ready(&self, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        self.stream.poll_read_ready(cx)
    }

    /// One non-blocking read into `buf`.
    ///
    /// `Ok(0)` means the peer closed its write side. `WouldBlock` means the
    /// readiness that led here was spurious.
    pub fn read_chunk(&self, buf: &mut [u8]) -> io::Result<usize> {
        self.stream.try_read(buf)
    }

    /// Send every byte of `payload`, waiting for socket space as needed
    pub async fn send(&mut self, payload: &[u8]) -> io::Result<()> {
        self.stream.write_all(payload).await
    }

    /// Send FIN and release the socket
    pub async fn close(mut self) {
        let _ = self.stream.shutdown().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_monotonic_and_unique() {
        let mut ids = IdAllocator::new();
        let a = ids.allocate();
        let b = ids.allocate();
        assert_eq!(a, ConnectionId::new(1));
        assert!(b > a);
        assert_eq!(b.to_string(), "#2");
    }
}
