// Readiness multiplexer
// The loop's single wait point: listener plus every registered connection

use std::future::poll_fn;
use std::io;
use std::net::SocketAddr;
use std::task::Poll;

use tokio::net::{TcpListener, TcpStream};

use super::connection::{Connection, ConnectionId};
use super::table::ClientTable;

/// What became ready during one wait
#[derive(Debug)]
pub struct Readiness {
    /// Outcome of the single accept performed when the listener was ready
    pub incoming: Option<io::Result<(TcpStream, SocketAddr)>>,
    /// Readable connections as `(slot, id)`, ascending slot order
    pub ready: Vec<(usize, ConnectionId)>,
}

impl Readiness {
    pub fn is_empty(&self) -> bool {
        self.incoming.is_none() && self.ready.is_empty()
    }
}

/// Wait, without a deadline, until the listener or any registered
/// connection is readable.
///
/// The interest set is rebuilt from `table` on every poll, so it always
/// matches the current registry. Interrupted system calls are retried by
/// the runtime; per-source errors are reported as readiness and surface
/// to whichever component services that source.
pub async fn wait(listener: &TcpListener, table: &ClientTable<Connection>) -> Readiness {
    poll_fn(|cx| {
        let incoming = match listener.poll_accept(cx) {
            Poll::Ready(result) => Some(result),
            Poll::Pending => None,
        };

        let mut ready = Vec::new();
        for (slot, id, conn) in table.active() {
            if conn.poll_read_ready(cx).is_ready() {
                ready.push((slot, id));
            }
        }

        let readiness = Readiness { incoming, ready };
        if readiness.is_empty() {
            Poll::Pending
        } else {
            Poll::Ready(readiness)
        }
    })
    .await
}
