// Connection acceptor
// Registers accepted streams, sends the welcome, applies the overflow policy

use std::collections::VecDeque;
use std::io;
use std::net::SocketAddr;

use tokio::net::TcpStream;

use super::connection::{Connection, IdAllocator};
use super::stats::RelayStats;
use super::table::{ClientTable, InsertError};
use crate::config::{OverflowPolicy, RelayConfig};
use crate::logger::{self, EventKind, RelayEvent};

/// Sent to every connection the moment it gets a slot
pub const WELCOME_MESSAGE: &[u8] = b"Welcome to the server!\n";

/// Turns listener readiness into registered, welcomed connections
#[derive(Debug)]
pub struct ConnectionAcceptor {
    ids: IdAllocator,
    on_full: OverflowPolicy,
    queue_limit: usize,
    /// Accepted but not yet registered, oldest first
    pending: VecDeque<Connection>,
}

impl ConnectionAcceptor {
    pub fn new(config: &RelayConfig) -> Self {
        Self {
            ids: IdAllocator::new(),
            on_full: config.on_full,
            queue_limit: config.queue_limit,
            pending: VecDeque::new(),
        }
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Handle the result of the one accept performed this iteration
    pub async fn handle(
        &mut self,
        incoming: io::Result<(TcpStream, SocketAddr)>,
        table: &mut ClientTable<Connection>,
        stats: &mut RelayStats,
    ) {
        let (stream, peer_addr) = match incoming {
            Ok(accepted) => accepted,
            Err(e) => {
                logger::log_event(&RelayEvent::new(EventKind::AcceptError).detail(e.to_string()));
                return;
            }
        };

        stats.accepted += 1;
        let conn = Connection::new(self.ids.allocate(), stream, peer_addr);
        logger::log_event(
            &RelayEvent::new(EventKind::Connected)
                .connection(conn.id())
                .peer(peer_addr),
        );

        if let Some(overflow) = register(conn, table).await {
            self.overflow(overflow, table.capacity(), stats);
        }
    }

    /// Move parked connections into free slots, oldest first
    pub async fn admit_pending(&mut self, table: &mut ClientTable<Connection>) {
        while !table.is_full() {
            let Some(conn) = self.pending.pop_front() else {
                break;
            };
            logger::log_event(
                &RelayEvent::new(EventKind::Admitted)
                    .connection(conn.id())
                    .peer(conn.peer_addr())
                    .detail(format!("{} still waiting", self.pending_len())),
            );
            if let Some(conn) = register(conn, table).await {
                self.pending.push_front(conn);
                break;
            }
        }
    }

    /// Give up every parked connection, oldest first
    pub fn drain_pending(&mut self) -> Vec<Connection> {
        self.pending.drain(..).collect()
    }

    fn overflow(&mut self, conn: Connection, capacity: usize, stats: &mut RelayStats) {
        logger::log_event(
            &RelayEvent::new(EventKind::CapacityReached)
                .connection(conn.id())
                .peer(conn.peer_addr())
                .detail(format!("all {capacity} slots in use")),
        );

        match self.on_full {
            OverflowPolicy::Queue if self.pending.len() < self.queue_limit => {
                stats.queued += 1;
                logger::log_event(
                    &RelayEvent::new(EventKind::Queued)
                        .connection(conn.id())
                        .peer(conn.peer_addr())
                        .detail(format!("position {}", self.pending.len() + 1)),
                );
                self.pending.push_back(conn);
            }
            OverflowPolicy::Queue | OverflowPolicy::Reject => {
                stats.rejected += 1;
                logger::log_event(
                    &RelayEvent::new(EventKind::Rejected)
                        .connection(conn.id())
                        .peer(conn.peer_addr()),
                );
                // dropping closes the socket without a welcome
                drop(conn);
            }
        }
    }
}

/// Insert into the table and welcome. Returns the connection if the
/// table had no room for it.
async fn register(conn: Connection, table: &mut ClientTable<Connection>) -> Option<Connection> {
    let id = conn.id();
    let peer_addr = conn.peer_addr();

    let slot = match table.insert(id, conn) {
        Ok(slot) => slot,
        Err(InsertError::Full(conn)) => return Some(conn),
        Err(err @ InsertError::Duplicate(_)) => {
            logger::log_error(&format!("Connection {id} is already registered"));
            drop(err.into_inner());
            return None;
        }
    };

    logger::log_event(
        &RelayEvent::new(EventKind::Registered)
            .connection(id)
            .peer(peer_addr)
            .slot(slot)
            .detail(format!("{}/{} slots in use", table.len(), table.capacity())),
    );

    let conn = table.get_mut(slot, id)?;
    if let Err(e) = conn.send(WELCOME_MESSAGE).await {
        logger::log_event(
            &RelayEvent::new(EventKind::WelcomeFailed)
                .connection(id)
                .peer(peer_addr)
                .slot(slot)
                .detail(e.to_string()),
        );
    }
    None
}
