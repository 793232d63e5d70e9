// Message relay
// One bounded read per ready connection, then fan-out to every other slot

use std::io;

use super::connection::{Connection, ConnectionId};
use super::stats::RelayStats;
use super::table::ClientTable;
use crate::config::{ReadErrorPolicy, RelayConfig};
use crate::logger::{self, EventKind, Level, RelayEvent};

/// Longest payload prefix echoed into debug logs
const PREVIEW_LIMIT: usize = 120;

/// What servicing one ready connection amounted to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayOutcome {
    /// Spurious readiness, or the slot no longer holds that connection
    Idle,
    /// Peer closed; evicted and closed
    Disconnected,
    /// Read `bytes` and delivered them to `delivered` peers
    Relayed { bytes: usize, delivered: usize },
    /// Read failed; `evicted` tells whether the policy dropped it
    ReadFailed { evicted: bool },
}

impl RelayOutcome {
    pub const fn freed_slot(self) -> bool {
        matches!(
            self,
            Self::Disconnected | Self::ReadFailed { evicted: true }
        )
    }
}

/// Per-peer result of a broadcast
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Delivery {
    pub delivered: usize,
    pub failed: usize,
}

#[derive(Debug)]
pub struct MessageRelay {
    /// Full buffer; only `read_limit` bytes of it are ever filled
    buffer: Vec<u8>,
    read_limit: usize,
    on_read_error: ReadErrorPolicy,
}

impl MessageRelay {
    pub fn new(config: &RelayConfig) -> Self {
        Self {
            buffer: vec![0; config.buffer_size],
            read_limit: config.read_limit(),
            on_read_error: config.on_read_error,
        }
    }

    /// Service the connection `id` reported ready in `slot`
    pub async fn service(
        &mut self,
        slot: usize,
        id: ConnectionId,
        table: &mut ClientTable<Connection>,
        stats: &mut RelayStats,
    ) -> RelayOutcome {
        let Some(conn) = table.get(slot, id) else {
            return RelayOutcome::Idle;
        };
        let peer_addr = conn.peer_addr();
        let read = conn.read_chunk(&mut self.buffer[..self.read_limit]);

        match read {
            Ok(0) => {
                logger::log_event(
                    &RelayEvent::new(EventKind::Disconnected)
                        .connection(id)
                        .peer(peer_addr)
                        .slot(slot),
                );
                stats.disconnected += 1;
                evict(id, table).await;
                RelayOutcome::Disconnected
            }
            Ok(n) => {
                let payload = &self.buffer[..n];
                if logger::enabled(Level::Debug) {
                    logger::log_event(
                        &RelayEvent::new(EventKind::Message)
                            .connection(id)
                            .slot(slot)
                            .bytes(n)
                            .detail(preview(payload)),
                    );
                }

                let delivery = broadcast(table, id, payload).await;
                stats.messages += 1;
                stats.bytes_delivered += (n * delivery.delivered) as u64;
                stats.failed_deliveries += delivery.failed as u64;
                logger::log_event(
                    &RelayEvent::new(EventKind::Broadcast)
                        .connection(id)
                        .slot(slot)
                        .bytes(n)
                        .detail(format!(
                            "delivered to {} peer(s), {} failed",
                            delivery.delivered, delivery.failed
                        )),
                );
                RelayOutcome::Relayed {
                    bytes: n,
                    delivered: delivery.delivered,
                }
            }
            Err(e) if is_transient(&e) => RelayOutcome::Idle,
            Err(e) => {
                stats.read_errors += 1;
                let evicted = self.on_read_error == ReadErrorPolicy::Evict;
                logger::log_event(
                    &RelayEvent::new(EventKind::ReadError)
                        .connection(id)
                        .peer(peer_addr)
                        .slot(slot)
                        .detail(format!(
                            "{e} ({})",
                            if evicted { "evicted" } else { "retained" }
                        )),
                );
                if evicted {
                    evict(id, table).await;
                }
                RelayOutcome::ReadFailed { evicted }
            }
        }
    }
}

/// Send `payload` to every registered connection except `sender`, in
/// slot order. A failing peer is logged and skipped.
pub async fn broadcast(
    table: &mut ClientTable<Connection>,
    sender: ConnectionId,
    payload: &[u8],
) -> Delivery {
    let mut delivery = Delivery::default();
    for (slot, id, conn) in table.active_mut() {
        if id == sender {
            continue;
        }
        match conn.send(payload).await {
            Ok(()) => delivery.delivered += 1,
            Err(e) => {
                delivery.failed += 1;
                logger::log_event(
                    &RelayEvent::new(EventKind::SendFailed)
                        .connection(id)
                        .peer(conn.peer_addr())
                        .slot(slot)
                        .bytes(payload.len())
                        .detail(e.to_string()),
                );
            }
        }
    }
    delivery
}

async fn evict(id: ConnectionId, table: &mut ClientTable<Connection>) {
    if let Some(conn) = table.remove(id) {
        conn.close().await;
    }
}

fn is_transient(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
    )
}

fn preview(payload: &[u8]) -> String {
    let shown = &payload[..payload.len().min(PREVIEW_LIMIT)];
    let mut text = String::from_utf8_lossy(shown).into_owned();
    if payload.len() > PREVIEW_LIMIT {
        text.push_str("...");
    }
    format!("says: {}", text.trim_end())
}
