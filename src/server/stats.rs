// Relay counters, owned by the server loop

use std::fmt;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RelayStats {
    /// Connections returned by accept
    pub accepted: u64,
    /// Connections closed because no slot (or queue space) was free
    pub rejected: u64,
    /// Connections parked in the overflow queue
    pub queued: u64,
    /// Peers that closed their side
    pub disconnected: u64,
    pub read_errors: u64,
    /// Chunks read and broadcast
    pub messages: u64,
    /// Payload bytes written across all recipients
    pub bytes_delivered: u64,
    pub failed_deliveries: u64,
}

impl fmt::Display for RelayStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "accepted={} rejected={} queued={} disconnected={} read_errors={} messages={} bytes_delivered={} failed_deliveries={}",
            self.accepted,
            self.rejected,
            self.queued,
            self.disconnected,
            self.read_errors,
            self.messages,
            self.bytes_delivered,
            self.failed_deliveries,
        )
    }
}
