//! Relay event format module
//!
//! Every connection lifecycle step and relay action becomes one
//! `RelayEvent`, rendered either as a `key=value` text line or as JSON.

use std::fmt;
use std::net::SocketAddr;

use chrono::Local;

use super::Level;
use crate::server::ConnectionId;

/// Kinds of events the server loop reports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Connected,
    Registered,
    CapacityReached,
    Queued,
    Admitted,
    Rejected,
    WelcomeFailed,
    Disconnected,
    Message,
    Broadcast,
    SendFailed,
    ReadError,
    AcceptError,
    Shutdown,
}

impl EventKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Connected => "connected",
            Self::Registered => "registered",
            Self::CapacityReached => "capacity_reached",
            Self::Queued => "queued",
            Self::Admitted => "admitted",
            Self::Rejected => "rejected",
            Self::WelcomeFailed => "welcome_failed",
            Self::Disconnected => "disconnected",
            Self::Message => "message",
            Self::Broadcast => "broadcast",
            Self::SendFailed => "send_failed",
            Self::ReadError => "read_error",
            Self::AcceptError => "accept_error",
            Self::Shutdown => "shutdown",
        }
    }

    pub const fn level(self) -> Level {
        match self {
            Self::ReadError | Self::AcceptError => Level::Error,
            Self::CapacityReached | Self::Rejected | Self::WelcomeFailed | Self::SendFailed => {
                Level::Warn
            }
            Self::Message => Level::Debug,
            Self::Connected
            | Self::Registered
            | Self::Queued
            | Self::Admitted
            | Self::Disconnected
            | Self::Broadcast
            | Self::Shutdown => Level::Info,
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One structured log record
#[derive(Debug, Clone)]
pub struct RelayEvent {
    pub time: chrono::DateTime<Local>,
    pub kind: EventKind,
    pub connection: Option<ConnectionId>,
    pub peer: Option<SocketAddr>,
    pub slot: Option<usize>,
    /// Payload size, delivery count or similar numeric fact
    pub bytes: Option<usize>,
    pub detail: Option<String>,
}

impl RelayEvent {
    /// Create a new event with current timestamp
    pub fn new(kind: EventKind) -> Self {
        Self {
            time: Local::now(),
            kind,
            connection: None,
            peer: None,
            slot: None,
            bytes: None,
            detail: None,
        }
    }

    #[must_use]
    pub const fn connection(mut self, id: ConnectionId) -> Self {
        self.connection = Some(id);
        self
    }

    #[must_use]
    pub const fn peer(mut self, peer: SocketAddr) -> Self {
        self.peer = Some(peer);
        self
    }

    #[must_use]
    pub const fn slot(mut self, slot: usize) -> Self {
        self.slot = Some(slot);
        self
    }

    #[must_use]
    pub const fn bytes(mut self, bytes: usize) -> Self {
        self.bytes = Some(bytes);
        self
    }

    #[must_use]
    pub fn detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub const fn level(&self) -> Level {
        self.kind.level()
    }

    /// Format the event according to the configured format
    pub fn format(&self, format: &str) -> String {
        match format {
            "json" => self.format_json(),
            _ => self.format_text(),
        }
    }

    /// `[time] LEVEL kind conn=#1 peer=.. slot=.. bytes=.. detail`
    fn format_text(&self) -> String {
        let mut line = format!(
            "[{}] {:<5} {}",
            self.time.format("%Y-%m-%d %H:%M:%S%.3f"),
            self.level(),
            self.kind
        );
        if let Some(id) = self.connection {
            line.push_str(&format!(" conn={id}"));
        }
        if let Some(peer) = self.peer {
            line.push_str(&format!(" peer={peer}"));
        }
        if let Some(slot) = self.slot {
            line.push_str(&format!(" slot={slot}"));
        }
        if let Some(bytes) = self.bytes {
            line.push_str(&format!(" bytes={bytes}"));
        }
        if let Some(detail) = &self.detail {
            line.push(' ');
            line.push_str(detail);
        }
        line
    }

    /// JSON structured log format
    fn format_json(&self) -> String {
        // Manual JSON building to avoid serde_json for flat records
        let connection_json = self
            .connection
            .map_or_else(|| "null".to_string(), |id| id.get().to_string());
        let peer_json = self
            .peer
            .map_or_else(|| "null".to_string(), |p| format!("\"{p}\""));
        let slot_json = self
            .slot
            .map_or_else(|| "null".to_string(), |s| s.to_string());
        let bytes_json = self
            .bytes
            .map_or_else(|| "null".to_string(), |b| b.to_string());
        let detail_json = self
            .detail
            .as_ref()
            .map_or_else(|| "null".to_string(), |d| format!("\"{}\"", escape_json(d)));

        format!(
            r#"{{"time":"{}","level":"{}","event":"{}","connection":{},"peer":{},"slot":{},"bytes":{},"detail":{}}}"#,
            self.time.to_rfc3339(),
            self.level(),
            self.kind,
            connection_json,
            peer_json,
            slot_json,
            bytes_json,
            detail_json,
        )
    }
}

/// Escape special characters for JSON string
fn escape_json(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => out.push_str(&format!("\\u{:04x}", u32::from(c))),
            c => out.push(c),
        }
    }
    out
}
