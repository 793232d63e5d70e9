// Configuration types module
// Defines all configuration-related data structures

use serde::Deserialize;

/// Main configuration structure
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub relay: RelayConfig,
    pub logging: LoggingConfig,
}

/// Listening endpoint configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Pending-connection queue length passed to `listen`
    pub backlog: i32,
}

/// Relay behaviour: registry capacity, read size and failure policies
#[derive(Debug, Deserialize, Clone)]
pub struct RelayConfig {
    /// Maximum number of simultaneously registered connections
    pub capacity: usize,
    /// Read buffer size; the last byte is reserved, so at most
    /// `buffer_size - 1` bytes are read per chunk
    pub buffer_size: usize,
    pub on_full: OverflowPolicy,
    /// Upper bound on parked connections under `OverflowPolicy::Queue`
    pub queue_limit: usize,
    pub on_read_error: ReadErrorPolicy,
}

impl RelayConfig {
    /// Number of payload bytes accepted by a single read
    pub const fn read_limit(&self) -> usize {
        self.buffer_size.saturating_sub(1)
    }
}

/// What happens to a connection accepted while every slot is taken
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Close it immediately, without a welcome message
    Reject,
    /// Park it until a slot frees, then admit it with its welcome
    Queue,
}

/// What happens to a registered connection whose read fails
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ReadErrorPolicy {
    /// Evict and close the connection
    Evict,
    /// Keep it registered and try again on the next readiness
    Retain,
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    pub level: String,
    /// Event line format (text or json)
    #[serde(default = "default_log_format")]
    pub format: String,
    /// Event log file path (optional, stdout if not set)
    #[serde(default)]
    pub event_log_file: Option<String>,
    /// Error log file path (optional, stderr if not set)
    #[serde(default)]
    pub error_log_file: Option<String>,
}

#[allow(clippy::missing_const_for_fn)]
fn default_log_format() -> String {
    "text".to_string()
}
