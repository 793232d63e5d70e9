//! Logger module
//!
//! Provides logging utilities for the relay server including:
//! - Server lifecycle logging
//! - Structured relay events (text or JSON)
//! - Error and warning logging
//! - File-based logging support

mod format;
pub mod writer;

pub use format::{EventKind, RelayEvent};

use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::OnceLock;

use crate::config::Config;

/// Event line format, fixed at `init()`
static EVENT_FORMAT: OnceLock<String> = OnceLock::new();

/// Log severity, most severe first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    Error,
    Warn,
    Info,
    Debug,
}

impl Level {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Error => "ERROR",
            Self::Warn => "WARN",
            Self::Info => "INFO",
            Self::Debug => "DEBUG",
        }
    }

    /// Whether a line at `self` passes a `threshold` filter
    pub const fn is_within(self, threshold: Self) -> bool {
        (self as u8) <= (threshold as u8)
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for Level {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "error" => Ok(Self::Error),
            "warn" | "warning" => Ok(Self::Warn),
            "info" => Ok(Self::Info),
            "debug" => Ok(Self::Debug),
            other => Err(format!("unknown log level: {other}")),
        }
    }
}

/// Initialize the logger with configuration
///
/// Should be called once at application startup.
pub fn init(config: &Config) -> std::io::Result<()> {
    let level = config
        .logging
        .level
        .parse()
        .map_err(|e: String| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;
    let _ = EVENT_FORMAT.set(config.logging.format.clone());
    writer::init(
        level,
        config.logging.event_log_file.as_deref(),
        config.logging.error_log_file.as_deref(),
    )
}

/// Whether lines at `level` would be written
pub fn enabled(level: Level) -> bool {
    match writer::get() {
        Some(w) => w.enabled(level),
        None => level.is_within(Level::Info),
    }
}

fn write(level: Level, message: &str) {
    if let Some(w) = writer::get() {
        w.write(level, message);
    } else if level.is_within(Level::Warn) {
        eprintln!("{message}");
    } else if level.is_within(Level::Info) {
        println!("{message}");
    }
}

/// Render and write a relay event at its own level
pub fn log_event(event: &RelayEvent) {
    if !enabled(event.level()) {
        return;
    }
    let format = EVENT_FORMAT.get().map_or("text", String::as_str);
    write(event.level(), &event.format(format));
}

pub fn log_server_start(addr: &SocketAddr, config: &Config) {
    write(Level::Info, "======================================");
    write(Level::Info, "Relay server started successfully");
    write(Level::Info, &format!("Listening on: {addr}"));
    write(Level::Info, &format!("Capacity: {} connections", config.relay.capacity));
    write(
        Level::Info,
        &format!("Read size: {} bytes", config.relay.read_limit()),
    );
    write(
        Level::Info,
        &format!(
            "On full: {:?}, on read error: {:?}",
            config.relay.on_full, config.relay.on_read_error
        ),
    );
    write(Level::Info, &format!("Log level: {}", config.logging.level));
    if let Some(ref path) = config.logging.event_log_file {
        write(Level::Info, &format!("Event log: {path}"));
    }
    if let Some(ref path) = config.logging.error_log_file {
        write(Level::Info, &format!("Error log: {path}"));
    }
    write(Level::Info, "======================================\n");
}

pub fn log_info(message: &str) {
    write(Level::Info, &format!("[INFO] {message}"));
}

pub fn log_error(message: &str) {
    write(Level::Error, &format!("[ERROR] {message}"));
}

pub fn log_warning(message: &str) {
    write(Level::Warn, &format!("[WARN] {message}"));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_parsing() {
        assert_eq!("INFO".parse::<Level>(), Ok(Level::Info));
        assert_eq!("warning".parse::<Level>(), Ok(Level::Warn));
        assert!("trace".parse::<Level>().is_err());
    }

    #[test]
    fn test_level_threshold() {
        assert!(Level::Error.is_within(Level::Info));
        assert!(Level::Info.is_within(Level::Info));
        assert!(!Level::Debug.is_within(Level::Info));
        assert!(Level::Debug.is_within(Level::Debug));
    }
}
