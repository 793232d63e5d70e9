//! Error types for the relay server

use thiserror::Error;

/// Failures that stop the server before (or while) it starts listening.
///
/// Everything that goes wrong after the listener is up is logged and
/// absorbed by the server loop instead.
#[derive(Error, Debug)]
pub enum StartupError {
    /// Config file or environment could not be read or deserialized
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// A setting is present but outside its accepted range
    #[error("Invalid setting: {0}")]
    InvalidSetting(String),

    /// Host/port do not form a socket address
    #[error("Invalid address: {0}")]
    Address(String),

    /// Socket creation, bind or listen failed
    #[error("Failed to listen on {addr}: {source}")]
    Bind {
        addr: std::net::SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// Log file targets could not be opened
    #[error("Logger error: {0}")]
    Logger(#[source] std::io::Error),

    /// Async runtime could not be built
    #[error("Runtime error: {0}")]
    Runtime(#[source] std::io::Error),
}
