// Configuration module entry point
// Layers the config file, RELAY_* environment variables and built-in defaults

mod types;

use std::net::SocketAddr;

use crate::error::StartupError;
use crate::logger::Level;

// Re-export public types
pub use types::{Config, OverflowPolicy, ReadErrorPolicy, RelayConfig};

/// Config file consulted when none is given on the command line
pub const DEFAULT_CONFIG_PATH: &str = "config";

impl Config {
    /// Load configuration from specified file path (extension optional).
    /// A missing file is not an error; defaults and environment apply.
    pub fn load_from(config_path: &str) -> Result<Self, config::ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(config_path).required(false))
            .add_source(
                config::Environment::with_prefix("RELAY")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080)?
            .set_default("server.backlog", 128)?
            .set_default("relay.capacity", 4)?
            .set_default("relay.buffer_size", 1024)?
            .set_default("relay.on_full", "reject")?
            .set_default("relay.queue_limit", 16)?
            .set_default("relay.on_read_error", "evict")?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "text")?
            .build()?;

        settings.try_deserialize()
    }

    /// Load and validate in one step, mapping failures to startup errors
    pub fn load_validated(config_path: &str) -> Result<Self, StartupError> {
        let cfg = Self::load_from(config_path)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), StartupError> {
        if self.relay.capacity == 0 {
            return Err(StartupError::InvalidSetting(
                "relay.capacity must be at least 1".to_string(),
            ));
        }
        if self.relay.buffer_size < 2 {
            return Err(StartupError::InvalidSetting(
                "relay.buffer_size must be at least 2".to_string(),
            ));
        }
        if self.server.backlog <= 0 {
            return Err(StartupError::InvalidSetting(
                "server.backlog must be positive".to_string(),
            ));
        }
        if self.logging.level.parse::<Level>().is_err() {
            return Err(StartupError::InvalidSetting(format!(
                "logging.level '{}' is not one of error, warn, info, debug",
                self.logging.level
            )));
        }
        if !matches!(self.logging.format.as_str(), "text" | "json") {
            return Err(StartupError::InvalidSetting(format!(
                "logging.format '{}' is not one of text, json",
                self.logging.format
            )));
        }
        Ok(())
    }

    pub fn get_socket_addr(&self) -> Result<SocketAddr, StartupError> {
        let raw = format!("{}:{}", self.server.host, self.server.port);
        raw.parse()
            .map_err(|e| StartupError::Address(format!("'{raw}': {e}")))
    }
}
