//! # Configuration Management
//!
//! Centralized configuration for the session server.
//!
//! ## Configuration Sources
//! - TOML files via `from_file()` / `from_toml()`
//! - Environment variables via `from_env()`
//! - Direct instantiation with defaults
//!
//! Durations are written in seconds (fractions allowed), e.g.
//!
//! ```toml
//! [server]
//! address = "0.0.0.0:5555"
//! session_timeout = 5
//! message_retention = 10
//! maintenance_interval = 5
//! poll_interval = 0.5
//! receive_buffer_size = 1024
//! wire_format = "json"
//! ```

use crate::core::serialization::WireFormat;
use crate::error::{ProtocolError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::Level;

/// Seconds of silence before a session is evicted
pub const DEFAULT_SESSION_TIMEOUT: Duration = Duration::from_secs(5);

/// Seconds a dedup record survives
pub const DEFAULT_MESSAGE_RETENTION: Duration = Duration::from_secs(10);

/// Minimum time between maintenance passes
pub const DEFAULT_MAINTENANCE_INTERVAL: Duration = Duration::from_secs(5);

/// Sleep between driver cycles
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Max bytes read per datagram
pub const DEFAULT_RECEIVE_BUFFER_SIZE: usize = 1024;

/// Largest payload a single UDP/IPv4 datagram can carry
pub const MAX_DATAGRAM_SIZE: usize = 65_507;

/// Main configuration structure that contains all configurable settings
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct NetworkConfig {
    /// Server-specific configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl NetworkConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to read config file: {e}")))?;

        Self::from_toml(&contents)
    }

    /// Load configuration from TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str::<Self>(content)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to parse TOML: {e}")))
    }

    /// Load configuration from environment variables on top of the defaults
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(addr) = std::env::var("UDP_SESSION_ADDRESS") {
            config.server.address = addr;
        }

        if let Some(val) = env_millis("UDP_SESSION_TIMEOUT_MS")? {
            config.server.session_timeout = val;
        }

        if let Some(val) = env_millis("UDP_SESSION_MESSAGE_RETENTION_MS")? {
            config.server.message_retention = val;
        }

        if let Some(val) = env_millis("UDP_SESSION_MAINTENANCE_INTERVAL_MS")? {
            config.server.maintenance_interval = val;
        }

        if let Ok(size) = std::env::var("UDP_SESSION_RECEIVE_BUFFER_SIZE") {
            config.server.receive_buffer_size = size.parse::<usize>().map_err(|e| {
                ProtocolError::ConfigError(format!("UDP_SESSION_RECEIVE_BUFFER_SIZE: {e}"))
            })?;
        }

        if let Ok(level) = std::env::var("UDP_SESSION_LOG_LEVEL") {
            config.logging.log_level = level
                .parse::<Level>()
                .map_err(|_| ProtocolError::ConfigError(format!("Invalid log level: {level}")))?;
        }

        Ok(config)
    }

    /// Apply overrides to the default configuration
    pub fn default_with_overrides<F>(mutator: F) -> Self
    where
        F: FnOnce(&mut Self),
    {
        let mut config = Self::default();
        mutator(&mut config);
        config
    }

    /// Generate example configuration file content
    pub fn example_config() -> String {
        toml::to_string_pretty(&Self::default())
            .unwrap_or_else(|_| String::from("# Failed to generate example config"))
    }

    /// Validate the configuration for common issues and misconfigurations
    ///
    /// Returns a list of validation errors. Empty list means configuration is valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = self.server.validate();
        errors.extend(self.logging.validate());
        errors
    }

    /// Validate and return Result - convenience method
    pub fn validate_strict(&self) -> Result<()> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ProtocolError::ConfigError(format!(
                "Configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            )))
        }
    }
}

fn env_millis(name: &str) -> Result<Option<Duration>> {
    match std::env::var(name) {
        Ok(raw) => raw
            .parse::<u64>()
            .map(|ms| Some(Duration::from_millis(ms)))
            .map_err(|e| ProtocolError::ConfigError(format!("{name}: {e}"))),
        Err(_) => Ok(None),
    }
}

/// Server-specific configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen address (e.g., "127.0.0.1:5555")
    pub address: String,

    /// Silence after which a session is evicted
    #[serde(with = "duration_secs_serde")]
    pub session_timeout: Duration,

    /// How long a reliable message is remembered for duplicate suppression
    #[serde(with = "duration_secs_serde")]
    pub message_retention: Duration,

    /// Minimum time between maintenance passes
    #[serde(with = "duration_secs_serde")]
    pub maintenance_interval: Duration,

    /// Sleep between cycles of the serve loop
    #[serde(with = "duration_secs_serde")]
    pub poll_interval: Duration,

    /// Max bytes read per datagram; longer datagrams are truncated
    pub receive_buffer_size: usize,

    /// Outbound queue cap. `None` keeps it unbounded; when set, the oldest
    /// queued datagram is dropped to make room
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outbound_queue_limit: Option<usize>,

    /// Encoding of datagrams
    pub wire_format: WireFormat,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: String::from("127.0.0.1:5555"),
            session_timeout: DEFAULT_SESSION_TIMEOUT,
            message_retention: DEFAULT_MESSAGE_RETENTION,
            maintenance_interval: DEFAULT_MAINTENANCE_INTERVAL,
            poll_interval: DEFAULT_POLL_INTERVAL,
            receive_buffer_size: DEFAULT_RECEIVE_BUFFER_SIZE,
            outbound_queue_limit: None,
            wire_format: WireFormat::default(),
        }
    }
}

impl ServerConfig {
    /// Validate server configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        // Validate address format
        if self.address.is_empty() {
            errors.push("Server address cannot be empty".to_string());
        } else if self.address.parse::<std::net::SocketAddr>().is_err() {
            errors.push(format!(
                "Invalid server address format: '{}' (expected format: '0.0.0.0:5555')",
                self.address
            ));
        }

        if self.session_timeout.is_zero() {
            errors.push("Session timeout must be greater than 0".to_string());
        }

        if self.message_retention.is_zero() {
            errors.push("Message retention must be greater than 0".to_string());
        }

        if self.maintenance_interval.is_zero() {
            errors.push("Maintenance interval must be greater than 0".to_string());
        }

        if self.poll_interval.is_zero() {
            errors.push("Poll interval must be greater than 0".to_string());
        }

        if self.receive_buffer_size < 64 {
            errors.push(format!(
                "Receive buffer too small: {} bytes (minimum: 64)",
                self.receive_buffer_size
            ));
        } else if self.receive_buffer_size > MAX_DATAGRAM_SIZE {
            errors.push(format!(
                "Receive buffer too large: {} bytes (maximum: {MAX_DATAGRAM_SIZE})",
                self.receive_buffer_size
            ));
        }

        if self.outbound_queue_limit == Some(0) {
            errors.push("Outbound queue limit must be greater than 0 when set".to_string());
        }

        errors
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Application name for logs
    pub app_name: String,

    /// Log level
    #[serde(with = "log_level_serde")]
    pub log_level: Level,

    /// Whether to use JSON formatting for logs
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            app_name: String::from("udp-session"),
            log_level: Level::INFO,
            json_format: false,
        }
    }
}

impl LoggingConfig {
    /// Validate logging configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.app_name.is_empty() {
            errors.push("Application name cannot be empty".to_string());
        } else if self.app_name.len() > 64 {
            errors.push(format!(
                "Application name too long: {} characters (maximum: 64)",
                self.app_name.len()
            ));
        }

        errors
    }
}

/// Helper module for Duration serialization as (fractional) seconds
mod duration_secs_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs_f64().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Seconds {
            Whole(u64),
            Fraction(f64),
        }

        match Seconds::deserialize(deserializer)? {
            Seconds::Whole(secs) => Ok(Duration::from_secs(secs)),
            Seconds::Fraction(secs) => Duration::try_from_secs_f64(secs)
                .map_err(|e| serde::de::Error::custom(format!("Invalid duration {secs}: {e}"))),
        }
    }
}

/// Helper module for tracing::Level serialization/deserialization
mod log_level_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::str::FromStr;
    use tracing::Level;

    pub fn serialize<S>(level: &Level, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let level_str = match *level {
            Level::TRACE => "trace",
            Level::DEBUG => "debug",
            Level::INFO => "info",
            Level::WARN => "warn",
            Level::ERROR => "error",
        };
        level_str.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Level, D::Error>
    where
        D: Deserializer<'de>,
    {
        let level_str = String::deserialize(deserializer)?;
        Level::from_str(&level_str)
            .map_err(|_| serde::de::Error::custom(format!("Invalid log level: {level_str}")))
    }
}
