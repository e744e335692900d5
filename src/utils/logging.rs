//! Structured logging setup.
//!
//! Installs a global `tracing` subscriber built from [`LoggingConfig`]. The
//! `RUST_LOG` environment variable, when set, takes precedence over the
//! configured level.

use crate::config::LoggingConfig;
use crate::error::{constants, ProtocolError, Result};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Build the level filter for a config, honoring `RUST_LOG` first
pub fn env_filter(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.as_str().to_ascii_lowercase()))
}

/// Install the global subscriber
///
/// # Errors
/// Returns `ConfigError` if a global subscriber has already been installed.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter(config))
        .with_target(true);

    let installed = if config.json_format {
        builder.json().try_init()
    } else {
        builder.try_init()
    };

    installed
        .map_err(|_| ProtocolError::ConfigError(constants::ERR_SUBSCRIBER_INSTALLED.to_string()))?;

    info!(
        app = %config.app_name,
        level = %config.log_level,
        json = config.json_format,
        "Logging initialized"
    );
    Ok(())
}
