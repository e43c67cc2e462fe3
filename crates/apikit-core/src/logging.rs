//! Logging setup.
//!
//! The framework emits `tracing` events: a `request` span per dispatch and
//! debug events for every dependency resolution. [`init`] installs a
//! `tracing-subscriber` formatter for binaries and tests that want to see
//! them. `RUST_LOG` takes precedence over the configured level.

use crate::config::AppConfig;
use tracing_subscriber::EnvFilter;

/// Errors raised while installing the subscriber.
#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    /// The filter directive did not parse.
    #[error("invalid log filter `{directive}`: {reason}")]
    InvalidFilter {
        /// The rejected directive.
        directive: String,
        /// Parser message.
        reason: String,
    },
    /// A global subscriber is already set.
    #[error("logging already initialized: {0}")]
    AlreadyInitialized(String),
}

/// Subscriber settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    /// Filter directive used when `RUST_LOG` is unset (`info`, `apikit=debug`).
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
    /// Include the event target.
    pub with_target: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: String::from("info"),
            json: false,
            with_target: true,
        }
    }
}

impl LogConfig {
    /// Settings for tests: debug level, compact output.
    #[must_use]
    pub fn test() -> Self {
        Self {
            level: String::from("debug"),
            json: false,
            with_target: false,
        }
    }
}

impl From<&AppConfig> for LogConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            level: config.log_level.clone(),
            json: config.log_json,
            ..Self::default()
        }
    }
}

/// Build the filter: `RUST_LOG` if set, else the configured directive.
pub fn env_filter(config: &LogConfig) -> Result<EnvFilter, LoggingError> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(&config.level).map_err(|err| LoggingError::InvalidFilter {
        directive: config.level.clone(),
        reason: err.to_string(),
    })
}

/// Install the global subscriber.
///
/// Fails instead of panicking when a subscriber is already installed, so
/// every test may call it.
pub fn init(config: &LogConfig) -> Result<(), LoggingError> {
    let filter = env_filter(config)?;
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(config.with_target);

    let result = if config.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    result.map_err(|err| LoggingError::AlreadyInitialized(err.to_string()))?;

    tracing::debug!(level = %config.level, json = config.json, "logging initialized");
    Ok(())
}
