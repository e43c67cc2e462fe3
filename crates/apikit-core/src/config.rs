//! Application configuration.
//!
//! [`AppConfig`] can be built in code or loaded by layering, in order:
//!
//! 1. the defaults from [`AppConfig::default`];
//! 2. a TOML file (`apikit.toml` in the working directory, or an explicit
//!    path), skipped when absent;
//! 3. `APIKIT_`-prefixed environment variables (`APIKIT_MAX_BODY_SIZE=1024`).

use crate::context::DEFAULT_MAX_BODY_SIZE;
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Prefix for configuration environment variables.
pub const ENV_PREFIX: &str = "APIKIT_";

/// Configuration file looked up by [`AppConfig::load`].
pub const DEFAULT_CONFIG_FILE: &str = "apikit.toml";

/// Errors raised while loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A source could not be read or did not match the schema.
    #[error("failed to load configuration: {0}")]
    Load(#[from] Box<figment::Error>),
    /// A value was read but is not acceptable.
    #[error("invalid configuration value for `{field}`: {reason}")]
    Invalid {
        /// Offending key.
        field: &'static str,
        /// What is wrong with it.
        reason: String,
    },
}

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Application name.
    pub name: String,
    /// Application version.
    pub version: String,
    /// Enable debug mode.
    pub debug: bool,
    /// Maximum accepted request body, in bytes.
    pub max_body_size: usize,
    /// Log filter directive used when `RUST_LOG` is unset.
    pub log_level: String,
    /// Emit logs as JSON lines.
    pub log_json: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            name: String::from("apikit"),
            version: String::from("0.1.0"),
            debug: false,
            max_body_size: DEFAULT_MAX_BODY_SIZE,
            log_level: String::from("info"),
            log_json: false,
        }
    }
}

impl AppConfig {
    /// Creates a new configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the application name.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the application version.
    #[must_use]
    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Enables or disables debug mode.
    #[must_use]
    pub fn debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Sets the maximum request body size.
    #[must_use]
    pub fn max_body_size(mut self, size: usize) -> Self {
        self.max_body_size = size;
        self
    }

    /// Sets the default log filter.
    #[must_use]
    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    /// Switches JSON log output on or off.
    #[must_use]
    pub fn log_json(mut self, json: bool) -> Self {
        self.log_json = json;
        self
    }

    /// Load from defaults, `apikit.toml` and the environment.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(DEFAULT_CONFIG_FILE)
    }

    /// Load from defaults, the given TOML file and the environment.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        tracing::debug!(
            path = %path.display(),
            found = path.exists(),
            "loading configuration"
        );
        let config: Self = Figment::new()
            .merge(Serialized::defaults(Self::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed(ENV_PREFIX))
            .extract()
            .map_err(Box::new)?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges that the schema cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_body_size == 0 {
            return Err(ConfigError::Invalid {
                field: "max_body_size",
                reason: String::from("must be greater than zero"),
            });
        }
        if self.log_level.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "log_level",
                reason: String::from("must not be empty"),
            });
        }
        Ok(())
    }
}
