//! Application configuration loading and validation.
//!
//! Provides the main [`Config`] struct that aggregates all settings.
//! Configuration is loaded from a TOML file; the `DATABASE_URL` environment
//! variable overrides `database.url`.
//!
//! # Example
//!
//! ```no_run
//! use skincache::infrastructure::config::settings::Config;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load("skincache.toml")?;
//!     config.init_logging();
//!     Ok(())
//! }
//! ```

use std::path::Path;

use serde::Deserialize;

use super::cache::{CacheConfig, FetchConfig};
use super::database::DatabaseConfig;
use super::logging::LoggingConfig;
use super::refresh::RefreshConfig;
use crate::adapter::outbound::steam::SteamConfig;
use crate::error::{ConfigError, Result};

/// Main application configuration.
///
/// Every section is optional; an empty file yields a working local setup.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Logging and tracing configuration.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Persistent store connection and outage handling.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// In-process cache sizing and price validity window.
    #[serde(default)]
    pub cache: CacheConfig,

    /// External lookup timeout and concurrency.
    #[serde(default)]
    pub fetch: FetchConfig,

    /// Background refresh schedule.
    #[serde(default)]
    pub refresh: RefreshConfig,

    /// Steam community market client.
    #[serde(default)]
    pub steam: SteamConfig,
}

impl Config {
    /// Parse configuration from TOML content.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The TOML content is malformed
    /// - Validation fails (e.g., zero cache capacity)
    #[allow(clippy::result_large_err)]
    pub fn parse_toml(content: &str) -> Result<Self> {
        let mut config: Self = toml::from_str(content).map_err(ConfigError::Parse)?;

        if let Ok(url) = std::env::var("DATABASE_URL") {
            if !url.trim().is_empty() {
                config.database.url = url;
            }
        }

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, is malformed, or fails validation.
    #[allow(clippy::result_large_err)]
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadFile)?;
        Self::parse_toml(&content)
    }

    /// Validate configuration values.
    #[allow(clippy::result_large_err)]
    fn validate(&self) -> Result<()> {
        if self.database.url.trim().is_empty() {
            return Err(ConfigError::MissingField {
                field: "database.url",
            }
            .into());
        }
        if self.database.modes.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "database.modes",
                reason: "at least one session mode is required".to_string(),
            }
            .into());
        }
        if self.database.pool_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "database.pool_size",
                reason: "must be greater than 0".to_string(),
            }
            .into());
        }
        if self.database.operation_timeout_ms == 0 || self.database.reconcile_interval_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "database",
                reason: "operation_timeout_ms and reconcile_interval_secs must be greater than 0"
                    .to_string(),
            }
            .into());
        }

        if self.cache.capacity == 0 {
            return Err(ConfigError::InvalidValue {
                field: "cache.capacity",
                reason: "must be greater than 0".to_string(),
            }
            .into());
        }
        if self.cache.shards == 0 || self.cache.shards > self.cache.capacity {
            return Err(ConfigError::InvalidValue {
                field: "cache.shards",
                reason: "must be between 1 and cache.capacity".to_string(),
            }
            .into());
        }
        if self.cache.validity_days <= 0 {
            return Err(ConfigError::InvalidValue {
                field: "cache.validity_days",
                reason: "must be greater than 0".to_string(),
            }
            .into());
        }

        if self.fetch.timeout_ms == 0 || self.fetch.max_concurrent == 0 {
            return Err(ConfigError::InvalidValue {
                field: "fetch",
                reason: "timeout_ms and max_concurrent must be greater than 0".to_string(),
            }
            .into());
        }

        if self.refresh.period_days <= 0 {
            return Err(ConfigError::InvalidValue {
                field: "refresh.period_days",
                reason: "must be greater than 0".to_string(),
            }
            .into());
        }
        if self.refresh.concurrency == 0 {
            return Err(ConfigError::InvalidValue {
                field: "refresh.concurrency",
                reason: "must be greater than 0".to_string(),
            }
            .into());
        }
        self.refresh.settings()?;

        if self.steam.currency != 1 {
            return Err(ConfigError::InvalidValue {
                field: "steam.currency",
                reason: "only USD (1) is supported".to_string(),
            }
            .into());
        }
        url::Url::parse(&self.steam.api_url).map_err(|e| ConfigError::InvalidValue {
            field: "steam.api_url",
            reason: e.to_string(),
        })?;

        Ok(())
    }

    /// Initialize logging with the configured settings.
    pub fn init_logging(&self) {
        self.logging.init();
    }
}
