//! Persistent store configuration.

use std::time::Duration;

use serde::Deserialize;

use crate::adapter::outbound::sqlite::database::connection::PoolOptions;
use crate::application::guard::GuardSettings;
use crate::port::SessionMode;

/// SQLite connection, negotiation and outage handling settings.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Database file path or URL. Overridden by `DATABASE_URL`.
    #[serde(default = "default_url")]
    pub url: String,
    /// Session modes to try, in priority order.
    #[serde(default = "default_modes")]
    pub modes: Vec<SessionMode>,
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,
    /// Wait for a pooled connection (milliseconds).
    #[serde(default = "default_acquire_timeout_ms")]
    pub acquire_timeout_ms: u64,
    /// SQLite lock wait per statement (milliseconds).
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// Upper bound for any single store call (milliseconds).
    #[serde(default = "default_operation_timeout_ms")]
    pub operation_timeout_ms: u64,
    /// Seconds between reconnection probes.
    #[serde(default = "default_reconcile_interval_secs")]
    pub reconcile_interval_secs: u64,
}

fn default_url() -> String {
    "skincache.db".to_string()
}

fn default_modes() -> Vec<SessionMode> {
    SessionMode::DEFAULT_ORDER.to_vec()
}

const fn default_pool_size() -> u32 {
    5
}

const fn default_acquire_timeout_ms() -> u64 {
    5000
}

const fn default_busy_timeout_ms() -> u64 {
    5000
}

const fn default_operation_timeout_ms() -> u64 {
    10_000
}

const fn default_reconcile_interval_secs() -> u64 {
    30
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            modes: default_modes(),
            pool_size: default_pool_size(),
            acquire_timeout_ms: default_acquire_timeout_ms(),
            busy_timeout_ms: default_busy_timeout_ms(),
            operation_timeout_ms: default_operation_timeout_ms(),
            reconcile_interval_secs: default_reconcile_interval_secs(),
        }
    }
}

impl DatabaseConfig {
    #[must_use]
    pub fn pool_options(&self) -> PoolOptions {
        PoolOptions {
            max_size: self.pool_size,
            acquire_timeout: Duration::from_millis(self.acquire_timeout_ms),
            busy_timeout_ms: self.busy_timeout_ms,
        }
    }

    #[must_use]
    pub fn guard_settings(&self) -> GuardSettings {
        GuardSettings {
            modes: self.modes.clone(),
            operation_timeout: Duration::from_millis(self.operation_timeout_ms),
            reconcile_interval: Duration::from_secs(self.reconcile_interval_secs),
        }
    }
}
