//! Memory cache and fetch configuration.

use std::time::Duration;

use serde::Deserialize;

use crate::domain::{StalenessPolicy, DEFAULT_VALIDITY_DAYS};

/// In-process cache sizing and price validity.
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// Maximum cached entries across all shards.
    #[serde(default = "default_capacity")]
    pub capacity: usize,
    #[serde(default = "default_shards")]
    pub shards: usize,
    /// Days a price stays valid before it is fetched again.
    #[serde(default = "default_validity_days")]
    pub validity_days: i64,
}

const fn default_capacity() -> usize {
    10_000
}

const fn default_shards() -> usize {
    16
}

const fn default_validity_days() -> i64 {
    DEFAULT_VALIDITY_DAYS
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
            shards: default_shards(),
            validity_days: default_validity_days(),
        }
    }
}

impl CacheConfig {
    #[must_use]
    pub fn staleness(&self) -> StalenessPolicy {
        StalenessPolicy::new(chrono::Duration::days(self.validity_days))
    }
}

/// External price lookup limits.
#[derive(Debug, Clone, Deserialize)]
pub struct FetchConfig {
    /// Upper bound for one lookup (milliseconds).
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Lookups allowed to run at once.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
}

const fn default_timeout_ms() -> u64 {
    20_000
}

const fn default_max_concurrent() -> usize {
    8
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
            max_concurrent: default_max_concurrent(),
        }
    }
}

impl FetchConfig {
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}
