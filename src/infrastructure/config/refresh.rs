//! Refresh scheduler configuration.

use chrono::{Duration, NaiveTime, Weekday};
use serde::Deserialize;

use crate::application::refresh::{RefreshSettings, WeeklyAnchor};
use crate::error::ConfigError;

/// Periodic refresh of the stalest records.
#[derive(Debug, Clone, Deserialize)]
pub struct RefreshConfig {
    /// Run the periodic loop. Manual triggers work either way.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Weekday of the first run, e.g. "sunday" or "sun".
    #[serde(default = "default_weekday")]
    pub weekday: String,
    /// UTC time of day of the first run, "HH:MM".
    #[serde(default = "default_time")]
    pub time: String,
    #[serde(default = "default_period_days")]
    pub period_days: i64,
    /// Records selected by a periodic run.
    #[serde(default = "default_max_items")]
    pub max_items: usize,
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

const fn default_enabled() -> bool {
    true
}

fn default_weekday() -> String {
    "sunday".to_string()
}

fn default_time() -> String {
    "03:00".to_string()
}

const fn default_period_days() -> i64 {
    7
}

const fn default_max_items() -> usize {
    100
}

const fn default_concurrency() -> usize {
    4
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            weekday: default_weekday(),
            time: default_time(),
            period_days: default_period_days(),
            max_items: default_max_items(),
            concurrency: default_concurrency(),
        }
    }
}

impl RefreshConfig {
    /// Resolve the textual schedule into scheduler settings.
    ///
    /// # Errors
    /// Returns `InvalidValue` for an unknown weekday or malformed time.
    pub fn settings(&self) -> Result<RefreshSettings, ConfigError> {
        let weekday = self
            .weekday
            .parse::<Weekday>()
            .map_err(|_| ConfigError::InvalidValue {
                field: "refresh.weekday",
                reason: format!("unknown weekday '{}'", self.weekday),
            })?;
        let time = NaiveTime::parse_from_str(&self.time, "%H:%M").map_err(|e| {
            ConfigError::InvalidValue {
                field: "refresh.time",
                reason: format!("expected HH:MM, got '{}': {e}", self.time),
            }
        })?;

        Ok(RefreshSettings {
            period: Duration::days(self.period_days),
            anchor: WeeklyAnchor { weekday, time },
            max_items: self.max_items,
            concurrency: self.concurrency,
        })
    }
}
