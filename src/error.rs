use std::time::Duration;

use thiserror::Error;

/// Configuration-related errors with structured variants.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing required field: {field}")]
    MissingField { field: &'static str },

    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("failed to read config file: {0}")]
    ReadFile(#[source] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[source] toml::de::Error),
}

/// Persistent store errors.
///
/// `ConnectionUnavailable` is transient and absorbed by the connection guard;
/// `IntegrityViolation` is fatal for the single write that raised it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    ConnectionUnavailable(String),

    #[error("integrity violation: {0}")]
    IntegrityViolation(String),
}

impl StoreError {
    /// True for failures that a fallback or reconnect can recover from.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::ConnectionUnavailable(_))
    }
}

/// External price lookup errors. These are the only failures a price caller sees.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("no market price listed for {0}")]
    NotListed(String),

    #[error("upstream price source failed: {0}")]
    Upstream(String),

    #[error("price lookup timed out after {0:?}")]
    Timeout(Duration),

    #[error("price lookup aborted: {0}")]
    Aborted(String),
}

/// Refresh scheduler command errors.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshError {
    #[error("refresh already running")]
    Busy,
}

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Refresh(#[from] RefreshError),

    #[error("JSON encoding error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
