//! Persistence ports for price records and scheduler bookkeeping.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{Price, PriceKey, PriceRecord, RefreshCursor, StoreStats};
use crate::error::StoreError;

/// Durable key → price records.
///
/// Every operation is side-effecting only on success; `upsert` is atomic per key.
#[async_trait]
pub trait PriceStore: Send + Sync {
    /// Look up the record for a key.
    async fn get(&self, key: &PriceKey) -> Result<Option<PriceRecord>, StoreError>;

    /// Insert a fresh record with `update_count = 1`, or overwrite price and both
    /// timestamps of an existing one and increment its `update_count`.
    async fn upsert(
        &self,
        key: &PriceKey,
        price: Price,
        now: DateTime<Utc>,
    ) -> Result<PriceRecord, StoreError>;

    /// Up to `limit` records, oldest `last_scraped` first, ties by name.
    async fn list_stalest(&self, limit: usize) -> Result<Vec<PriceRecord>, StoreError>;

    /// Aggregates; "recent" means `last_updated >= fresh_since`.
    async fn stats(&self, fresh_since: DateTime<Utc>) -> Result<StoreStats, StoreError>;

    async fn cursor(&self) -> Result<Option<RefreshCursor>, StoreError>;

    async fn save_cursor(&self, cursor: &RefreshCursor) -> Result<(), StoreError>;

    /// Cheap connectivity probe.
    async fn ping(&self) -> Result<(), StoreError>;
}

/// Session mode negotiated when a store connection is established.
///
/// Tried in a fixed priority order; the first that succeeds is kept for the
/// rest of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionMode {
    /// Write-ahead logging is required and verified, full sync, foreign keys on.
    Strict,
    /// Write-ahead logging preferred but not required, normal sync.
    Relaxed,
    /// Rollback journal for filesystems without shared-memory support.
    Compatible,
}

impl SessionMode {
    pub const DEFAULT_ORDER: [SessionMode; 3] = [Self::Strict, Self::Relaxed, Self::Compatible];

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Strict => "strict",
            Self::Relaxed => "relaxed",
            Self::Compatible => "compatible",
        }
    }
}

impl fmt::Display for SessionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SessionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "strict" => Ok(Self::Strict),
            "relaxed" => Ok(Self::Relaxed),
            "compatible" => Ok(Self::Compatible),
            other => Err(format!("unknown session mode '{other}'")),
        }
    }
}

/// Opens a [`PriceStore`] using one negotiation strategy.
#[async_trait]
pub trait StoreConnector: Send + Sync {
    async fn connect(&self, mode: SessionMode) -> Result<Arc<dyn PriceStore>, StoreError>;
}
