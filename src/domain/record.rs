//! Persisted price records and scheduler bookkeeping.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::key::PriceKey;
use super::price::Price;

/// A confirmed price for one market item.
///
/// Created on the first successful fetch and only ever mutated by another
/// successful fetch. `last_scraped >= last_updated` and `update_count >= 1`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceRecord {
    pub key: PriceKey,
    pub price: Price,
    pub last_updated: DateTime<Utc>,
    pub last_scraped: DateTime<Utc>,
    pub update_count: u32,
}

impl PriceRecord {
    /// Record produced by the first successful fetch of a key.
    #[must_use]
    pub fn first_fetch(key: PriceKey, price: Price, now: DateTime<Utc>) -> Self {
        Self {
            key,
            price,
            last_updated: now,
            last_scraped: now,
            update_count: 1,
        }
    }

    /// Record after another successful fetch.
    #[must_use]
    pub fn refreshed(&self, price: Price, now: DateTime<Utc>) -> Self {
        Self {
            key: self.key.clone(),
            price,
            last_updated: now,
            last_scraped: now,
            update_count: self.update_count.saturating_add(1),
        }
    }
}

/// Single-row record of refresh scheduler runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshCursor {
    pub last_scheduler_run: DateTime<Utc>,
    pub next_scheduler_run: DateTime<Utc>,
}

impl RefreshCursor {
    /// Cursor written when a run finishes at `now`.
    #[must_use]
    pub fn after_run(now: DateTime<Utc>, period: Duration) -> Self {
        Self {
            last_scheduler_run: now,
            next_scheduler_run: now + period,
        }
    }
}

/// Aggregate figures over the persisted price table.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StoreStats {
    pub total_count: u64,
    /// Records whose `last_updated` falls inside the validity window.
    pub recently_updated_count: u64,
    /// Mean price rounded to two decimal places; zero for an empty table.
    pub average_price: Decimal,
    pub last_update: Option<DateTime<Utc>>,
}
