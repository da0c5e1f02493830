//! In-memory price store.
//!
//! Mirrors [`PriceStore`] with a plain map. The connection guard answers from it
//! while the persistent store is unreachable; tests also use it as a stand-in
//! for SQLite.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use rust_decimal::Decimal;

use crate::domain::{Price, PriceKey, PriceRecord, RefreshCursor, StoreStats};
use crate::error::StoreError;
use crate::port::PriceStore;

#[derive(Default)]
pub struct MemoryPriceStore {
    records: RwLock<HashMap<PriceKey, PriceRecord>>,
    cursor: RwLock<Option<RefreshCursor>>,
}

impl MemoryPriceStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop all records and the cursor.
    pub fn clear(&self) {
        self.records.write().clear();
        *self.cursor.write() = None;
    }
}

#[async_trait]
impl PriceStore for MemoryPriceStore {
    async fn get(&self, key: &PriceKey) -> Result<Option<PriceRecord>, StoreError> {
        Ok(self.records.read().get(key).cloned())
    }

    async fn upsert(
        &self,
        key: &PriceKey,
        price: Price,
        now: DateTime<Utc>,
    ) -> Result<PriceRecord, StoreError> {
        let mut records = self.records.write();
        let record = match records.get(key) {
            Some(existing) => existing.refreshed(price, now),
            None => PriceRecord::first_fetch(key.clone(), price, now),
        };
        records.insert(key.clone(), record.clone());
        Ok(record)
    }

    async fn list_stalest(&self, limit: usize) -> Result<Vec<PriceRecord>, StoreError> {
        let mut records: Vec<PriceRecord> = self.records.read().values().cloned().collect();
        records.sort_by(|a, b| {
            a.last_scraped
                .cmp(&b.last_scraped)
                .then_with(|| a.key.market_hash_name.cmp(&b.key.market_hash_name))
        });
        records.truncate(limit);
        Ok(records)
    }

    async fn stats(&self, fresh_since: DateTime<Utc>) -> Result<StoreStats, StoreError> {
        let records = self.records.read();
        let total = records.len() as u64;
        let recent = records
            .values()
            .filter(|r| r.last_updated >= fresh_since)
            .count() as u64;
        let sum: Decimal = records.values().map(|r| r.price.amount()).sum();
        let average_price = if total == 0 {
            Decimal::ZERO
        } else {
            (sum / Decimal::from(total)).round_dp(2)
        };

        Ok(StoreStats {
            total_count: total,
            recently_updated_count: recent,
            average_price,
            last_update: records.values().map(|r| r.last_updated).max(),
        })
    }

    async fn cursor(&self) -> Result<Option<RefreshCursor>, StoreError> {
        Ok(*self.cursor.read())
    }

    async fn save_cursor(&self, cursor: &RefreshCursor) -> Result<(), StoreError> {
        *self.cursor.write() = Some(*cursor);
        Ok(())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
