//! Store connector with a kill switch for outage tests.
//!
//! [`FlakyConnector`] hands out [`FlakyStore`]s that all share one in-memory
//! backend. Flipping [`FlakyConnector::set_available`] makes every store call
//! and every new connection fail with `ConnectionUnavailable`;
//! [`FlakyConnector::reject_key`] makes writes of one key fail with
//! `IntegrityViolation`.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use crate::adapter::outbound::memory::MemoryPriceStore;
use crate::domain::{Price, PriceKey, PriceRecord, RefreshCursor, StoreStats};
use crate::error::StoreError;
use crate::port::{PriceStore, SessionMode, StoreConnector};

// ---------------------------------------------------------------------------
// FlakyConnector
// ---------------------------------------------------------------------------

/// A [`StoreConnector`] backed by one shared [`MemoryPriceStore`].
pub struct FlakyConnector {
    backend: Arc<MemoryPriceStore>,
    available: Arc<AtomicBool>,
    refused: Mutex<HashSet<SessionMode>>,
    attempts: Mutex<Vec<SessionMode>>,
    upserts: Arc<Mutex<Vec<PriceKey>>>,
    rejected: Arc<Mutex<HashSet<PriceKey>>>,
}

impl Default for FlakyConnector {
    fn default() -> Self {
        Self::new()
    }
}

impl FlakyConnector {
    pub fn new() -> Self {
        Self {
            backend: Arc::new(MemoryPriceStore::new()),
            available: Arc::new(AtomicBool::new(true)),
            refused: Mutex::new(HashSet::new()),
            attempts: Mutex::new(Vec::new()),
            upserts: Arc::new(Mutex::new(Vec::new())),
            rejected: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Switch the simulated database on or off.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Fail every connection attempt using `mode`.
    pub fn refuse_mode(&self, mode: SessionMode) {
        self.refused.lock().insert(mode);
    }

    /// Fail every write of `key` with a constraint violation.
    pub fn reject_key(&self, key: &PriceKey) {
        self.rejected.lock().insert(key.clone());
    }

    /// Session modes tried so far, in order.
    pub fn attempts(&self) -> Vec<SessionMode> {
        self.attempts.lock().clone()
    }

    /// Keys of every upsert attempted through a reachable store, in order.
    pub fn upserted_keys(&self) -> Vec<PriceKey> {
        self.upserts.lock().clone()
    }

    /// The shared backend, bypassing the kill switch.
    pub fn backend(&self) -> Arc<MemoryPriceStore> {
        Arc::clone(&self.backend)
    }
}

#[async_trait]
impl StoreConnector for FlakyConnector {
    async fn connect(&self, mode: SessionMode) -> Result<Arc<dyn PriceStore>, StoreError> {
        self.attempts.lock().push(mode);
        if !self.available.load(Ordering::SeqCst) {
            return Err(StoreError::ConnectionUnavailable(
                "simulated outage".to_string(),
            ));
        }
        if self.refused.lock().contains(&mode) {
            return Err(StoreError::ConnectionUnavailable(format!(
                "{mode} session refused"
            )));
        }
        Ok(Arc::new(FlakyStore {
            backend: Arc::clone(&self.backend),
            available: Arc::clone(&self.available),
            upserts: Arc::clone(&self.upserts),
            rejected: Arc::clone(&self.rejected),
        }))
    }
}

// ---------------------------------------------------------------------------
// FlakyStore
// ---------------------------------------------------------------------------

/// A [`PriceStore`] that fails while its connector is switched off.
pub struct FlakyStore {
    backend: Arc<MemoryPriceStore>,
    available: Arc<AtomicBool>,
    upserts: Arc<Mutex<Vec<PriceKey>>>,
    rejected: Arc<Mutex<HashSet<PriceKey>>>,
}

impl FlakyStore {
    fn check(&self) -> Result<(), StoreError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::ConnectionUnavailable(
                "simulated outage".to_string(),
            ))
        }
    }
}

#[async_trait]
impl PriceStore for FlakyStore {
    async fn get(&self, key: &PriceKey) -> Result<Option<PriceRecord>, StoreError> {
        self.check()?;
        self.backend.get(key).await
    }

    async fn upsert(
        &self,
        key: &PriceKey,
        price: Price,
        now: DateTime<Utc>,
    ) -> Result<PriceRecord, StoreError> {
        self.check()?;
        self.upserts.lock().push(key.clone());
        if self.rejected.lock().contains(key) {
            return Err(StoreError::IntegrityViolation(format!(
                "CHECK constraint failed for {key}"
            )));
        }
        self.backend.upsert(key, price, now).await
    }

    async fn list_stalest(&self, limit: usize) -> Result<Vec<PriceRecord>, StoreError> {
        self.check()?;
        self.backend.list_stalest(limit).await
    }

    async fn stats(&self, fresh_since: DateTime<Utc>) -> Result<StoreStats, StoreError> {
        self.check()?;
        self.backend.stats(fresh_since).await
    }

    async fn cursor(&self) -> Result<Option<RefreshCursor>, StoreError> {
        self.check()?;
        self.backend.cursor().await
    }

    async fn save_cursor(&self, cursor: &RefreshCursor) -> Result<(), StoreError> {
        self.check()?;
        self.backend.save_cursor(cursor).await
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.check()
    }
}
