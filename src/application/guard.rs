//! Outage-tolerant access to the persistent store.
//!
//! [`ConnectionGuard`] owns the live store link and a standby table with the
//! same interface. Callers never see a connectivity error: when the live store
//! cannot answer, the call is served by the standby table and the guard reports
//! the degradation through [`StoreMode`]. A background reconciler probes the
//! live store and replays everything written during the outage.
//!
//! ```text
//!            ┌──────────── ConnectionGuard ─────────────┐
//! caller ──► │ live store (Online/Degraded) ─ timeout ──┼─► PriceStore
//!            │      │ ConnectionUnavailable             │
//!            │      ▼                                   │
//!            │ standby table (Offline)                  │
//!            └──────────────────────────────────────────┘
//! ```

use std::collections::HashSet;
use std::future::Future;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use tokio::sync::{watch, Notify, RwLock as GateLock};
use tracing::{debug, error, info, warn};

use crate::adapter::outbound::memory::MemoryPriceStore;
use crate::application::cache::MemoryCache;
use crate::domain::{Price, PriceKey, PriceRecord, RefreshCursor, StoreStats};
use crate::error::StoreError;
use crate::port::{PriceStore, SessionMode, StoreConnector};

/// Health of the persistent store as seen by the guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum StoreMode {
    /// Live store reachable.
    Online = 0,
    /// Live link exists but a recent call failed.
    Degraded = 1,
    /// No live link; everything is served by the standby table.
    Offline = 2,
}

impl StoreMode {
    const fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Online,
            1 => Self::Degraded,
            _ => Self::Offline,
        }
    }

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Online => "online",
            Self::Degraded => "degraded",
            Self::Offline => "offline",
        }
    }
}

impl std::fmt::Display for StoreMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a write landed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    Persisted(PriceRecord),
    /// Stored in the standby table; must be cached dirty until replayed.
    Deferred(PriceRecord),
}

impl WriteOutcome {
    #[must_use]
    pub fn record(&self) -> &PriceRecord {
        match self {
            Self::Persisted(record) | Self::Deferred(record) => record,
        }
    }

    #[must_use]
    pub fn into_record(self) -> PriceRecord {
        match self {
            Self::Persisted(record) | Self::Deferred(record) => record,
        }
    }

    #[must_use]
    pub const fn is_deferred(&self) -> bool {
        matches!(self, Self::Deferred(_))
    }
}

/// A record read through the guard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredRecord {
    pub record: PriceRecord,
    /// Served from the standby table rather than the live store.
    pub standby: bool,
}

/// Guard tuning.
#[derive(Debug, Clone)]
pub struct GuardSettings {
    /// Session modes to negotiate, in priority order.
    pub modes: Vec<SessionMode>,
    /// Upper bound for every live store call.
    pub operation_timeout: Duration,
    pub reconcile_interval: Duration,
}

impl Default for GuardSettings {
    fn default() -> Self {
        Self {
            modes: SessionMode::DEFAULT_ORDER.to_vec(),
            operation_timeout: Duration::from_secs(5),
            reconcile_interval: Duration::from_secs(30),
        }
    }
}

/// Mediates all persistent store access.
pub struct ConnectionGuard {
    connector: Arc<dyn StoreConnector>,
    settings: GuardSettings,
    cache: Arc<MemoryCache>,
    live: RwLock<Option<Arc<dyn PriceStore>>>,
    /// First session mode that connected; later reconnects use only this one.
    negotiated: Mutex<Option<SessionMode>>,
    standby: MemoryPriceStore,
    mode: AtomicU8,
    /// Held shared by writes and exclusively by replay.
    write_gate: GateLock<()>,
    wake: Notify,
}

impl ConnectionGuard {
    /// Create a guard with no live link. Call [`connect`](Self::connect) to negotiate.
    #[must_use]
    pub fn new(
        connector: Arc<dyn StoreConnector>,
        cache: Arc<MemoryCache>,
        settings: GuardSettings,
    ) -> Self {
        Self {
            connector,
            settings,
            cache,
            live: RwLock::new(None),
            negotiated: Mutex::new(None),
            standby: MemoryPriceStore::new(),
            mode: AtomicU8::new(StoreMode::Offline as u8),
            write_gate: GateLock::new(()),
            wake: Notify::new(),
        }
    }

    /// Negotiate the live link. Falls back to `Offline` if every mode fails.
    pub async fn connect(&self) -> StoreMode {
        match self.negotiate().await {
            Ok(store) => {
                *self.live.write() = Some(store);
                self.set_mode(StoreMode::Online);
            }
            Err(e) => {
                warn!(error = %e, "Persistent store unavailable, starting offline");
                self.set_mode(StoreMode::Offline);
            }
        }
        self.mode()
    }

    #[must_use]
    pub fn mode(&self) -> StoreMode {
        StoreMode::from_u8(self.mode.load(Ordering::Acquire))
    }

    /// Session mode cached by the first successful negotiation.
    #[must_use]
    pub fn session_mode(&self) -> Option<SessionMode> {
        *self.negotiated.lock()
    }

    /// Number of records waiting in the standby table.
    #[must_use]
    pub fn standby_len(&self) -> usize {
        self.standby.len()
    }

    /// Drop the live link. The next reconciliation reconnects.
    pub fn force_offline(&self) {
        *self.live.write() = None;
        self.set_mode(StoreMode::Offline);
        warn!("Persistent store forced offline");
    }

    fn set_mode(&self, mode: StoreMode) {
        let previous = StoreMode::from_u8(self.mode.swap(mode as u8, Ordering::AcqRel));
        if previous != mode {
            info!(from = %previous, to = %mode, "Store mode changed");
        }
    }

    fn live_store(&self) -> Option<Arc<dyn PriceStore>> {
        self.live.read().clone()
    }

    async fn negotiate(&self) -> Result<Arc<dyn PriceStore>, StoreError> {
        let cached = *self.negotiated.lock();
        let candidates = match cached {
            Some(mode) => vec![mode],
            None => self.settings.modes.clone(),
        };

        let mut last_error =
            StoreError::ConnectionUnavailable("no session modes configured".to_string());
        for mode in candidates {
            let attempt = async {
                let store = self.connector.connect(mode).await?;
                store.ping().await?;
                Ok::<_, StoreError>(store)
            };
            match self.bounded("connect", attempt).await {
                Ok(store) => {
                    if cached.is_none() {
                        info!(mode = %mode, "Negotiated store session mode");
                        *self.negotiated.lock() = Some(mode);
                    }
                    return Ok(store);
                }
                Err(e) => {
                    warn!(mode = %mode, error = %e, "Store session mode refused");
                    last_error = e;
                }
            }
        }
        Err(last_error)
    }

    async fn bounded<T>(
        &self,
        op: &'static str,
        fut: impl Future<Output = Result<T, StoreError>>,
    ) -> Result<T, StoreError> {
        let limit = self.settings.operation_timeout;
        match tokio::time::timeout(limit, fut).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::ConnectionUnavailable(format!(
                "{op} timed out after {limit:?}"
            ))),
        }
    }

    /// Run `op` against the live store.
    ///
    /// Returns `None` when the caller must fall back to the standby table.
    async fn on_live<T, F, Fut>(&self, name: &'static str, op: F) -> Option<Result<T, StoreError>>
    where
        F: FnOnce(Arc<dyn PriceStore>) -> Fut,
        Fut: Future<Output = Result<T, StoreError>>,
    {
        let store = self.live_store()?;
        match self.bounded(name, op(store)).await {
            Err(StoreError::ConnectionUnavailable(reason)) => {
                if self.mode() == StoreMode::Online {
                    self.set_mode(StoreMode::Degraded);
                }
                warn!(op = name, reason = %reason, "Live store call failed, using standby");
                self.wake.notify_one();
                None
            }
            other => Some(other),
        }
    }

    /// Read a record, preferring whichever copy was updated last.
    ///
    /// # Errors
    /// Returns `IntegrityViolation` if the live store holds a corrupt row.
    pub async fn get(&self, key: &PriceKey) -> Result<Option<StoredRecord>, StoreError> {
        let live = match self.on_live("get", |s| async move { s.get(key).await }).await {
            Some(result) => result?,
            None => None,
        };
        let standby = if self.standby.is_empty() {
            None
        } else {
            self.standby.get(key).await?
        };

        Ok(match (live, standby) {
            (Some(live), Some(standby)) if standby.last_updated > live.last_updated => {
                Some(StoredRecord {
                    record: standby,
                    standby: true,
                })
            }
            (Some(live), _) => Some(StoredRecord {
                record: live,
                standby: false,
            }),
            (None, Some(standby)) => Some(StoredRecord {
                record: standby,
                standby: true,
            }),
            (None, None) => None,
        })
    }

    /// Write a fetched price.
    ///
    /// # Errors
    /// Returns `IntegrityViolation` if the live store rejects the record.
    pub async fn upsert(
        &self,
        key: &PriceKey,
        price: Price,
        now: DateTime<Utc>,
    ) -> Result<WriteOutcome, StoreError> {
        let _gate = self.write_gate.read().await;
        if let Some(result) = self
            .on_live("upsert", |s| async move { s.upsert(key, price, now).await })
            .await
        {
            return result.map(WriteOutcome::Persisted);
        }
        let record = self.standby.upsert(key, price, now).await?;
        debug!(item = %key, "Write deferred to standby table");
        Ok(WriteOutcome::Deferred(record))
    }

    /// # Errors
    /// Returns `IntegrityViolation` if a stored row is corrupt.
    pub async fn list_stalest(&self, limit: usize) -> Result<Vec<PriceRecord>, StoreError> {
        match self
            .on_live("list_stalest", |s| async move { s.list_stalest(limit).await })
            .await
        {
            Some(result) => result,
            None => self.standby.list_stalest(limit).await,
        }
    }

    /// # Errors
    /// Returns `IntegrityViolation` if a stored row is corrupt.
    pub async fn stats(&self, fresh_since: DateTime<Utc>) -> Result<StoreStats, StoreError> {
        match self
            .on_live("stats", |s| async move { s.stats(fresh_since).await })
            .await
        {
            Some(result) => result,
            None => self.standby.stats(fresh_since).await,
        }
    }

    /// # Errors
    /// Returns `IntegrityViolation` if the stored cursor is corrupt.
    pub async fn cursor(&self) -> Result<Option<RefreshCursor>, StoreError> {
        let live = match self.on_live("cursor", |s| async move { s.cursor().await }).await {
            Some(result) => result?,
            None => None,
        };
        let standby = self.standby.cursor().await?;
        Ok(match (live, standby) {
            (Some(live), Some(standby)) => Some(
                if standby.last_scheduler_run > live.last_scheduler_run {
                    standby
                } else {
                    live
                },
            ),
            (live, standby) => live.or(standby),
        })
    }

    /// # Errors
    /// Returns `IntegrityViolation` if the live store rejects the cursor.
    pub async fn save_cursor(&self, cursor: &RefreshCursor) -> Result<(), StoreError> {
        let _gate = self.write_gate.read().await;
        match self
            .on_live("save_cursor", |s| async move { s.save_cursor(cursor).await })
            .await
        {
            Some(result) => result,
            None => self.standby.save_cursor(cursor).await,
        }
    }

    /// Probe the live store and replay everything written during an outage.
    ///
    /// Returns the number of records written back.
    ///
    /// # Errors
    /// Returns `ConnectionUnavailable` if the live store is still unreachable.
    pub async fn reconcile(&self) -> Result<usize, StoreError> {
        if self.mode() == StoreMode::Online
            && self.cache.dirty_count() == 0
            && self.standby.is_empty()
        {
            return Ok(0);
        }

        let store = match self.live_store() {
            Some(store) => {
                let probe = Arc::clone(&store);
                self.bounded("ping", async move { probe.ping().await }).await?;
                store
            }
            None => {
                let store = self.negotiate().await?;
                *self.live.write() = Some(Arc::clone(&store));
                store
            }
        };

        let _gate = self.write_gate.write().await;
        let flushed = match self.replay(store.as_ref()).await {
            Ok(flushed) => flushed,
            Err(e) => {
                self.set_mode(StoreMode::Degraded);
                return Err(e);
            }
        };
        self.standby.clear();
        self.set_mode(StoreMode::Online);
        if flushed > 0 {
            info!(flushed, "Replayed deferred writes to persistent store");
        }
        Ok(flushed)
    }

    async fn replay(&self, store: &dyn PriceStore) -> Result<usize, StoreError> {
        let mut replayed = HashSet::new();
        let mut flushed = 0;

        for entry in self.cache.dirty_entries() {
            let record = entry.record;
            if let Some(live) = self.superseded(store, &record).await? {
                debug!(item = %record.key, "Live store already newer, skipping deferred write");
                self.cache.mark_clean(&record.key, entry.dirty_seq, live);
                replayed.insert(record.key);
                continue;
            }
            let result = self
                .bounded(
                    "replay",
                    store.upsert(&record.key, record.price, record.last_updated),
                )
                .await;
            match result {
                Ok(persisted) => {
                    self.cache.mark_clean(&record.key, entry.dirty_seq, persisted);
                    flushed += 1;
                }
                Err(StoreError::IntegrityViolation(reason)) => {
                    error!(item = %record.key, reason = %reason, "Dropping deferred write");
                    self.cache
                        .mark_clean(&record.key, entry.dirty_seq, record.clone());
                }
                Err(e) => return Err(e),
            }
            replayed.insert(record.key);
        }

        // Deferred writes whose cache entry was evicted before the store came back.
        let mut orphans = self.standby.list_stalest(usize::MAX).await?;
        orphans.retain(|record| !replayed.contains(&record.key));
        orphans.sort_by_key(|record| record.last_updated);
        for record in orphans {
            if self.superseded(store, &record).await?.is_some() {
                debug!(item = %record.key, "Live store already newer, skipping deferred write");
                continue;
            }
            let result = self
                .bounded(
                    "replay",
                    store.upsert(&record.key, record.price, record.last_updated),
                )
                .await;
            match result {
                Ok(_) => flushed += 1,
                Err(StoreError::IntegrityViolation(reason)) => {
                    error!(item = %record.key, reason = %reason, "Dropping deferred write");
                }
                Err(e) => return Err(e),
            }
        }

        if let Some(cursor) = self.standby.cursor().await? {
            self.bounded("replay_cursor", store.save_cursor(&cursor))
                .await?;
        }
        Ok(flushed)
    }

    /// The live record for `deferred.key` if it is at least as recent as `deferred`.
    ///
    /// Covers writes that reached the live store after the deferral, including
    /// a timed-out upsert that committed anyway.
    async fn superseded(
        &self,
        store: &dyn PriceStore,
        deferred: &PriceRecord,
    ) -> Result<Option<PriceRecord>, StoreError> {
        match self.bounded("replay_read", store.get(&deferred.key)).await {
            Ok(Some(live)) if live.last_updated >= deferred.last_updated => Ok(Some(live)),
            Ok(_) | Err(StoreError::IntegrityViolation(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Reconcile on a fixed interval, or sooner when a live call fails.
    pub async fn run_reconciler(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(self.settings.reconcile_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        interval.tick().await;

        loop {
            tokio::select! {
                result = shutdown.changed() => {
                    if result.is_err() || *shutdown.borrow() {
                        debug!("Reconciler stopping");
                        break;
                    }
                    continue;
                }
                _ = interval.tick() => {}
                () = self.wake.notified() => {}
            }

            if let Err(e) = self.reconcile().await {
                debug!(error = %e, mode = %self.mode(), "Persistent store still unavailable");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::store::FlakyConnector;
    use crate::domain::Exterior;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn key(name: &str) -> PriceKey {
        PriceKey::new(name, Exterior::FactoryNew, false, 730)
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 6, 1, 0, 0, 0).unwrap()
    }

    fn price(amount: rust_decimal::Decimal) -> Price {
        Price::new(amount).unwrap()
    }

    fn guard(connector: &Arc<FlakyConnector>) -> (ConnectionGuard, Arc<MemoryCache>) {
        let cache = Arc::new(MemoryCache::new(64, 4));
        let guard = ConnectionGuard::new(
            Arc::clone(connector) as Arc<dyn StoreConnector>,
            Arc::clone(&cache),
            GuardSettings {
                operation_timeout: Duration::from_millis(500),
                ..GuardSettings::default()
            },
        );
        (guard, cache)
    }

    #[tokio::test]
    async fn negotiation_caches_first_working_mode() {
        let connector = Arc::new(FlakyConnector::new());
        connector.refuse_mode(SessionMode::Strict);
        let (guard, _) = guard(&connector);

        assert_eq!(guard.connect().await, StoreMode::Online);
        assert_eq!(guard.session_mode(), Some(SessionMode::Relaxed));
        assert_eq!(
            connector.attempts(),
            vec![SessionMode::Strict, SessionMode::Relaxed]
        );

        guard.force_offline();
        assert_eq!(guard.reconcile().await.unwrap(), 0);
        assert_eq!(guard.mode(), StoreMode::Online);
        assert_eq!(
            connector.attempts(),
            vec![SessionMode::Strict, SessionMode::Relaxed, SessionMode::Relaxed]
        );
    }

    #[tokio::test]
    async fn all_modes_refused_starts_offline() {
        let connector = Arc::new(FlakyConnector::new());
        connector.set_available(false);
        let (guard, _) = guard(&connector);

        assert_eq!(guard.connect().await, StoreMode::Offline);
        assert_eq!(guard.session_mode(), None);
        assert_eq!(connector.attempts().len(), 3);

        let outcome = guard.upsert(&key("A"), price(dec!(1)), t0()).await.unwrap();
        assert!(outcome.is_deferred());
        assert_eq!(guard.standby_len(), 1);
    }

    #[tokio::test]
    async fn live_failure_degrades_and_serves_standby() {
        let connector = Arc::new(FlakyConnector::new());
        let (guard, _) = guard(&connector);
        guard.connect().await;

        connector.set_available(false);
        let outcome = guard.upsert(&key("A"), price(dec!(2)), t0()).await.unwrap();
        assert!(outcome.is_deferred());
        assert_eq!(guard.mode(), StoreMode::Degraded);

        let read = guard.get(&key("A")).await.unwrap().unwrap();
        assert!(read.standby);
        assert_eq!(read.record.price, price(dec!(2)));
    }

    #[tokio::test]
    async fn reconcile_replays_dirty_entries_once() {
        let connector = Arc::new(FlakyConnector::new());
        let (guard, cache) = guard(&connector);
        guard.connect().await;
        guard.force_offline();

        for (name, amount) in [("B", dec!(2)), ("A", dec!(1))] {
            let outcome = guard.upsert(&key(name), price(amount), t0()).await.unwrap();
            cache.put(outcome.into_record(), true);
        }
        assert_eq!(cache.dirty_count(), 2);

        assert_eq!(guard.reconcile().await.unwrap(), 2);
        assert_eq!(guard.mode(), StoreMode::Online);
        assert_eq!(cache.dirty_count(), 0);
        assert_eq!(guard.standby_len(), 0);
        assert_eq!(connector.upserted_keys(), vec![key("B"), key("A")]);

        assert_eq!(guard.reconcile().await.unwrap(), 0);
        assert_eq!(connector.upserted_keys().len(), 2);
    }

    #[tokio::test]
    async fn reconcile_replays_evicted_standby_writes() {
        let connector = Arc::new(FlakyConnector::new());
        let (guard, cache) = guard(&connector);
        guard.connect().await;
        guard.force_offline();

        guard.upsert(&key("Evicted"), price(dec!(5)), t0()).await.unwrap();
        assert_eq!(cache.dirty_count(), 0);

        assert_eq!(guard.reconcile().await.unwrap(), 1);
        let stored = connector.backend().get(&key("Evicted")).await.unwrap();
        assert_eq!(stored.unwrap().price, price(dec!(5)));
    }

    #[tokio::test]
    async fn failed_probe_keeps_entries_dirty() {
        let connector = Arc::new(FlakyConnector::new());
        let (guard, cache) = guard(&connector);
        guard.connect().await;

        connector.set_available(false);
        let outcome = guard.upsert(&key("A"), price(dec!(1)), t0()).await.unwrap();
        cache.put(outcome.into_record(), true);

        assert!(guard.reconcile().await.is_err());
        assert_eq!(cache.dirty_count(), 1);
        assert_eq!(guard.mode(), StoreMode::Degraded);

        connector.set_available(true);
        assert_eq!(guard.reconcile().await.unwrap(), 1);
        assert_eq!(cache.dirty_count(), 0);
    }

    #[tokio::test]
    async fn offline_cursor_is_replayed() {
        let connector = Arc::new(FlakyConnector::new());
        let (guard, _) = guard(&connector);
        guard.connect().await;
        guard.force_offline();

        let cursor = RefreshCursor::after_run(t0(), chrono::Duration::days(7));
        guard.save_cursor(&cursor).await.unwrap();
        assert_eq!(guard.cursor().await.unwrap(), Some(cursor));

        guard.reconcile().await.unwrap();
        assert_eq!(connector.backend().cursor().await.unwrap(), Some(cursor));
    }

    #[tokio::test]
    async fn replay_does_not_overwrite_a_newer_live_write() {
        let connector = Arc::new(FlakyConnector::new());
        let (guard, cache) = guard(&connector);
        guard.connect().await;

        connector.set_available(false);
        let deferred = guard.upsert(&key("K"), price(dec!(1)), t0()).await.unwrap();
        assert!(deferred.is_deferred());

        // The link recovers before the reconciler runs and a newer fetch lands live.
        connector.set_available(true);
        let later = t0() + chrono::Duration::hours(1);
        let persisted = guard.upsert(&key("K"), price(dec!(99)), later).await.unwrap();
        assert!(!persisted.is_deferred());
        cache.put(persisted.into_record(), false);

        assert_eq!(guard.reconcile().await.unwrap(), 0);
        let live = connector.backend().get(&key("K")).await.unwrap().unwrap();
        assert_eq!(live.price, price(dec!(99)));
        assert_eq!(live.last_updated, later);
        assert_eq!(cache.peek(&key("K")).unwrap().record.price, price(dec!(99)));
        assert_eq!(guard.standby_len(), 0);
    }

    #[tokio::test]
    async fn dirty_entry_already_committed_live_is_not_replayed() {
        let connector = Arc::new(FlakyConnector::new());
        let (guard, cache) = guard(&connector);
        guard.connect().await;

        // A write that timed out for the guard but committed in the store.
        let committed = connector
            .backend()
            .upsert(&key("K"), price(dec!(4)), t0())
            .await
            .unwrap();
        cache.put(committed.clone(), true);

        assert_eq!(guard.reconcile().await.unwrap(), 0);
        assert!(connector.upserted_keys().is_empty());
        let entry = cache.peek(&key("K")).unwrap();
        assert!(!entry.dirty);
        assert_eq!(entry.record, committed);
    }

    #[tokio::test]
    async fn rejected_replay_is_dropped_and_not_retried() {
        let connector = Arc::new(FlakyConnector::new());
        let (guard, cache) = guard(&connector);
        guard.connect().await;
        guard.force_offline();

        for name in ["Bad", "Good"] {
            let outcome = guard.upsert(&key(name), price(dec!(3)), t0()).await.unwrap();
            cache.put(outcome.into_record(), true);
        }
        connector.reject_key(&key("Bad"));

        assert_eq!(guard.reconcile().await.unwrap(), 1);
        assert_eq!(guard.mode(), StoreMode::Online);
        assert_eq!(cache.dirty_count(), 0);
        assert_eq!(guard.standby_len(), 0);
        assert!(connector.backend().get(&key("Bad")).await.unwrap().is_none());
        assert!(connector.backend().get(&key("Good")).await.unwrap().is_some());

        guard.force_offline();
        guard.reconcile().await.unwrap();
        assert_eq!(connector.upserted_keys(), vec![key("Bad"), key("Good")]);
    }

    #[tokio::test]
    async fn cursor_save_waits_for_replay() {
        let connector = Arc::new(FlakyConnector::new());
        let (guard, _) = guard(&connector);
        guard.connect().await;

        let gate = guard.write_gate.write().await;
        let cursor = RefreshCursor::after_run(t0(), chrono::Duration::days(7));
        let save = guard.save_cursor(&cursor);
        tokio::pin!(save);
        assert!(
            tokio::time::timeout(Duration::from_millis(50), &mut save)
                .await
                .is_err()
        );

        drop(gate);
        save.await.unwrap();
        assert_eq!(connector.backend().cursor().await.unwrap(), Some(cursor));
    }
}
