//! Tiered price lookup.
//!
//! Memory cache first, then the persistent store through the connection
//! guard, and only then a coalesced external lookup whose result is written
//! back to both tiers. Staleness is judged separately at each tier.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::Semaphore;
use tracing::{debug, error, warn};

use crate::application::cache::MemoryCache;
use crate::application::coalesce::RequestCoalescer;
use crate::application::guard::{ConnectionGuard, WriteOutcome};
use crate::domain::{Price, PriceKey, PriceRecord, StalenessPolicy};
use crate::error::FetchError;
use crate::port::{Clock, PriceFetcher};

/// Which tier answered a lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Memory,
    Store,
    Fetched,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub record: PriceRecord,
    pub tier: Tier,
}

#[derive(Debug, Clone)]
pub struct ResolverSettings {
    pub staleness: StalenessPolicy,
    /// Upper bound for one external lookup.
    pub fetch_timeout: Duration,
    /// External lookups allowed to run at once.
    pub max_concurrent_fetches: usize,
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self {
            staleness: StalenessPolicy::default(),
            fetch_timeout: Duration::from_secs(20),
            max_concurrent_fetches: 8,
        }
    }
}

/// Fetch, persist and cache one key. Runs inside a coalesced flight.
#[derive(Clone)]
struct WriteBack {
    fetcher: Arc<dyn PriceFetcher>,
    guard: Arc<ConnectionGuard>,
    cache: Arc<MemoryCache>,
    clock: Arc<dyn Clock>,
    permits: Arc<Semaphore>,
    timeout: Duration,
}

impl WriteBack {
    async fn execute(self, key: PriceKey) -> Result<PriceRecord, FetchError> {
        let permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| FetchError::Aborted("fetch pool closed".to_string()))?;
        let price = match tokio::time::timeout(self.timeout, self.fetcher.fetch_price(&key)).await
        {
            Ok(result) => result?,
            Err(_) => return Err(FetchError::Timeout(self.timeout)),
        };
        drop(permit);

        let now = self.clock.now();
        match self.guard.upsert(&key, price, now).await {
            Ok(WriteOutcome::Persisted(record)) => {
                self.cache.put(record.clone(), false);
                Ok(record)
            }
            Ok(WriteOutcome::Deferred(record)) => {
                self.cache.put(record.clone(), true);
                Ok(record)
            }
            Err(e) => {
                error!(item = %key, error = %e, "Store rejected fetched price, not caching");
                Ok(PriceRecord::first_fetch(key, price, now))
            }
        }
    }
}

/// Public entry point for price lookups.
pub struct PriceResolver {
    cache: Arc<MemoryCache>,
    guard: Arc<ConnectionGuard>,
    coalescer: RequestCoalescer<PriceRecord>,
    write_back: WriteBack,
    staleness: StalenessPolicy,
    clock: Arc<dyn Clock>,
}

impl PriceResolver {
    #[must_use]
    pub fn new(
        cache: Arc<MemoryCache>,
        guard: Arc<ConnectionGuard>,
        fetcher: Arc<dyn PriceFetcher>,
        clock: Arc<dyn Clock>,
        settings: ResolverSettings,
    ) -> Self {
        let write_back = WriteBack {
            fetcher,
            guard: Arc::clone(&guard),
            cache: Arc::clone(&cache),
            clock: Arc::clone(&clock),
            permits: Arc::new(Semaphore::new(settings.max_concurrent_fetches.max(1))),
            timeout: settings.fetch_timeout,
        };
        Self {
            cache,
            guard,
            coalescer: RequestCoalescer::new(),
            write_back,
            staleness: settings.staleness,
            clock,
        }
    }

    /// Current price for `key`.
    ///
    /// # Errors
    /// Returns `FetchError` when no fresh price is cached or stored and the
    /// external lookup fails.
    pub async fn get_price(&self, key: &PriceKey) -> Result<Price, FetchError> {
        self.resolve(key).await.map(|resolution| resolution.record.price)
    }

    /// Current record for `key` together with the tier that produced it.
    ///
    /// # Errors
    /// Returns `FetchError` when the external lookup is needed and fails.
    pub async fn resolve(&self, key: &PriceKey) -> Result<Resolution, FetchError> {
        let now = self.clock.now();

        if let Some(entry) = self.cache.get(key) {
            if !self.staleness.is_stale(&entry.record, now) {
                debug!(item = %key, "Memory cache hit");
                return Ok(Resolution {
                    record: entry.record,
                    tier: Tier::Memory,
                });
            }
        }

        match self.guard.get(key).await {
            Ok(Some(stored)) if !self.staleness.is_stale(&stored.record, now) => {
                debug!(item = %key, standby = stored.standby, "Store hit");
                self.cache.put(stored.record.clone(), stored.standby);
                return Ok(Resolution {
                    record: stored.record,
                    tier: Tier::Store,
                });
            }
            Ok(_) => {}
            Err(e) => warn!(item = %key, error = %e, "Unreadable stored record, treating as miss"),
        }

        let record = self.fetch(key).await?;
        Ok(Resolution {
            record,
            tier: Tier::Fetched,
        })
    }

    /// Fetch and write back `key` regardless of what the tiers hold.
    ///
    /// Joins an in-flight lookup for the same key instead of starting another.
    ///
    /// # Errors
    /// Returns the external lookup's `FetchError`.
    pub async fn refresh(&self, key: &PriceKey) -> Result<PriceRecord, FetchError> {
        self.fetch(key).await
    }

    async fn fetch(&self, key: &PriceKey) -> Result<PriceRecord, FetchError> {
        let write_back = self.write_back.clone();
        let owned = key.clone();
        self.coalescer
            .run(key, move || write_back.execute(owned))
            .await
    }

    #[must_use]
    pub fn cache(&self) -> &Arc<MemoryCache> {
        &self.cache
    }

    #[must_use]
    pub fn guard(&self) -> &Arc<ConnectionGuard> {
        &self.guard
    }

    #[must_use]
    pub fn staleness(&self) -> StalenessPolicy {
        self.staleness
    }

    #[must_use]
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::guard::{GuardSettings, StoreMode};
    use crate::port::{PriceStore, StoreConnector};
    use crate::testkit::clock::ManualClock;
    use crate::testkit::domain::{epoch, key, price, redline};
    use crate::testkit::fetcher::ScriptedFetcher;
    use crate::testkit::store::FlakyConnector;
    use chrono::Duration as ChronoDuration;
    use rust_decimal_macros::dec;

    struct Fixture {
        resolver: PriceResolver,
        fetcher: Arc<ScriptedFetcher>,
        connector: Arc<FlakyConnector>,
        clock: Arc<ManualClock>,
    }

    async fn fixture(fetcher: ScriptedFetcher) -> Fixture {
        let connector = Arc::new(FlakyConnector::new());
        let cache = Arc::new(MemoryCache::new(128, 4));
        let guard = Arc::new(ConnectionGuard::new(
            Arc::clone(&connector) as Arc<dyn StoreConnector>,
            Arc::clone(&cache),
            GuardSettings::default(),
        ));
        guard.connect().await;
        let fetcher = Arc::new(fetcher);
        let clock = Arc::new(ManualClock::new(epoch()));
        let resolver = PriceResolver::new(
            cache,
            guard,
            Arc::clone(&fetcher) as Arc<dyn PriceFetcher>,
            Arc::clone(&clock) as Arc<dyn Clock>,
            ResolverSettings {
                fetch_timeout: Duration::from_millis(200),
                ..ResolverSettings::default()
            },
        );
        Fixture {
            resolver,
            fetcher,
            connector,
            clock,
        }
    }

    #[tokio::test]
    async fn second_lookup_is_served_from_memory() {
        let fetcher = ScriptedFetcher::new();
        fetcher.set_price(&redline(), price(dec!(12.50)));
        let fx = fixture(fetcher).await;

        let first = fx.resolver.resolve(&redline()).await.unwrap();
        assert_eq!(first.tier, Tier::Fetched);
        let second = fx.resolver.resolve(&redline()).await.unwrap();
        assert_eq!(second.tier, Tier::Memory);
        assert_eq!(second.record.price, first.record.price);
        assert_eq!(fx.fetcher.calls(), 1);
    }

    #[tokio::test]
    async fn fresh_stored_record_fills_the_cache() {
        let fx = fixture(ScriptedFetcher::new()).await;
        fx.connector
            .backend()
            .upsert(&redline(), price(dec!(9)), epoch() - ChronoDuration::days(2))
            .await
            .unwrap();

        let resolution = fx.resolver.resolve(&redline()).await.unwrap();
        assert_eq!(resolution.tier, Tier::Store);
        assert!(fx.resolver.cache().peek(&redline()).is_some());
        assert_eq!(fx.fetcher.calls(), 0);
    }

    #[tokio::test]
    async fn stale_stored_record_is_refetched() {
        let fetcher = ScriptedFetcher::new();
        fetcher.set_price(&redline(), price(dec!(14)));
        let fx = fixture(fetcher).await;
        fx.connector
            .backend()
            .upsert(&redline(), price(dec!(9)), epoch() - ChronoDuration::days(8))
            .await
            .unwrap();

        let resolution = fx.resolver.resolve(&redline()).await.unwrap();
        assert_eq!(resolution.tier, Tier::Fetched);
        assert_eq!(resolution.record.price, price(dec!(14)));
        assert_eq!(resolution.record.update_count, 2);
    }

    #[tokio::test]
    async fn failed_lookup_is_not_cached() {
        let fetcher = ScriptedFetcher::new();
        fetcher.set_error(&redline(), FetchError::Upstream("429".to_string()));
        let fx = fixture(fetcher).await;

        assert!(fx.resolver.get_price(&redline()).await.is_err());
        assert!(fx.resolver.cache().peek(&redline()).is_none());
        assert!(fx.connector.backend().is_empty());
        assert!(fx.resolver.get_price(&redline()).await.is_err());
        assert_eq!(fx.fetcher.calls(), 2);
    }

    #[tokio::test]
    async fn rejected_write_returns_the_price_uncached() {
        let fetcher = ScriptedFetcher::new();
        fetcher.set_price(&redline(), price(dec!(12.50)));
        let fx = fixture(fetcher).await;
        fx.connector.reject_key(&redline());

        let resolution = fx.resolver.resolve(&redline()).await.unwrap();
        assert_eq!(resolution.tier, Tier::Fetched);
        assert_eq!(resolution.record.price, price(dec!(12.50)));
        assert_eq!(fx.resolver.guard().mode(), StoreMode::Online);
        assert!(fx.resolver.cache().peek(&redline()).is_none());
        assert!(fx.connector.backend().is_empty());

        fx.resolver.get_price(&redline()).await.unwrap();
        assert_eq!(fx.fetcher.calls(), 2);
    }

    #[tokio::test]
    async fn slow_lookup_times_out() {
        let fetcher = ScriptedFetcher::new().with_latency(Duration::from_secs(5));
        fetcher.set_price(&redline(), price(dec!(1)));
        let fx = fixture(fetcher).await;

        let result = fx.resolver.get_price(&redline()).await;
        assert_eq!(result, Err(FetchError::Timeout(Duration::from_millis(200))));
    }

    #[tokio::test]
    async fn offline_write_back_is_cached_dirty() {
        let fetcher = ScriptedFetcher::new();
        fetcher.set_price(&key("M4A1-S | Hyper Beast"), price(dec!(20)));
        let fx = fixture(fetcher).await;
        fx.resolver.guard().force_offline();

        let resolution = fx.resolver.resolve(&key("M4A1-S | Hyper Beast")).await.unwrap();
        assert_eq!(resolution.record.price, price(dec!(20)));
        assert_eq!(fx.resolver.guard().mode(), StoreMode::Offline);
        assert!(fx.resolver.cache().peek(&key("M4A1-S | Hyper Beast")).unwrap().dirty);
        assert!(fx.connector.backend().is_empty());
    }

    #[tokio::test]
    async fn staleness_is_measured_with_the_injected_clock() {
        let fetcher = ScriptedFetcher::new();
        fetcher.set_price(&redline(), price(dec!(10)));
        let fx = fixture(fetcher).await;

        fx.resolver.get_price(&redline()).await.unwrap();
        fx.clock.advance(ChronoDuration::days(7));
        fx.resolver.get_price(&redline()).await.unwrap();
        assert_eq!(fx.fetcher.calls(), 1);

        fx.clock.advance(ChronoDuration::seconds(1));
        fx.resolver.get_price(&redline()).await.unwrap();
        assert_eq!(fx.fetcher.calls(), 2);
    }
}
