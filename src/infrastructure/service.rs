//! The price service context.
//!
//! [`PriceService`] owns every shared component of the price cache and the
//! background tasks that keep it healthy. It is created once at process start
//! and shut down explicitly; nothing lives in globals.

use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::clock::SystemClock;
use super::config::Config;
use crate::adapter::outbound::sqlite::SqliteConnector;
use crate::adapter::outbound::steam::SteamMarketFetcher;
use crate::application::cache::MemoryCache;
use crate::application::guard::{ConnectionGuard, GuardSettings, StoreMode};
use crate::application::refresh::{
    RefreshReport, RefreshScheduler, RefreshSettings, SchedulerStatus,
};
use crate::application::resolver::{PriceResolver, Resolution, ResolverSettings};
use crate::domain::{Price, PriceKey, StoreStats};
use crate::error::{ConfigError, FetchError, RefreshError, Result, StoreError};
use crate::port::{Clock, PriceFetcher, SessionMode, StoreConnector};

/// Everything [`PriceService`] needs besides its collaborators.
#[derive(Debug, Clone)]
pub struct ServiceSettings {
    pub cache_capacity: usize,
    pub cache_shards: usize,
    pub guard: GuardSettings,
    pub resolver: ResolverSettings,
    pub refresh: RefreshSettings,
    /// Spawn the periodic refresh loop.
    pub refresh_enabled: bool,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            cache_capacity: 10_000,
            cache_shards: 16,
            guard: GuardSettings::default(),
            resolver: ResolverSettings::default(),
            refresh: RefreshSettings::default(),
            refresh_enabled: true,
        }
    }
}

impl ServiceSettings {
    /// Derive service settings from validated configuration.
    ///
    /// # Errors
    /// Returns `InvalidValue` if the refresh schedule cannot be parsed.
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self {
            cache_capacity: config.cache.capacity,
            cache_shards: config.cache.shards,
            guard: config.database.guard_settings(),
            resolver: ResolverSettings {
                staleness: config.cache.staleness(),
                fetch_timeout: config.fetch.timeout(),
                max_concurrent_fetches: config.fetch.max_concurrent,
            },
            refresh: config.refresh.settings()?,
            refresh_enabled: config.refresh.enabled,
        })
    }
}

/// Snapshot for the administrative stats query.
#[derive(Debug, Clone, Serialize)]
pub struct ServiceStats {
    pub store: StoreStats,
    pub mode: StoreMode,
    pub session_mode: Option<SessionMode>,
    pub cached_entries: usize,
    pub dirty_entries: usize,
    pub scheduler: SchedulerStatus,
}

/// Builder for [`PriceService`].
pub struct PriceServiceBuilder {
    settings: ServiceSettings,
    connector: Option<Arc<dyn StoreConnector>>,
    fetcher: Option<Arc<dyn PriceFetcher>>,
    clock: Option<Arc<dyn Clock>>,
}

impl PriceServiceBuilder {
    #[must_use]
    pub fn connector(mut self, connector: Arc<dyn StoreConnector>) -> Self {
        self.connector = Some(connector);
        self
    }

    #[must_use]
    pub fn fetcher(mut self, fetcher: Arc<dyn PriceFetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    /// Defaults to the system clock.
    #[must_use]
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Negotiate the store connection and spawn the background tasks.
    ///
    /// An unreachable store is not an error: the service starts offline and
    /// the reconciler keeps trying.
    ///
    /// # Errors
    /// Returns `MissingField` if no connector or fetcher was supplied.
    pub async fn start(self) -> Result<PriceService> {
        let connector = self
            .connector
            .ok_or(ConfigError::MissingField { field: "connector" })?;
        let fetcher = self
            .fetcher
            .ok_or(ConfigError::MissingField { field: "fetcher" })?;
        let clock = self
            .clock
            .unwrap_or_else(|| Arc::new(SystemClock) as Arc<dyn Clock>);
        let settings = self.settings;

        let cache = Arc::new(MemoryCache::new(
            settings.cache_capacity,
            settings.cache_shards,
        ));
        let guard = Arc::new(ConnectionGuard::new(
            connector,
            Arc::clone(&cache),
            settings.guard.clone(),
        ));
        let mode = guard.connect().await;

        let resolver = Arc::new(PriceResolver::new(
            cache,
            Arc::clone(&guard),
            fetcher,
            clock,
            settings.resolver.clone(),
        ));
        let scheduler = Arc::new(RefreshScheduler::new(
            Arc::clone(&resolver),
            settings.refresh.clone(),
        ));

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let mut tasks = vec![tokio::spawn(
            Arc::clone(&guard).run_reconciler(shutdown_rx.clone()),
        )];
        if settings.refresh_enabled {
            tasks.push(tokio::spawn(
                Arc::clone(&scheduler).run_forever(shutdown_rx),
            ));
        }

        info!(
            mode = %mode,
            session = ?guard.session_mode(),
            refresh = settings.refresh_enabled,
            "Price service started"
        );

        Ok(PriceService {
            resolver,
            scheduler,
            guard,
            shutdown: shutdown_tx,
            tasks: Mutex::new(tasks),
        })
    }
}

/// Owned context for the resilient price cache.
pub struct PriceService {
    resolver: Arc<PriceResolver>,
    scheduler: Arc<RefreshScheduler>,
    guard: Arc<ConnectionGuard>,
    shutdown: watch::Sender<bool>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl PriceService {
    #[must_use]
    pub fn builder(settings: ServiceSettings) -> PriceServiceBuilder {
        PriceServiceBuilder {
            settings,
            connector: None,
            fetcher: None,
            clock: None,
        }
    }

    /// Start the service against SQLite and the Steam market.
    ///
    /// # Errors
    /// Returns an error if the configuration cannot be turned into settings.
    pub async fn init(config: &Config) -> Result<Self> {
        let connector = SqliteConnector::new(&config.database.url, config.database.pool_options());
        let fetcher = SteamMarketFetcher::new(config.steam.clone());
        Self::builder(ServiceSettings::from_config(config)?)
            .connector(Arc::new(connector))
            .fetcher(Arc::new(fetcher))
            .start()
            .await
    }

    /// # Errors
    /// Returns `FetchError` when the price could not be determined.
    pub async fn get_price(&self, key: &PriceKey) -> std::result::Result<Price, FetchError> {
        self.resolver.get_price(key).await
    }

    /// # Errors
    /// Returns `FetchError` when the price could not be determined.
    pub async fn resolve(&self, key: &PriceKey) -> std::result::Result<Resolution, FetchError> {
        self.resolver.resolve(key).await
    }

    /// Run an on-demand refresh of up to `max_items` stale records.
    ///
    /// # Errors
    /// Returns [`RefreshError::Busy`] while another run is in progress.
    pub async fn trigger_refresh(
        &self,
        max_items: usize,
    ) -> std::result::Result<RefreshReport, RefreshError> {
        self.scheduler.trigger(max_items).await
    }

    pub async fn stats(&self) -> ServiceStats {
        let now = self.resolver.clock().now();
        let fresh_since = self.resolver.staleness().fresh_since(now);
        let store = match self.guard.stats(fresh_since).await {
            Ok(stats) => stats,
            Err(e) => {
                warn!(error = %e, "Store stats unavailable");
                StoreStats::default()
            }
        };
        let cache = self.resolver.cache();
        ServiceStats {
            store,
            mode: self.guard.mode(),
            session_mode: self.guard.session_mode(),
            cached_entries: cache.len(),
            dirty_entries: cache.dirty_count(),
            scheduler: self.scheduler.status().await,
        }
    }

    #[must_use]
    pub fn mode(&self) -> StoreMode {
        self.guard.mode()
    }

    /// Drop the live store link, e.g. for maintenance.
    pub fn force_offline(&self) {
        self.guard.force_offline();
    }

    /// Reconnect and replay deferred writes now instead of on the next interval.
    ///
    /// # Errors
    /// Returns `ConnectionUnavailable` if the store is still unreachable.
    pub async fn reconcile(&self) -> std::result::Result<usize, StoreError> {
        self.guard.reconcile().await
    }

    /// Stop background tasks and make a last attempt to flush deferred writes.
    pub async fn shutdown(&self) {
        if self.shutdown.send(true).is_err() {
            warn!("Background tasks already stopped");
        }
        let tasks: Vec<_> = std::mem::take(&mut *self.tasks.lock());
        for task in tasks {
            if let Err(e) = task.await {
                warn!(error = %e, "Background task ended abnormally");
            }
        }

        let dirty = self.resolver.cache().dirty_count();
        if dirty > 0 || self.guard.standby_len() > 0 {
            match self.guard.reconcile().await {
                Ok(flushed) => info!(flushed, "Flushed deferred writes on shutdown"),
                Err(e) => warn!(error = %e, dirty, "Deferred writes lost on shutdown"),
            }
        }
        info!("Price service stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::clock::ManualClock;
    use crate::testkit::domain::{epoch, price, redline};
    use crate::testkit::fetcher::ScriptedFetcher;
    use crate::testkit::store::FlakyConnector;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn builder_requires_a_connector() {
        let result = PriceService::builder(ServiceSettings::default())
            .fetcher(Arc::new(ScriptedFetcher::new()))
            .start()
            .await;
        assert!(matches!(
            result,
            Err(crate::error::Error::Config(ConfigError::MissingField {
                field: "connector"
            }))
        ));
    }

    #[tokio::test]
    async fn stats_reflect_resolved_prices() {
        let fetcher = Arc::new(ScriptedFetcher::new());
        fetcher.set_price(&redline(), price(dec!(12)));
        let service = PriceService::builder(ServiceSettings {
            refresh_enabled: false,
            ..ServiceSettings::default()
        })
        .connector(Arc::new(FlakyConnector::new()))
        .fetcher(fetcher)
        .clock(Arc::new(ManualClock::new(epoch())))
        .start()
        .await
        .unwrap();

        service.get_price(&redline()).await.unwrap();
        let stats = service.stats().await;
        assert_eq!(stats.store.total_count, 1);
        assert_eq!(stats.store.recently_updated_count, 1);
        assert_eq!(stats.store.average_price, dec!(12));
        assert_eq!(stats.mode, StoreMode::Online);
        assert_eq!(stats.session_mode, Some(SessionMode::Strict));
        assert_eq!(stats.cached_entries, 1);

        service.shutdown().await;
    }

    #[tokio::test]
    async fn shutdown_flushes_deferred_writes() {
        let fetcher = Arc::new(ScriptedFetcher::new());
        fetcher.set_price(&redline(), price(dec!(3)));
        let connector = Arc::new(FlakyConnector::new());
        let service = PriceService::builder(ServiceSettings {
            refresh_enabled: false,
            ..ServiceSettings::default()
        })
        .connector(Arc::clone(&connector) as Arc<dyn StoreConnector>)
        .fetcher(fetcher)
        .start()
        .await
        .unwrap();

        service.force_offline();
        service.get_price(&redline()).await.unwrap();
        assert!(connector.backend().is_empty());

        service.shutdown().await;
        assert_eq!(connector.backend().len(), 1);
    }
}
