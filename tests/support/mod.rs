#![allow(dead_code)]

pub mod temp_db;

use std::sync::Arc;
use std::time::Duration;

use skincache::infrastructure::service::{PriceService, ServiceSettings};
use skincache::port::StoreConnector;
use skincache::testkit::clock::ManualClock;
use skincache::testkit::domain::epoch;
use skincache::testkit::fetcher::ScriptedFetcher;

/// Service collaborators a test keeps handles to.
pub struct Harness {
    pub service: PriceService,
    pub fetcher: Arc<ScriptedFetcher>,
    pub clock: Arc<ManualClock>,
}

/// Settings for tests: no periodic refresh, short store timeouts.
pub fn settings() -> ServiceSettings {
    let mut settings = ServiceSettings {
        refresh_enabled: false,
        ..ServiceSettings::default()
    };
    settings.guard.operation_timeout = Duration::from_secs(2);
    settings
}

/// Start a service over `connector` with a scripted fetcher and a manual clock at [`epoch`].
pub async fn start(connector: Arc<dyn StoreConnector>, fetcher: ScriptedFetcher) -> Harness {
    start_with(connector, fetcher, settings()).await
}

pub async fn start_with(
    connector: Arc<dyn StoreConnector>,
    fetcher: ScriptedFetcher,
    settings: ServiceSettings,
) -> Harness {
    let fetcher = Arc::new(fetcher);
    let clock = Arc::new(ManualClock::new(epoch()));
    let service = PriceService::builder(settings)
        .connector(connector)
        .fetcher(Arc::clone(&fetcher) as _)
        .clock(Arc::clone(&clock) as _)
        .start()
        .await
        .expect("start price service");
    Harness {
        service,
        fetcher,
        clock,
    }
}
