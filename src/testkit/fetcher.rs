//! Scripted [`PriceFetcher`] for resolver and scheduler tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::domain::{Price, PriceKey};
use crate::error::FetchError;
use crate::port::PriceFetcher;

/// A fetcher with per-key scripted results.
///
/// Keys without a script answer `NotListed`. Every call is counted, and an
/// optional latency makes concurrent callers overlap.
#[derive(Default)]
pub struct ScriptedFetcher {
    results: Mutex<HashMap<PriceKey, Result<Price, FetchError>>>,
    calls: Mutex<Vec<PriceKey>>,
    total: AtomicUsize,
    latency: Mutex<Duration>,
}

impl ScriptedFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every lookup by `latency`.
    pub fn with_latency(self, latency: Duration) -> Self {
        *self.latency.lock() = latency;
        self
    }

    pub fn set_price(&self, key: &PriceKey, price: Price) {
        self.results.lock().insert(key.clone(), Ok(price));
    }

    pub fn set_error(&self, key: &PriceKey, error: FetchError) {
        self.results.lock().insert(key.clone(), Err(error));
    }

    /// Total number of lookups started.
    pub fn calls(&self) -> usize {
        self.total.load(Ordering::SeqCst)
    }

    /// Number of lookups started for `key`.
    pub fn calls_for(&self, key: &PriceKey) -> usize {
        self.calls.lock().iter().filter(|k| *k == key).count()
    }

    /// Keys in the order they were looked up.
    pub fn history(&self) -> Vec<PriceKey> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl PriceFetcher for ScriptedFetcher {
    async fn fetch_price(&self, key: &PriceKey) -> Result<Price, FetchError> {
        self.total.fetch_add(1, Ordering::SeqCst);
        self.calls.lock().push(key.clone());

        let latency = *self.latency.lock();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        self.results
            .lock()
            .get(key)
            .cloned()
            .unwrap_or_else(|| Err(FetchError::NotListed(key.listing_name())))
    }
}
