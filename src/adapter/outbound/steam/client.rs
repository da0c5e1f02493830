//! Steam community market price-overview client.

use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use reqwest::Client as HttpClient;
use serde::Deserialize;
use tokio::sync::Mutex;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, warn};
use url::Url;

use super::parse::parse_price_text;
use super::settings::SteamConfig;
use crate::domain::{Price, PriceKey};
use crate::error::FetchError;
use crate::port::PriceFetcher;

/// Price-overview response body.
#[derive(Debug, Deserialize)]
pub struct PriceOverview {
    pub success: bool,
    #[serde(default)]
    pub lowest_price: Option<String>,
    #[serde(default)]
    pub median_price: Option<String>,
    #[serde(default)]
    pub volume: Option<String>,
}

impl PriceOverview {
    /// Median sale price, falling back to the lowest listing.
    pub fn price(&self) -> Option<Price> {
        [self.median_price.as_deref(), self.lowest_price.as_deref()]
            .into_iter()
            .flatten()
            .filter_map(parse_price_text)
            .find_map(|amount| Price::new(amount).ok())
    }
}

/// [`PriceFetcher`] backed by the market price-overview endpoint.
///
/// Requests are spaced by a minimum delay plus random jitter so bursts of
/// refreshes do not trip upstream rate limiting.
pub struct SteamMarketFetcher {
    http: HttpClient,
    config: SteamConfig,
    next_slot: Mutex<Instant>,
}

impl SteamMarketFetcher {
    #[must_use]
    pub fn new(config: SteamConfig) -> Self {
        let http = HttpClient::builder()
            .timeout(Duration::from_millis(config.http_timeout_ms))
            .connect_timeout(Duration::from_millis(config.connect_timeout_ms))
            .build()
            .unwrap_or_else(|err| {
                warn!(error = %err, "Failed to build HTTP client, using defaults");
                HttpClient::new()
            });

        Self {
            http,
            config,
            next_slot: Mutex::new(Instant::now()),
        }
    }

    /// Build the request URL for a key.
    pub fn request_url(&self, key: &PriceKey) -> Result<Url, FetchError> {
        let mut url = Url::parse(&self.config.api_url)
            .map_err(|e| FetchError::Upstream(format!("bad api_url: {e}")))?;
        url.query_pairs_mut()
            .append_pair("appid", &key.app_id.to_string())
            .append_pair("currency", &self.config.currency.to_string())
            .append_pair("market_hash_name", &key.listing_name());
        Ok(url)
    }

    /// Wait for this request's turn, then reserve the next slot.
    async fn pace(&self) {
        let mut next_slot = self.next_slot.lock().await;
        sleep_until(*next_slot).await;
        let jitter = if self.config.request_jitter_ms == 0 {
            0
        } else {
            rand::thread_rng().gen_range(0..=self.config.request_jitter_ms)
        };
        *next_slot =
            Instant::now() + Duration::from_millis(self.config.request_delay_ms + jitter);
    }
}

#[async_trait]
impl PriceFetcher for SteamMarketFetcher {
    async fn fetch_price(&self, key: &PriceKey) -> Result<Price, FetchError> {
        let url = self.request_url(key)?;
        self.pace().await;
        debug!(item = %key, "Fetching market price overview");

        let response = self
            .http
            .get(url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| FetchError::Upstream(e.to_string()))?;
        let overview: PriceOverview = response
            .json()
            .await
            .map_err(|e| FetchError::Upstream(e.to_string()))?;

        if !overview.success {
            return Err(FetchError::NotListed(key.to_string()));
        }
        overview
            .price()
            .ok_or_else(|| FetchError::NotListed(key.to_string()))
    }
}
