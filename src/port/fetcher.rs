//! External price source port.

use async_trait::async_trait;

use crate::domain::{Price, PriceKey};
use crate::error::FetchError;

/// Expensive external price lookup.
///
/// Must be safe to call repeatedly for the same key; any retry policy lives
/// inside the implementation.
#[async_trait]
pub trait PriceFetcher: Send + Sync {
    async fn fetch_price(&self, key: &PriceKey) -> Result<Price, FetchError>;
}
