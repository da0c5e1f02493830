//! Age-based trust policy shared by the resolver and the refresh scheduler.

use chrono::{DateTime, Duration, Utc};

use super::record::PriceRecord;

/// Default validity window for a confirmed price.
pub const DEFAULT_VALIDITY_DAYS: i64 = 7;

/// Decides whether a price is too old to serve without re-fetching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StalenessPolicy {
    validity_window: Duration,
}

impl StalenessPolicy {
    #[must_use]
    pub fn new(validity_window: Duration) -> Self {
        Self { validity_window }
    }

    #[must_use]
    pub fn validity_window(&self) -> Duration {
        self.validity_window
    }

    /// `now - last_updated > validity_window`.
    #[must_use]
    pub fn is_stale(&self, record: &PriceRecord, now: DateTime<Utc>) -> bool {
        now - record.last_updated > self.validity_window
    }

    /// Oldest `last_updated` that still counts as fresh at `now`.
    #[must_use]
    pub fn fresh_since(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - self.validity_window
    }
}

impl Default for StalenessPolicy {
    fn default() -> Self {
        Self::new(Duration::days(DEFAULT_VALIDITY_DAYS))
    }
}
