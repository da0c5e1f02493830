//! Builders for domain primitives used across tests.

use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;

use crate::domain::{Exterior, Price, PriceKey};

/// The AK-47 | Redline (Field-Tested) key used throughout the tests.
pub fn redline() -> PriceKey {
    PriceKey::new("AK-47 | Redline", Exterior::FieldTested, false, 730)
}

/// A Field-Tested, non-StatTrak CS2 key with the given name.
pub fn key(name: &str) -> PriceKey {
    PriceKey::new(name, Exterior::FieldTested, false, 730)
}

/// Create a [`Price`], panicking on negative amounts.
pub fn price(amount: Decimal) -> Price {
    Price::new(amount).expect("test price must be non-negative")
}

/// A fixed reference instant: 2026-01-04 03:00 UTC (a Sunday).
pub fn epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 4, 3, 0, 0)
        .single()
        .expect("valid reference instant")
}
