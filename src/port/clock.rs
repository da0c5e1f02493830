//! Time source port.

use chrono::{DateTime, Utc};

/// Wall-clock source, injectable so staleness can be exercised in tests.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}
