//! Storage-agnostic price domain.

mod key;
mod price;
mod record;
mod staleness;

pub use key::{Exterior, PriceKey};
pub use price::Price;
pub use record::{PriceRecord, RefreshCursor, StoreStats};
pub use staleness::{StalenessPolicy, DEFAULT_VALIDITY_DAYS};
