//! Runtime caches used by application services.
//!
//! - [`MemoryCache`]: sharded LRU of resolved prices with dirty tracking

mod price;

pub use price::{CacheEntry, MemoryCache};
