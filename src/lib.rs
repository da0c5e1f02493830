//! Skincache - Resilient market price cache.
//!
//! Prices for market items are resolved through three tiers: an in-process
//! LRU cache, a persistent SQLite store and, when both miss or hold a record
//! older than the validity window, the external market. Concurrent lookups of
//! the same item share one external fetch. When the store is unreachable,
//! writes land in a standby table and are replayed once it comes back. A
//! weekly scheduler refreshes the stalest records in bounded batches.
//!
//! # Architecture
//!
//! - [`domain`] - Storage-agnostic types: price keys, records, staleness
//! - [`port`] - Traits for the store, the external fetcher and the clock
//! - [`adapter`] - SQLite and in-memory stores, the Steam market fetcher
//! - [`application`] - Cache, connection guard, coalescer, resolver, scheduler
//! - [`infrastructure`] - Configuration, system clock, the service context
//! - [`cli`] - Command-line handlers
//!
//! # Example
//!
//! ```no_run
//! use skincache::domain::{Exterior, PriceKey};
//! use skincache::infrastructure::config::Config;
//! use skincache::infrastructure::service::PriceService;
//!
//! # async fn demo() -> skincache::error::Result<()> {
//! let config = Config::load("skincache.toml")?;
//! let service = PriceService::init(&config).await?;
//! let key = PriceKey::new("AK-47 | Redline", Exterior::FieldTested, false, 730);
//! let price = service.get_price(&key).await?;
//! println!("{price}");
//! service.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod adapter;
pub mod application;
pub mod cli;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod port;

#[cfg(any(test, feature = "testkit"))]
pub mod testkit;
