//! Shared test utilities available to both unit and integration tests.
//!
//! Enabled via `#[cfg(test)]` (unit tests) or the `testkit` feature
//! (integration tests).
//!
//! # Modules
//!
//! - [`fetcher`] - `ScriptedFetcher`, a [`PriceFetcher`](crate::port::PriceFetcher)
//!   with per-key results, latency and call counting.
//! - [`store`] - `FlakyConnector`, a connector whose stores can be switched
//!   off to simulate outages.
//! - [`clock`] - `ManualClock` for deterministic time.
//! - [`domain`] - Builders for keys and prices.

pub mod clock;
pub mod domain;
pub mod fetcher;
pub mod store;
