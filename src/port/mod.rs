//! Trait definitions (hexagonal ports). Depend only on domain.
//!
//! ```text
//!                 ┌──────────────────────────┐
//!                 │       Application        │
//!     ┌───────────┤   Domain + Port          ├───────────┐
//!     │           └──────────────────────────┘           │
//!     ▼                        ▼                         ▼
//! ┌─────────┐          ┌──────────────┐           ┌───────────┐
//! │ Fetcher │          │    Store     │           │   Clock   │
//! │ Adapter │          │   Adapters   │           │           │
//! └─────────┘          └──────────────┘           └───────────┘
//! ```
//!
//! - [`PriceStore`], [`StoreConnector`] - Persistent price records
//! - [`PriceFetcher`] - External price source (scraper)
//! - [`Clock`] - Time source

mod clock;
mod fetcher;
mod store;

pub use clock::Clock;
pub use fetcher::PriceFetcher;
pub use store::{PriceStore, SessionMode, StoreConnector};
