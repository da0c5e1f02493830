//! Steam community market price source.

mod client;
mod parse;
mod settings;

pub use client::{PriceOverview, SteamMarketFetcher};
pub use parse::parse_price_text;
pub use settings::SteamConfig;
