//! SQLite persistence using Diesel.

pub mod database;
pub mod store;

pub use store::{SqliteConnector, SqlitePriceStore};
