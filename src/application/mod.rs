//! Application services (use cases).
//!
//! These services orchestrate domain logic and coordinate adapters
//! to implement the resilient price cache.

pub mod cache;
pub mod coalesce;
pub mod guard;
pub mod refresh;
pub mod resolver;
