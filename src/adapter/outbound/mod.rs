//! Outbound adapters: persistence, standby storage and the market price source.

pub mod memory;
pub mod sqlite;
pub mod steam;
