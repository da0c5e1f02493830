//! Infrastructure layer.
//!
//! Provides technical concerns that support the application without containing
//! business logic: configuration, logging, time, and the service context that
//! wires the price cache together.
//!
//! # Submodules
//!
//! - [`config`] - Configuration loading and validation
//! - [`clock`] - System time source
//! - [`service`] - `PriceService` context object and its builder

pub mod clock;
pub mod config;
pub mod service;
