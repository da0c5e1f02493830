//! Command-line interface definitions.

pub mod price;
pub mod refresh;
pub mod run;
pub mod stats;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::domain::Exterior;
use crate::error::Result;
use crate::infrastructure::config::Config;

/// Skincache - Resilient market price cache.
#[derive(Parser, Debug)]
#[command(name = "skincache")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file (defaults are used if omitted)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Override log level (debug, info, warn, error)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the cache service with its reconciler and refresh scheduler
    Run,

    /// Look up one item's price
    Price(PriceArgs),

    /// Refresh the stalest records now
    Refresh(RefreshArgs),

    /// Show store and cache statistics
    Stats(StatsArgs),
}

/// Arguments for the `price` subcommand.
#[derive(Parser, Debug)]
pub struct PriceArgs {
    /// Market hash name without wear, e.g. "AK-47 | Redline"
    pub name: String,

    /// Wear grade (factory-new, minimal-wear, field-tested, well-worn, battle-scarred)
    #[arg(short, long, default_value = "none")]
    pub exterior: Exterior,

    /// StatTrak variant
    #[arg(long)]
    pub stattrak: bool,

    /// Steam application id
    #[arg(long, default_value = "730")]
    pub app_id: u32,

    /// Print the full record as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `refresh` subcommand.
#[derive(Parser, Debug)]
pub struct RefreshArgs {
    /// Maximum number of records to refresh (defaults to the configured batch size)
    #[arg(short = 'n', long)]
    pub max_items: Option<usize>,
}

/// Arguments for the `stats` subcommand.
#[derive(Parser, Debug)]
pub struct StatsArgs {
    /// Print as JSON
    #[arg(long)]
    pub json: bool,
}

impl Cli {
    /// Load configuration and apply command-line overrides.
    ///
    /// # Errors
    /// Returns an error if the configuration file cannot be read or is invalid.
    pub fn load_config(&self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::load(path)?,
            None => Config::parse_toml("")?,
        };
        if let Some(level) = &self.log_level {
            config.logging = config.logging.with_level(level.clone());
        }
        Ok(config)
    }
}
