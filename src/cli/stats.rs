//! Handler for the `stats` command.

use crate::cli::StatsArgs;
use crate::error::Result;
use crate::infrastructure::config::Config;
use crate::infrastructure::service::{PriceService, ServiceStats};

/// Execute the stats command.
pub async fn execute(mut config: Config, args: &StatsArgs) -> Result<()> {
    config.refresh.enabled = false;
    let service = PriceService::init(&config).await?;
    let stats = service.stats().await;
    service.shutdown().await;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    } else {
        print_stats(&stats);
    }
    Ok(())
}

fn print_stats(stats: &ServiceStats) {
    let version = env!("CARGO_PKG_VERSION");
    let session = stats
        .session_mode
        .map_or_else(|| "none".to_string(), |mode| mode.to_string());
    let last_update = stats.store.last_update.map_or_else(
        || "never".to_string(),
        |at| at.format("%Y-%m-%d %H:%M UTC").to_string(),
    );

    println!();
    println!("skincache v{version}");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("Store:       {} ({session})", stats.mode);
    println!("Records:     {}", stats.store.total_count);
    println!("Fresh:       {}", stats.store.recently_updated_count);
    println!("Avg price:   {}", stats.store.average_price);
    println!("Last update: {last_update}");
    println!();
    println!("Cached:      {} ({} pending write)", stats.cached_entries, stats.dirty_entries);
    match stats.scheduler.next_run {
        Some(next) => println!("Next run:    {}", next.format("%Y-%m-%d %H:%M UTC")),
        None => println!("Next run:    not scheduled"),
    }
    println!();
}
