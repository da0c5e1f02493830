//! Handler for the `price` command.

use crate::cli::PriceArgs;
use crate::domain::PriceKey;
use crate::error::Result;
use crate::infrastructure::config::Config;
use crate::infrastructure::service::PriceService;

/// Execute the price command.
pub async fn execute(mut config: Config, args: &PriceArgs) -> Result<()> {
    // One-shot lookups never run the scheduler.
    config.refresh.enabled = false;
    let service = PriceService::init(&config).await?;

    let key = PriceKey::new(args.name.as_str(), args.exterior, args.stattrak, args.app_id);
    let result = service.resolve(&key).await;
    service.shutdown().await;
    let resolution = result?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&resolution.record)?);
        return Ok(());
    }

    let record = &resolution.record;
    println!();
    println!("{}", key.listing_name());
    println!("  Price:        {}", record.price);
    println!("  Source:       {:?}", resolution.tier);
    println!("  Updated:      {}", record.last_updated.format("%Y-%m-%d %H:%M UTC"));
    println!("  Updates:      {}", record.update_count);
    println!();
    Ok(())
}
