//! Handler for the `refresh` command.

use crate::cli::RefreshArgs;
use crate::error::Result;
use crate::infrastructure::config::Config;
use crate::infrastructure::service::PriceService;

/// Execute the refresh command.
pub async fn execute(mut config: Config, args: &RefreshArgs) -> Result<()> {
    let max_items = args.max_items.unwrap_or(config.refresh.max_items);
    config.refresh.enabled = false;
    let service = PriceService::init(&config).await?;

    let result = service.trigger_refresh(max_items).await;
    service.shutdown().await;
    let report = result?;

    let elapsed = report.finished_at - report.started_at;
    println!(
        "Refreshed {}/{} records ({} failed) in {}s",
        report.refreshed,
        report.selected,
        report.failed,
        elapsed.num_seconds()
    );
    Ok(())
}
