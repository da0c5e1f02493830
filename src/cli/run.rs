//! Handler for the `run` command.

use tokio::signal;
use tracing::{error, info};

use crate::error::Result;
use crate::infrastructure::config::Config;
use crate::infrastructure::service::PriceService;

/// Execute the run command.
///
/// Blocks until ctrl-c, then stops background tasks and flushes deferred writes.
pub async fn execute(config: Config) -> Result<()> {
    info!(
        database = %config.database.url,
        refresh = config.refresh.enabled,
        "skincache starting"
    );

    let service = PriceService::init(&config).await?;

    if let Err(e) = signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
    } else {
        info!("Shutdown signal received");
    }

    service.shutdown().await;
    info!("skincache stopped");
    Ok(())
}
