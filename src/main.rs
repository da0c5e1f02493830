use clap::Parser;
use skincache::cli::{self, Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    let args = Cli::parse();
    let config = args.load_config()?;
    config.init_logging();

    match &args.command {
        Commands::Run => cli::run::execute(config).await?,
        Commands::Price(price) => cli::price::execute(config, price).await?,
        Commands::Refresh(refresh) => cli::refresh::execute(config, refresh).await?,
        Commands::Stats(stats) => cli::stats::execute(config, stats).await?,
    }
    Ok(())
}
