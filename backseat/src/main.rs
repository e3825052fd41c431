mod migrations;
mod server;

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing::info;

use backseat_core::{logging, Config};

#[derive(Debug, Parser)]
#[command(name = "backseat", about = "Shared-playback room coordinator")]
struct Cli {
    /// Path to a configuration file (TOML). Environment variables prefixed
    /// with BACKSEAT_ override file values.
    #[arg(short, long, env = "BACKSEAT_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // 1. Load configuration
    let config = Config::load(cli.config.as_deref())?;

    // 2. Initialize logging
    logging::init_logging(&config.logging)?;
    info!("backseat server starting...");
    info!("HTTP address: {}", config.http_address());

    // 3. Initialize database
    let pool = server::init_database(&config).await?;

    // 4. Run migrations
    migrations::run_migrations(&pool).await?;

    // 5. Serve until shutdown
    server::run(config, pool).await
}
