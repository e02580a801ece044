//! Candles service entry point

use anyhow::{Context, Result};
use candles_service::run;
use clap::Parser;
use event_log::FileLog;
use service_config::load_config;
use std::path::PathBuf;
use std::sync::Arc;
use stream_service_shared::{init_logging, shutdown_on_ctrl_c};
use tokio::sync::watch;
use tracing::info;

#[derive(Parser, Debug)]
#[command(author, version, about = "Aggregate trades into OHLCV candles", long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Environment overlay (config/environments/<name>.toml)
    #[arg(short, long)]
    environment: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging("candles_service", args.json_logs)?;

    info!("Starting candles service v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config(args.config.as_deref(), args.environment.as_deref())?;

    let log = FileLog::open(&config.bus.data_dir, config.bus.partitions)
        .with_context(|| format!("opening event log at {:?}", config.bus.data_dir))?;

    let shutdown = Arc::new(watch::channel(false).0);
    shutdown_on_ctrl_c(shutdown.clone());

    run(Arc::new(log), &config.bus, &config.candles, &shutdown).await?;
    info!("Candles service stopped");
    Ok(())
}
