//! Mock trade producer entry point

use anyhow::{Context, Result};
use clap::Parser;
use event_log::FileLog;
use service_config::PipelineConfig;
use std::path::PathBuf;
use std::sync::Arc;
use stream_service_shared::{init_logging, shutdown_on_ctrl_c};
use tokio::sync::watch;
use trades_service::run;
use tracing::info;

#[derive(Parser, Debug)]
#[command(author, version, about = "Publish a mock trade stream", long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Environment overlay (config/environments/<name>.toml)
    #[arg(short, long)]
    environment: Option<String>,

    /// Seed for a reproducible trade stream
    #[arg(long)]
    seed: Option<u64>,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging("trades_service", args.json_logs)?;

    info!("Starting trades service v{}", env!("CARGO_PKG_VERSION"));

    let mut config = PipelineConfig::load(args.config.as_deref(), args.environment.as_deref())?;
    if args.seed.is_some() {
        config.trades.seed = args.seed;
    }
    config.validate()?;

    let log = FileLog::open(&config.bus.data_dir, config.bus.partitions)
        .with_context(|| format!("opening event log at {:?}", config.bus.data_dir))?;

    let shutdown = Arc::new(watch::channel(false).0);
    shutdown_on_ctrl_c(shutdown.clone());

    let published = run(Arc::new(log), &config.trades, &shutdown).await?;
    info!("Trades service stopped after {} trades", published);
    Ok(())
}
