//! Feature store writer entry point

use anyhow::{Context, Result};
use clap::Parser;
use event_log::FileLog;
use message_sink::JsonLinesSink;
use service_config::PipelineConfig;
use std::path::PathBuf;
use std::sync::Arc;
use stream_service_shared::{init_logging, shutdown_on_ctrl_c};
use to_feature_store::run;
use tokio::sync::watch;
use tracing::info;

#[derive(Parser, Debug)]
#[command(author, version, about = "Write enriched candles to the feature store", long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Environment overlay (config/environments/<name>.toml)
    #[arg(short, long)]
    environment: Option<String>,

    /// Override the feature store output file
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging("to_feature_store", args.json_logs)?;

    info!("Starting feature store writer v{}", env!("CARGO_PKG_VERSION"));

    let mut config = PipelineConfig::load(args.config.as_deref(), args.environment.as_deref())?;
    if let Some(output) = args.output {
        config.to_feature_store.output_path = output;
    }
    config.validate()?;

    let log = FileLog::open(&config.bus.data_dir, config.bus.partitions)
        .with_context(|| format!("opening event log at {:?}", config.bus.data_dir))?;
    let sink = JsonLinesSink::open(config.to_feature_store.output_path.clone())
        .await
        .with_context(|| {
            format!(
                "opening feature store file {:?}",
                config.to_feature_store.output_path
            )
        })?;

    let shutdown = Arc::new(watch::channel(false).0);
    shutdown_on_ctrl_c(shutdown.clone());

    run(
        Arc::new(log),
        &config.bus,
        &config.to_feature_store,
        Arc::new(sink),
        &shutdown,
    )
    .await?;
    info!("Feature store writer stopped");
    Ok(())
}
