//! Candle stage: trades topic in, candles topic out

use crate::window::{WindowError, WindowingEngine};
use anyhow::{Context, Result};
use event_log::{EventLog, Record};
use service_config::{BusConfig, CandlesConfig, EmitMode};
use state_store::{CheckpointStore, StateError, Stateful};
use std::sync::Arc;
use std::time::Duration;
use stream_service_shared::{
    consumer_options, spawn_partition_workers, spawn_reporter, supervise, StageMetrics,
    WorkerSettings,
};
use tokio::sync::watch;
use tracing::info;
use types::Trade;

const STAGE: &str = "candles";

/// Decodes trade records, windows them and encodes the emitted candles
#[derive(Debug)]
pub struct CandleStage {
    engine: WindowingEngine,
}

impl CandleStage {
    pub fn new(interval_seconds: u64, mode: EmitMode) -> Result<Self, WindowError> {
        Ok(Self {
            engine: WindowingEngine::new(interval_seconds, mode)?,
        })
    }

    pub fn engine(&self) -> &WindowingEngine {
        &self.engine
    }
}

impl Stateful for CandleStage {
    type Event = Record;
    type Output = Vec<Record>;
    type Error = WindowError;

    fn apply_event(&mut self, record: Record) -> Result<Vec<Record>, WindowError> {
        let trade = Trade::from_json(&record.value)?;
        let Some(candle) = self.engine.apply_event(trade)? else {
            return Ok(Vec::new());
        };
        info!(
            "Candle {} {}s {}: o={} h={} l={} c={} v={}",
            candle.pair,
            candle.candle_interval_seconds,
            candle.bounds(),
            candle.open,
            candle.high,
            candle.low,
            candle.close,
            candle.volume
        );
        let value = candle.to_json()?;
        Ok(vec![Record::new(candle.pair, value, candle.timestamp_ms)])
    }

    fn snapshot(&self) -> Result<Vec<u8>, StateError> {
        self.engine.snapshot()
    }

    fn restore(&mut self, snapshot: &[u8]) -> Result<(), StateError> {
        self.engine.restore(snapshot)
    }
}

/// Run the candle stage over every partition until shutdown
pub async fn run(
    log: Arc<dyn EventLog>,
    bus: &BusConfig,
    config: &CandlesConfig,
    shutdown_tx: &watch::Sender<bool>,
) -> Result<()> {
    info!(
        "Candle stage: {} -> {} ({}s windows, {:?} mode)",
        config.input_topic, config.output_topic, config.candle_interval_seconds, config.emit_mode
    );

    let checkpoints = CheckpointStore::open(&config.state_dir)
        .with_context(|| format!("opening state dir {:?}", config.state_dir))?;
    let settings = WorkerSettings::new(
        config.consumer_group.clone(),
        config.input_topic.clone(),
        config.output_topic.clone(),
        consumer_options(bus),
    );
    let metrics = Arc::new(StageMetrics::new());

    let interval = config.candle_interval_seconds;
    let mode = config.emit_mode;
    let workers = spawn_partition_workers(
        log,
        &settings,
        |_| CandleStage::new(interval, mode).context("invalid candle interval"),
        Some(checkpoints),
        metrics.clone(),
        shutdown_tx.subscribe(),
    )?;
    let reporter = spawn_reporter(
        STAGE,
        metrics.clone(),
        Duration::from_secs(30),
        shutdown_tx.subscribe(),
    );

    let result = supervise(workers, shutdown_tx).await;
    shutdown_tx.send_replace(true);
    let _ = reporter.await;
    metrics.log_summary(STAGE);
    result.map(|_| ())
}
