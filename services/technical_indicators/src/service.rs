//! Indicator stage: candles topic in, enriched candles out

use crate::battery;
use crate::engine::IndicatorEngine;
use anyhow::{bail, Context, Result};
use event_log::{EventLog, Record};
use service_config::{BusConfig, IndicatorsConfig};
use state_store::{BoundedHistoryStore, CheckpointStore, StateError, Stateful, UpsertOutcome};
use std::sync::Arc;
use std::time::Duration;
use stream_service_shared::{
    consumer_options, spawn_partition_workers, spawn_reporter, supervise, StageMetrics,
    WorkerSettings,
};
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info};
use types::{Candle, EnrichedCandle, HistoryKey, ValidationError};

const STAGE: &str = "technical_indicators";

#[derive(Debug, Error)]
pub enum IndicatorStageError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("stale candle for {key}: window {window_start_ms} is older than {newest_window_start_ms}")]
    StaleCandle {
        key: HistoryKey,
        window_start_ms: i64,
        newest_window_start_ms: i64,
    },
}

/// Keeps the bounded history per (pair, interval) and enriches each incoming
/// candle with the indicators of its updated history
#[derive(Debug)]
pub struct IndicatorStage {
    store: BoundedHistoryStore,
    interval_seconds: u64,
    engine: IndicatorEngine,
}

impl IndicatorStage {
    pub fn new(interval_seconds: u64, max_candles_in_state: usize) -> Result<Self, StateError> {
        Ok(Self {
            store: BoundedHistoryStore::new(max_candles_in_state)?,
            interval_seconds,
            engine: IndicatorEngine::new(),
        })
    }

    pub fn store(&self) -> &BoundedHistoryStore {
        &self.store
    }

    /// Upsert `candle` and compute indicators over the resulting history;
    /// `None` when the candle belongs to another interval
    pub fn enrich(&mut self, candle: Candle) -> Result<Option<EnrichedCandle>, IndicatorStageError> {
        if candle.candle_interval_seconds != self.interval_seconds {
            debug!(
                "Skipping {}s candle for {}, stage runs {}s",
                candle.candle_interval_seconds, candle.pair, self.interval_seconds
            );
            return Ok(None);
        }

        let key = candle.history_key();
        let outcome = self.store.upsert(&key, candle.clone());
        if let UpsertOutcome::Stale {
            newest_window_start_ms,
        } = outcome
        {
            return Err(IndicatorStageError::StaleCandle {
                key,
                window_start_ms: candle.window_start_ms,
                newest_window_start_ms,
            });
        }

        let indicators = self.engine.compute(self.store.get(&key));
        debug!(
            "{} {}: {} indicators over {} candles",
            key,
            candle.bounds(),
            indicators.len(),
            self.store.get(&key).len()
        );
        Ok(Some(EnrichedCandle::new(candle, indicators)))
    }
}

impl Stateful for IndicatorStage {
    type Event = Record;
    type Output = Vec<Record>;
    type Error = IndicatorStageError;

    fn apply_event(&mut self, record: Record) -> Result<Vec<Record>, IndicatorStageError> {
        let candle = Candle::from_json(&record.value)?;
        let Some(enriched) = self.enrich(candle)? else {
            return Ok(Vec::new());
        };
        let value = enriched.to_json()?;
        Ok(vec![Record::new(
            enriched.candle.pair,
            value,
            enriched.candle.timestamp_ms,
        )])
    }

    fn snapshot(&self) -> Result<Vec<u8>, StateError> {
        self.store.snapshot()
    }

    fn restore(&mut self, snapshot: &[u8]) -> Result<(), StateError> {
        self.store.restore(snapshot)
    }
}

/// Refuse a history too short for the battery's longest lookback
pub fn check_capacity(max_candles_in_state: usize) -> Result<()> {
    let required = battery::max_required();
    if max_candles_in_state < required {
        bail!(
            "max_candles_in_state = {} but the indicator battery needs {} candles",
            max_candles_in_state,
            required
        );
    }
    Ok(())
}

/// Run the indicator stage over every partition until shutdown
pub async fn run(
    log: Arc<dyn EventLog>,
    bus: &BusConfig,
    config: &IndicatorsConfig,
    shutdown_tx: &watch::Sender<bool>,
) -> Result<()> {
    check_capacity(config.max_candles_in_state)?;
    info!(
        "Indicator stage: {} -> {} ({}s candles, {} in state)",
        config.input_topic,
        config.output_topic,
        config.candle_interval_seconds,
        config.max_candles_in_state
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
    let capacity = config.max_candles_in_state;
    let workers = spawn_partition_workers(
        log,
        &settings,
        |_| IndicatorStage::new(interval, capacity).context("invalid history capacity"),
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
