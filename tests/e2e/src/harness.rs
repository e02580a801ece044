//! Runs the processing stages side by side until a row count is reached

use anyhow::{bail, Result};
use event_log::{EventLog, MemoryLog};
use message_sink::test_utils::CollectorSink;
use service_config::PipelineConfig;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::TempDir;
use tokio::sync::watch;
use tracing::info;
use types::Trade;

pub struct PipelineHarness {
    pub log: Arc<MemoryLog>,
    pub config: PipelineConfig,
    _state: TempDir,
}

impl PipelineHarness {
    pub fn new(partitions: u32) -> Result<Self> {
        let state = tempfile::tempdir()?;
        let mut config = PipelineConfig::default();
        config.bus.partitions = partitions;
        config.bus.poll_interval_ms = 5;
        config.candles.state_dir = state.path().join("candles");
        config.technical_indicators.state_dir = state.path().join("technical_indicators");
        config.to_feature_store.batch_size = 10;
        config.to_feature_store.idle_flush_ms = 20;
        config.to_feature_store.max_retry_after_ms = 20;
        config.validate()?;

        Ok(Self {
            log: Arc::new(MemoryLog::new(partitions)),
            config,
            _state: state,
        })
    }

    pub async fn publish(&self, trades: &[Trade]) -> Result<()> {
        for trade in trades {
            trades_service::publish_trade(
                self.log.as_ref(),
                &self.config.trades.output_topic,
                trade,
            )
            .await?;
        }
        Ok(())
    }

    /// Run candles, indicators and the feature-store writer until `sink`
    /// holds at least `rows` rows, then shut all of them down
    pub async fn run_until(
        &self,
        sink: Arc<CollectorSink>,
        rows: usize,
        timeout: Duration,
    ) -> Result<()> {
        let (tx, _rx) = watch::channel(false);
        let log: Arc<dyn EventLog> = self.log.clone();
        let config = &self.config;

        let stop = async {
            let deadline = Instant::now() + timeout;
            let reached = loop {
                if sink.message_count() >= rows {
                    break true;
                }
                if Instant::now() >= deadline {
                    break false;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            };
            tx.send_replace(true);
            reached
        };

        let (candles, indicators, writer, reached) = tokio::join!(
            candles_service::run(log.clone(), &config.bus, &config.candles, &tx),
            technical_indicators::run(
                log.clone(),
                &config.bus,
                &config.technical_indicators,
                &tx
            ),
            to_feature_store::run(
                log.clone(),
                &config.bus,
                &config.to_feature_store,
                sink.clone(),
                &tx
            ),
            stop,
        );
        candles?;
        indicators?;
        writer?;

        if !reached {
            bail!(
                "feature store received {} of {} rows before timing out",
                sink.message_count(),
                rows
            );
        }
        info!("Pipeline delivered {} rows", sink.message_count());
        Ok(())
    }
}
