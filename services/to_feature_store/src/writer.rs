//! Batching partition writer with backpressure handling

use anyhow::{Context, Result};
use event_log::{ConsumerOptions, EventLog, PartitionConsumer};
use message_sink::{Message, MessageSink};
use service_config::{BusConfig, FeatureStoreConfig};
use std::sync::Arc;
use std::time::{Duration, Instant};
use stream_service_shared::{consumer_options, spawn_reporter, supervise, StageMetrics};
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

const STAGE: &str = "to_feature_store";

/// Fallback wait for recoverable sink errors that carry no delay
const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub struct WriterSettings {
    pub group: String,
    pub input_topic: String,
    pub batch_size: usize,
    /// Flush a partial batch once the input has been quiet this long
    pub idle_flush: Duration,
    /// Upper bound on any single backpressure wait
    pub max_retry_after: Duration,
    pub options: ConsumerOptions,
}

impl WriterSettings {
    pub fn from_config(bus: &BusConfig, config: &FeatureStoreConfig) -> Self {
        Self {
            group: config.consumer_group.clone(),
            input_topic: config.input_topic.clone(),
            batch_size: config.batch_size.max(1),
            idle_flush: Duration::from_millis(config.idle_flush_ms),
            max_retry_after: Duration::from_millis(config.max_retry_after_ms),
            options: consumer_options(bus),
        }
    }
}

enum Delivery {
    Done,
    Interrupted,
}

/// Messages waiting for the sink, each with the offset it was read at
#[derive(Default)]
struct Pending {
    rows: Vec<(u64, Message)>,
}

impl Pending {
    fn len(&self) -> usize {
        self.rows.len()
    }

    fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// The oldest `n` rows and the offset to commit once they are written
    fn peek(&self, n: usize) -> (Vec<Message>, u64) {
        let n = n.min(self.rows.len());
        let messages = self.rows[..n].iter().map(|(_, m)| m.clone()).collect();
        let next_offset = self.rows[..n].last().map(|(o, _)| o + 1).unwrap_or(0);
        (messages, next_offset)
    }

    fn consume(&mut self, n: usize) {
        let n = n.min(self.rows.len());
        self.rows.drain(..n);
    }
}

/// Send one batch, retrying on backpressure until it is accepted or
/// shutdown is requested
async fn deliver(
    sink: &dyn MessageSink,
    batch: Vec<Message>,
    settings: &WriterSettings,
    metrics: &StageMetrics,
    shutdown: &mut watch::Receiver<bool>,
) -> Result<Delivery> {
    loop {
        match sink.send_batch(batch.clone()).await {
            Ok(result) => {
                for (index, error) in &result.failed {
                    metrics.increment_dropped();
                    warn!("Feature row {} rejected by sink: {}", index, error);
                }
                metrics.add_emitted(result.succeeded as u64);
                sink.flush().await.context("flushing feature sink")?;
                return Ok(Delivery::Done);
            }
            Err(e) if e.is_recoverable() => {
                let wait = e
                    .retry_after()
                    .unwrap_or(DEFAULT_RETRY_AFTER)
                    .min(settings.max_retry_after);
                warn!(
                    "Sink unavailable ({}), retrying {} rows in {:?}",
                    e,
                    batch.len(),
                    wait
                );
                tokio::select! {
                    _ = tokio::time::sleep(wait) => {}
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            return Ok(Delivery::Interrupted);
                        }
                    }
                }
            }
            Err(e) => return Err(e).context("feature sink failed"),
        }
    }
}

/// Write whole batches while enough rows are pending (or everything when
/// `drain` is set), committing after each one
async fn flush_pending(
    consumer: &PartitionConsumer,
    pending: &mut Pending,
    sink: &dyn MessageSink,
    settings: &WriterSettings,
    metrics: &StageMetrics,
    shutdown: &mut watch::Receiver<bool>,
    drain: bool,
) -> Result<Delivery> {
    while pending.len() >= settings.batch_size || (drain && !pending.is_empty()) {
        let (batch, next_offset) = pending.peek(settings.batch_size);
        let size = batch.len();
        if let Delivery::Interrupted = deliver(sink, batch, settings, metrics, shutdown).await? {
            return Ok(Delivery::Interrupted);
        }
        pending.consume(size);
        consumer
            .commit_offset(next_offset)
            .await
            .context("committing feature store offset")?;
        debug!(
            "Wrote {} feature rows from partition {}, committed {}",
            size,
            consumer.partition(),
            next_offset
        );
    }
    Ok(Delivery::Done)
}

/// Consume one partition until shutdown, writing batches to `sink`
pub async fn run_partition(
    log: Arc<dyn EventLog>,
    partition: u32,
    settings: WriterSettings,
    sink: Arc<dyn MessageSink>,
    metrics: Arc<StageMetrics>,
    mut shutdown: watch::Receiver<bool>,
) -> Result<()> {
    let mut consumer = PartitionConsumer::start(
        log,
        settings.group.clone(),
        settings.input_topic.clone(),
        partition,
        None,
        settings.options.clone(),
    )
    .await
    .with_context(|| format!("starting feature store consumer on partition {}", partition))?;

    let mut pending = Pending::default();
    let mut last_read = Instant::now();

    loop {
        if *shutdown.borrow() {
            break;
        }

        let batch = consumer.poll().await.context("polling enriched candles")?;
        if batch.is_empty() {
            if !pending.is_empty() && last_read.elapsed() >= settings.idle_flush {
                let delivery = flush_pending(
                    &consumer,
                    &mut pending,
                    sink.as_ref(),
                    &settings,
                    &metrics,
                    &mut shutdown,
                    true,
                )
                .await?;
                if let Delivery::Interrupted = delivery {
                    return Ok(());
                }
            }
            tokio::select! {
                _ = tokio::time::sleep(consumer.poll_interval()) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
            continue;
        }

        last_read = Instant::now();
        for delivered in batch {
            metrics.increment_processed();
            let record = delivered.record;
            match Message::from_json_slice(record.key, &record.value, record.timestamp_ms) {
                Ok(message) => pending.rows.push((delivered.offset, message)),
                Err(e) => {
                    metrics.increment_dropped();
                    warn!(
                        partition,
                        offset = delivered.offset,
                        "Skipping undecodable row: {}",
                        e
                    );
                }
            }
        }

        if pending.is_empty() {
            // Everything read was dropped
            consumer.commit().await.context("committing feature store offset")?;
            continue;
        }

        let delivery = flush_pending(
            &consumer,
            &mut pending,
            sink.as_ref(),
            &settings,
            &metrics,
            &mut shutdown,
            false,
        )
        .await?;
        if let Delivery::Interrupted = delivery {
            return Ok(());
        }
    }

    // Final partial batch gets one attempt; if the sink pushes back it stays uncommitted
    let (tx, mut stop_retrying) = watch::channel(true);
    drop(tx);
    flush_pending(
        &consumer,
        &mut pending,
        sink.as_ref(),
        &settings,
        &metrics,
        &mut stop_retrying,
        true,
    )
    .await?;
    info!(
        "Feature writer on partition {} stopped at offset {}",
        partition,
        consumer.position()
    );
    Ok(())
}

/// Run one writer per partition until shutdown
pub async fn run(
    log: Arc<dyn EventLog>,
    bus: &BusConfig,
    config: &FeatureStoreConfig,
    sink: Arc<dyn MessageSink>,
    shutdown_tx: &watch::Sender<bool>,
) -> Result<()> {
    let settings = WriterSettings::from_config(bus, config);
    info!(
        "Feature store writer: {} -> {} (batches of {})",
        settings.input_topic,
        sink.metadata().name,
        settings.batch_size
    );

    let metrics = Arc::new(StageMetrics::new());
    let mut workers = JoinSet::new();
    for partition in 0..log.partitions() {
        workers.spawn(run_partition(
            log.clone(),
            partition,
            settings.clone(),
            sink.clone(),
            metrics.clone(),
            shutdown_tx.subscribe(),
        ));
    }
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

#[cfg(test)]
mod tests {
    use super::*;
    use event_log::{MemoryLog, Record};
    use message_sink::test_utils::CollectorSink;
    use serde_json::json;

    const TOPIC: &str = "technical_indicators";
    const GROUP: &str = "to_feature_store";

    async fn seeded(rows: &[&[u8]]) -> Arc<MemoryLog> {
        let log = Arc::new(MemoryLog::new(1));
        for (i, row) in rows.iter().enumerate() {
            log.append(TOPIC, Record::new("BTC/USD", row.to_vec(), i as i64))
                .await
                .unwrap();
        }
        log
    }

    fn config(batch_size: usize) -> FeatureStoreConfig {
        FeatureStoreConfig {
            batch_size,
            idle_flush_ms: 20,
            max_retry_after_ms: 20,
            ..FeatureStoreConfig::default()
        }
    }

    fn bus() -> BusConfig {
        BusConfig {
            partitions: 1,
            poll_interval_ms: 5,
            ..BusConfig::default()
        }
    }

    async fn run_until(
        log: Arc<MemoryLog>,
        config: FeatureStoreConfig,
        sink: Arc<CollectorSink>,
        done: impl Fn(&CollectorSink) -> bool,
    ) {
        let (tx, _rx) = watch::channel(false);
        let stop = async {
            for _ in 0..400 {
                if done(&sink) {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
            tx.send_replace(true);
        };
        let bus = bus();
        let (result, ()) = tokio::join!(run(log, &bus, &config, sink.clone(), &tx), stop);
        result.unwrap();
    }

    #[tokio::test]
    async fn test_rows_are_written_and_committed() {
        let log = seeded(&[
            br#"{"pair":"BTC/USD","close":1.0,"sma_14":1.5}"#,
            br#"{"pair":"BTC/USD","close":2.0}"#,
            br#"{"pair":"BTC/USD","close":3.0}"#,
        ])
        .await;
        let sink = Arc::new(CollectorSink::new());

        run_until(log.clone(), config(2), sink.clone(), |s| s.message_count() >= 3).await;

        let rows = sink.received_messages();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].get("sma_14"), Some(&json!(1.5)));
        assert_eq!(rows[2].key, "BTC/USD");
        assert_eq!(log.committed(GROUP, TOPIC, 0).await.unwrap(), Some(3));
    }

    #[tokio::test]
    async fn test_backpressure_retries_same_batch() {
        let log = seeded(&[br#"{"close":1.0}"#, br#"{"close":2.0}"#]).await;
        let sink = Arc::new(CollectorSink::new());
        sink.backpressure_next(3, Duration::from_millis(5));

        run_until(log.clone(), config(2), sink.clone(), |s| s.message_count() >= 2).await;

        assert_eq!(sink.message_count(), 2);
        assert_eq!(log.committed(GROUP, TOPIC, 0).await.unwrap(), Some(2));
    }

    #[tokio::test]
    async fn test_undecodable_rows_are_skipped() {
        let log = seeded(&[b"not json", b"[1,2]", br#"{"close":5.0}"#]).await;
        let sink = Arc::new(CollectorSink::new());

        run_until(log.clone(), config(10), sink.clone(), |s| s.message_count() >= 1).await;

        let rows = sink.received_messages();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("close"), Some(&json!(5.0)));
        assert_eq!(log.committed(GROUP, TOPIC, 0).await.unwrap(), Some(3));
    }

    #[tokio::test]
    async fn test_persistent_backpressure_leaves_offsets_uncommitted() {
        let log = seeded(&[br#"{"close":1.0}"#]).await;
        let sink = Arc::new(CollectorSink::new());
        sink.backpressure_next(usize::MAX, Duration::from_secs(60));

        let (tx, _rx) = watch::channel(false);
        let stop = async {
            tokio::time::sleep(Duration::from_millis(100)).await;
            tx.send_replace(true);
        };
        let bus = bus();
        let config = config(1);
        let (result, ()) = tokio::join!(run(log.clone(), &bus, &config, sink.clone(), &tx), stop);
        result.unwrap();

        assert_eq!(sink.message_count(), 0);
        assert_eq!(log.committed(GROUP, TOPIC, 0).await.unwrap(), None);
    }
}
