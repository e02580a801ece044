//! Partition worker runtime
//!
//! One worker owns one input partition: its processor state, its checkpoint
//! file and its consumer position. Per batch the worker
//!
//! 1. applies every record to the processor (rejected records are logged and
//!    counted, never fatal),
//! 2. appends all outputs to the output topic,
//! 3. saves the checkpoint (state snapshot + next input offset),
//! 4. commits the input offset.
//!
//! A crash between any two steps replays the tail from the last checkpoint,
//! which gives at-least-once output. Bus and checkpoint failures end the
//! worker with an error.

use crate::metrics::StageMetrics;
use anyhow::{Context, Result};
use event_log::{ConsumerOptions, EventLog, PartitionConsumer, Record};
use service_config::BusConfig;
use state_store::{Checkpoint, CheckpointStore, Stateful};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// A stage's record-to-records transformation with snapshot-able state
pub trait RecordProcessor:
    Stateful<Event = Record, Output = Vec<Record>> + Send + 'static
{
}

impl<T> RecordProcessor for T where T: Stateful<Event = Record, Output = Vec<Record>> + Send + 'static
{}

#[derive(Debug, Clone)]
pub struct WorkerSettings {
    pub group: String,
    pub input_topic: String,
    pub output_topic: String,
    pub partition: u32,
    pub options: ConsumerOptions,
}

impl WorkerSettings {
    pub fn new(
        group: impl Into<String>,
        input_topic: impl Into<String>,
        output_topic: impl Into<String>,
        options: ConsumerOptions,
    ) -> Self {
        Self {
            group: group.into(),
            input_topic: input_topic.into(),
            output_topic: output_topic.into(),
            partition: 0,
            options,
        }
    }

    pub fn for_partition(&self, partition: u32) -> Self {
        Self {
            partition,
            ..self.clone()
        }
    }

    /// Checkpoint file name, unique per (group, topic, partition)
    pub fn checkpoint_name(&self) -> String {
        format!("{}-{}-{}", self.group, self.input_topic, self.partition)
    }
}

/// Consumer tuning taken from the bus section of the configuration
pub fn consumer_options(bus: &BusConfig) -> ConsumerOptions {
    ConsumerOptions {
        poll_interval: Duration::from_millis(bus.poll_interval_ms),
        max_records: bus.max_poll_records,
    }
}

/// Run one partition worker until shutdown is signalled or a fatal error
/// occurs. Returns the processor so callers can inspect the final state.
pub async fn run_partition_worker<P: RecordProcessor>(
    log: Arc<dyn EventLog>,
    settings: WorkerSettings,
    mut processor: P,
    checkpoints: Option<CheckpointStore>,
    metrics: Arc<StageMetrics>,
    mut shutdown: watch::Receiver<bool>,
) -> Result<P> {
    let checkpoint_name = settings.checkpoint_name();

    let start_offset = match &checkpoints {
        Some(store) => match store
            .load(&checkpoint_name)
            .with_context(|| format!("loading checkpoint {}", checkpoint_name))?
        {
            Some(checkpoint) => {
                processor
                    .restore(&checkpoint.state)
                    .with_context(|| format!("restoring state from {}", checkpoint_name))?;
                info!(
                    "Restored {} from checkpoint, resuming at offset {}",
                    checkpoint_name, checkpoint.next_offset
                );
                Some(checkpoint.next_offset)
            }
            None => None,
        },
        None => None,
    };

    let mut consumer = PartitionConsumer::start(
        log.clone(),
        settings.group.clone(),
        settings.input_topic.clone(),
        settings.partition,
        start_offset,
        settings.options.clone(),
    )
    .await
    .with_context(|| format!("starting consumer for {}", checkpoint_name))?;

    loop {
        if *shutdown.borrow() {
            break;
        }

        let batch = consumer
            .poll()
            .await
            .with_context(|| format!("polling {}", checkpoint_name))?;

        if batch.is_empty() {
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

        let mut outputs = Vec::new();
        for delivered in batch {
            metrics.increment_processed();
            let offset = delivered.offset;
            match processor.apply_event(delivered.record) {
                Ok(records) => outputs.extend(records),
                Err(e) => {
                    metrics.increment_dropped();
                    warn!(
                        partition = settings.partition,
                        offset, "Skipping record: {}", e
                    );
                }
            }
        }

        let emitted = outputs.len() as u64;
        log.append_all(&settings.output_topic, outputs)
            .await
            .with_context(|| format!("publishing to {}", settings.output_topic))?;
        metrics.add_emitted(emitted);

        if let Some(store) = &checkpoints {
            let state = processor
                .snapshot()
                .with_context(|| format!("snapshotting {}", checkpoint_name))?;
            store
                .save(
                    &checkpoint_name,
                    &Checkpoint {
                        next_offset: consumer.position(),
                        state,
                    },
                )
                .with_context(|| format!("saving checkpoint {}", checkpoint_name))?;
        }

        consumer
            .commit()
            .await
            .with_context(|| format!("committing {}", checkpoint_name))?;
        debug!(
            "{} emitted {} records, committed offset {}",
            checkpoint_name,
            emitted,
            consumer.position()
        );
    }

    info!(
        "Worker {} stopped at offset {}",
        checkpoint_name,
        consumer.position()
    );
    Ok(processor)
}

/// Spawn one worker per partition of the input topic
pub fn spawn_partition_workers<P, F>(
    log: Arc<dyn EventLog>,
    settings: &WorkerSettings,
    mut make_processor: F,
    checkpoints: Option<CheckpointStore>,
    metrics: Arc<StageMetrics>,
    shutdown: watch::Receiver<bool>,
) -> Result<JoinSet<Result<P>>>
where
    P: RecordProcessor,
    F: FnMut(u32) -> Result<P>,
{
    let mut workers = JoinSet::new();
    for partition in 0..log.partitions() {
        let processor = make_processor(partition)?;
        workers.spawn(run_partition_worker(
            log.clone(),
            settings.for_partition(partition),
            processor,
            checkpoints.clone(),
            metrics.clone(),
            shutdown.clone(),
        ));
    }
    info!(
        "Spawned {} workers on topic '{}'",
        workers.len(),
        settings.input_topic
    );
    Ok(workers)
}

/// Wait for every worker; the first failure triggers shutdown of the rest and
/// is returned once all have stopped
pub async fn supervise<P: Send + 'static>(
    mut workers: JoinSet<Result<P>>,
    shutdown: &watch::Sender<bool>,
) -> Result<Vec<P>> {
    let mut finished = Vec::new();
    let mut first_error: Option<anyhow::Error> = None;

    while let Some(joined) = workers.join_next().await {
        let outcome = joined
            .context("partition worker panicked")
            .and_then(|result| result);
        match outcome {
            Ok(processor) => finished.push(processor),
            Err(e) => {
                error!("Partition worker failed: {:#}", e);
                shutdown.send_replace(true);
                first_error.get_or_insert(e);
            }
        }
    }

    match first_error {
        Some(e) => Err(e),
        None => Ok(finished),
    }
}

/// Flip the shutdown flag on Ctrl-C
pub fn shutdown_on_ctrl_c(shutdown: Arc<watch::Sender<bool>>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Shutdown signal received"),
            Err(e) => error!("Failed to listen for Ctrl-C: {}", e),
        }
        shutdown.send_replace(true);
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use event_log::MemoryLog;
    use state_store::StateError;
    use tempfile::tempdir;

    /// Uppercases payloads, rejects empty ones, and counts what it has seen
    #[derive(Debug, Default)]
    struct Upper {
        seen: u64,
    }

    #[derive(Debug, thiserror::Error)]
    #[error("empty payload")]
    struct Empty;

    impl Stateful for Upper {
        type Event = Record;
        type Output = Vec<Record>;
        type Error = Empty;

        fn apply_event(&mut self, record: Record) -> Result<Vec<Record>, Empty> {
            if record.value.is_empty() {
                return Err(Empty);
            }
            self.seen += 1;
            Ok(vec![Record::new(
                record.key,
                record.value.to_ascii_uppercase(),
                record.timestamp_ms,
            )])
        }

        fn snapshot(&self) -> Result<Vec<u8>, StateError> {
            Ok(self.seen.to_le_bytes().to_vec())
        }

        fn restore(&mut self, snapshot: &[u8]) -> Result<(), StateError> {
            let bytes: [u8; 8] = snapshot.try_into().map_err(StateError::decode)?;
            self.seen = u64::from_le_bytes(bytes);
            Ok(())
        }
    }

    fn settings() -> WorkerSettings {
        WorkerSettings::new(
            "upper",
            "in",
            "out",
            ConsumerOptions {
                poll_interval: Duration::from_millis(5),
                max_records: 2,
            },
        )
    }

    async fn drain_then_stop<P: RecordProcessor>(
        log: Arc<MemoryLog>,
        processor: P,
        checkpoints: Option<CheckpointStore>,
        metrics: Arc<StageMetrics>,
        expected_out: usize,
    ) -> P {
        let (tx, rx) = watch::channel(false);
        let worker = tokio::spawn(run_partition_worker(
            log.clone(),
            settings(),
            processor,
            checkpoints,
            metrics,
            rx,
        ));
        for _ in 0..400 {
            if log.topic_len("out") >= expected_out {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        tx.send(true).unwrap();
        worker.await.unwrap().unwrap()
    }

    #[tokio::test]
    async fn test_worker_transforms_and_commits() {
        let log = Arc::new(MemoryLog::new(1));
        for value in ["a", "", "b", "c"] {
            log.append("in", Record::new("k", value.as_bytes().to_vec(), 0))
                .await
                .unwrap();
        }
        let metrics = Arc::new(StageMetrics::new());

        let processor =
            drain_then_stop(log.clone(), Upper::default(), None, metrics.clone(), 3).await;
        assert_eq!(processor.seen, 3);

        let out: Vec<Vec<u8>> = log.snapshot_topic("out")[0]
            .iter()
            .map(|r| r.value.clone())
            .collect();
        assert_eq!(out, vec![b"A".to_vec(), b"B".to_vec(), b"C".to_vec()]);
        assert_eq!(log.committed("upper", "in", 0).await.unwrap(), Some(4));

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.records_processed, 4);
        assert_eq!(snapshot.records_emitted, 3);
        assert_eq!(snapshot.records_dropped, 1);
    }

    #[tokio::test]
    async fn test_worker_resumes_from_checkpoint() {
        let dir = tempdir().unwrap();
        let store = CheckpointStore::open(dir.path()).unwrap();
        let log = Arc::new(MemoryLog::new(1));
        for value in ["a", "b"] {
            log.append("in", Record::new("k", value.as_bytes().to_vec(), 0))
                .await
                .unwrap();
        }

        let metrics = Arc::new(StageMetrics::new());
        let first = drain_then_stop(
            log.clone(),
            Upper::default(),
            Some(store.clone()),
            metrics.clone(),
            2,
        )
        .await;
        assert_eq!(first.seen, 2);

        log.append("in", Record::new("k", b"c".to_vec(), 0))
            .await
            .unwrap();
        let second =
            drain_then_stop(log.clone(), Upper::default(), Some(store), metrics, 3).await;

        // State restored from the checkpoint, only the new record applied
        assert_eq!(second.seen, 3);
        assert_eq!(log.topic_len("out"), 3);
    }

    async fn run_expecting_failure(
        log: Arc<MemoryLog>,
        checkpoints: Option<CheckpointStore>,
    ) -> anyhow::Error {
        let (_tx, rx) = watch::channel(false);
        let worker = run_partition_worker(
            log,
            settings(),
            Upper::default(),
            checkpoints,
            Arc::new(StageMetrics::new()),
            rx,
        );
        tokio::time::timeout(Duration::from_secs(5), worker)
            .await
            .expect("worker should fail on its own")
            .unwrap_err()
    }

    #[tokio::test]
    async fn test_bus_failure_halts_without_commit() {
        let log = Arc::new(MemoryLog::new(1));
        log.append("in", Record::new("k", b"a".to_vec(), 0))
            .await
            .unwrap();
        log.close();

        let err = run_expecting_failure(log.clone(), None).await;
        assert!(format!("{:#}", err).contains("publishing to out"));
        assert_eq!(log.committed("upper", "in", 0).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_checkpoint_failure_halts_without_commit() {
        let dir = tempdir().unwrap();
        let state_dir = dir.path().join("state");
        let store = CheckpointStore::open(&state_dir).unwrap();
        std::fs::remove_dir_all(&state_dir).unwrap();

        let log = Arc::new(MemoryLog::new(1));
        log.append("in", Record::new("k", b"a".to_vec(), 0))
            .await
            .unwrap();

        let err = run_expecting_failure(log.clone(), Some(store)).await;
        assert!(format!("{:#}", err).contains("saving checkpoint"));
        assert_eq!(log.committed("upper", "in", 0).await.unwrap(), None);
        // Output went out before the failure; a restart replays it
        assert_eq!(log.topic_len("out"), 1);
    }

    #[tokio::test]
    async fn test_supervise_reports_first_failure() {
        let (tx, _rx) = watch::channel(false);
        let mut workers: JoinSet<Result<u32>> = JoinSet::new();
        workers.spawn(async { Ok(1) });
        workers.spawn(async { Err(anyhow::anyhow!("checkpoint disk full")) });

        let err = supervise(workers, &tx).await.unwrap_err();
        assert!(err.to_string().contains("checkpoint disk full"));
        assert!(*tx.borrow());
    }
}
