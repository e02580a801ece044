//! Single-partition consumer with explicit commits

use crate::{BusError, Delivered, EventLog};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub struct ConsumerOptions {
    /// Sleep between polls that returned nothing
    pub poll_interval: Duration,
    /// Upper bound on records returned by one poll
    pub max_records: usize,
}

impl Default for ConsumerOptions {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(100),
            max_records: 500,
        }
    }
}

/// Reads one partition of a topic on behalf of a consumer group.
///
/// The read position advances on every poll; the committed position only
/// moves when [`PartitionConsumer::commit`] is called, so a restarted
/// consumer resumes from the last commit and sees the uncommitted tail again.
#[derive(Debug)]
pub struct PartitionConsumer {
    log: Arc<dyn EventLog>,
    group: String,
    topic: String,
    partition: u32,
    position: u64,
    options: ConsumerOptions,
}

impl PartitionConsumer {
    /// Position at `start_offset` if given, else at the group's committed
    /// offset, else at the beginning of the partition
    pub async fn start(
        log: Arc<dyn EventLog>,
        group: impl Into<String>,
        topic: impl Into<String>,
        partition: u32,
        start_offset: Option<u64>,
        options: ConsumerOptions,
    ) -> Result<Self, BusError> {
        let group = group.into();
        let topic = topic.into();
        let position = match start_offset {
            Some(offset) => offset,
            None => log.committed(&group, &topic, partition).await?.unwrap_or(0),
        };
        info!(
            "Consumer '{}' starting on {}/{} at offset {}",
            group, topic, partition, position
        );
        Ok(Self {
            log,
            group,
            topic,
            partition,
            position,
            options,
        })
    }

    /// Next batch of records; empty when caught up
    pub async fn poll(&mut self) -> Result<Vec<Delivered>, BusError> {
        let batch = self
            .log
            .read(
                &self.topic,
                self.partition,
                self.position,
                self.options.max_records,
            )
            .await?;
        if let Some(last) = batch.last() {
            self.position = last.offset + 1;
            debug!(
                "Polled {} records from {}/{}, next offset {}",
                batch.len(),
                self.topic,
                self.partition,
                self.position
            );
        }
        Ok(batch)
    }

    /// Commit everything read so far
    pub async fn commit(&self) -> Result<(), BusError> {
        self.commit_offset(self.position).await
    }

    pub async fn commit_offset(&self, next_offset: u64) -> Result<(), BusError> {
        self.log
            .commit(&self.group, &self.topic, self.partition, next_offset)
            .await
    }

    /// Next offset a poll will read
    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn partition(&self) -> u32 {
        self.partition
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    pub fn poll_interval(&self) -> Duration {
        self.options.poll_interval
    }
}
