//! # Event Log - Partitioned Record Streams Between Stages
//!
//! ## Purpose
//!
//! Minimal event-bus contract the pipeline stages depend on: named topics split
//! into a fixed number of partitions, each an ordered, append-only, replayable
//! sequence of keyed records, with committed read positions per consumer group.
//!
//! ## Architecture Role
//!
//! ```text
//! Producer ──append(topic, record)──► partition = crc32(key) % N
//!                                          │
//!                           ┌──────────────┴──────────────┐
//!                       partition 0   ...   partition N-1   (offset-ordered)
//!                           │                              │
//!                   PartitionConsumer (group, topic, p) ── read(from, max)
//!                           │
//!                    commit(group, topic, p, next_offset)
//! ```
//!
//! ## Delivery Guarantees
//!
//! - **Per-key order**: every record with the same key lands in the same partition
//! - **At-least-once**: consumers commit after processing; a crash replays the
//!   uncommitted tail
//! - **Stable routing**: the partition hash does not depend on process or platform
//!
//! ## Implementations
//!
//! - [`MemoryLog`]: in-process log for tests and single-process pipelines
//! - [`FileLog`]: JSON-lines file per topic partition, shared between processes

pub mod consumer;
pub mod error;
pub mod file;
pub mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

pub use consumer::{ConsumerOptions, PartitionConsumer};
pub use error::BusError;
pub use file::FileLog;
pub use memory::MemoryLog;

/// One keyed record as stored in a topic partition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Routing key; all records of one trading pair share it
    pub key: String,
    /// Encoded payload (JSON)
    pub value: Vec<u8>,
    /// Producer-side timestamp, milliseconds since the epoch
    pub timestamp_ms: i64,
}

impl Record {
    pub fn new(key: impl Into<String>, value: Vec<u8>, timestamp_ms: i64) -> Self {
        Self {
            key: key.into(),
            value,
            timestamp_ms,
        }
    }
}

/// Where a record was written
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordPosition {
    pub partition: u32,
    pub offset: u64,
}

/// A record read back together with its position
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivered {
    pub partition: u32,
    pub offset: u64,
    pub record: Record,
}

/// Partition a key is routed to
pub fn partition_for(key: &str, partitions: u32) -> u32 {
    debug_assert!(partitions > 0, "a topic needs at least one partition");
    crc32fast::hash(key.as_bytes()) % partitions
}

/// Partitioned, ordered, replayable log of keyed records
#[async_trait]
pub trait EventLog: Send + Sync + Debug {
    /// Partition count, identical for every topic of this log
    fn partitions(&self) -> u32;

    /// Append a record to the partition owning its key
    async fn append(&self, topic: &str, record: Record) -> Result<RecordPosition, BusError>;

    /// Read up to `max_records` records starting at `from_offset`
    async fn read(
        &self,
        topic: &str,
        partition: u32,
        from_offset: u64,
        max_records: usize,
    ) -> Result<Vec<Delivered>, BusError>;

    /// Offset the next appended record of this partition will get
    async fn end_offset(&self, topic: &str, partition: u32) -> Result<u64, BusError>;

    /// Next offset the consumer group has committed for a partition
    async fn committed(
        &self,
        group: &str,
        topic: &str,
        partition: u32,
    ) -> Result<Option<u64>, BusError>;

    /// Record that the group has processed everything before `next_offset`
    async fn commit(
        &self,
        group: &str,
        topic: &str,
        partition: u32,
        next_offset: u64,
    ) -> Result<(), BusError>;

    /// Append many records in order; stops at the first failure
    async fn append_all(
        &self,
        topic: &str,
        records: Vec<Record>,
    ) -> Result<Vec<RecordPosition>, BusError> {
        let mut positions = Vec::with_capacity(records.len());
        for record in records {
            positions.push(self.append(topic, record).await?);
        }
        Ok(positions)
    }
}

pub(crate) fn check_partition(topic: &str, partition: u32, partitions: u32) -> Result<(), BusError> {
    if partition < partitions {
        Ok(())
    } else {
        Err(BusError::UnknownPartition {
            topic: topic.to_string(),
            partition,
            partitions,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partition_for_is_stable() {
        let a = partition_for("BTC/USD", 4);
        for _ in 0..10 {
            assert_eq!(partition_for("BTC/USD", 4), a);
        }
        assert!(a < 4);
        assert_eq!(partition_for("anything", 1), 0);
    }

    #[test]
    fn test_check_partition_bounds() {
        assert!(check_partition("trades", 3, 4).is_ok());
        assert!(matches!(
            check_partition("trades", 4, 4),
            Err(BusError::UnknownPartition { partition: 4, .. })
        ));
    }
}
