//! In-process event log

use crate::{check_partition, partition_for, BusError, Delivered, EventLog, Record, RecordPosition};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

/// Event log held entirely in memory; contents vanish with the process
#[derive(Debug)]
pub struct MemoryLog {
    partitions: u32,
    topics: RwLock<HashMap<String, Vec<Vec<Record>>>>,
    offsets: RwLock<HashMap<(String, String, u32), u64>>,
    closed: AtomicBool,
}

impl MemoryLog {
    pub fn new(partitions: u32) -> Self {
        assert!(partitions > 0, "MemoryLog needs at least one partition");
        Self {
            partitions,
            topics: RwLock::new(HashMap::new()),
            offsets: RwLock::new(HashMap::new()),
            closed: AtomicBool::new(false),
        }
    }

    /// Reject all further appends; used to simulate a lost downstream bus
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    /// Every record of a topic, partition by partition (test helper)
    pub fn snapshot_topic(&self, topic: &str) -> Vec<Vec<Record>> {
        self.topics.read().get(topic).cloned().unwrap_or_default()
    }

    /// Total record count of a topic across partitions
    pub fn topic_len(&self, topic: &str) -> usize {
        self.topics
            .read()
            .get(topic)
            .map(|parts| parts.iter().map(Vec::len).sum())
            .unwrap_or(0)
    }
}

#[async_trait]
impl EventLog for MemoryLog {
    fn partitions(&self) -> u32 {
        self.partitions
    }

    async fn append(&self, topic: &str, record: Record) -> Result<RecordPosition, BusError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(BusError::Closed);
        }
        let partition = partition_for(&record.key, self.partitions);
        let mut topics = self.topics.write();
        let parts = topics
            .entry(topic.to_string())
            .or_insert_with(|| vec![Vec::new(); self.partitions as usize]);
        let log = &mut parts[partition as usize];
        log.push(record);
        Ok(RecordPosition {
            partition,
            offset: (log.len() - 1) as u64,
        })
    }

    async fn read(
        &self,
        topic: &str,
        partition: u32,
        from_offset: u64,
        max_records: usize,
    ) -> Result<Vec<Delivered>, BusError> {
        check_partition(topic, partition, self.partitions)?;
        let topics = self.topics.read();
        let Some(parts) = topics.get(topic) else {
            return Ok(Vec::new());
        };
        Ok(parts[partition as usize]
            .iter()
            .enumerate()
            .skip(from_offset as usize)
            .take(max_records)
            .map(|(offset, record)| Delivered {
                partition,
                offset: offset as u64,
                record: record.clone(),
            })
            .collect())
    }

    async fn end_offset(&self, topic: &str, partition: u32) -> Result<u64, BusError> {
        check_partition(topic, partition, self.partitions)?;
        Ok(self
            .topics
            .read()
            .get(topic)
            .map(|parts| parts[partition as usize].len() as u64)
            .unwrap_or(0))
    }

    async fn committed(
        &self,
        group: &str,
        topic: &str,
        partition: u32,
    ) -> Result<Option<u64>, BusError> {
        check_partition(topic, partition, self.partitions)?;
        Ok(self
            .offsets
            .read()
            .get(&(group.to_string(), topic.to_string(), partition))
            .copied())
    }

    async fn commit(
        &self,
        group: &str,
        topic: &str,
        partition: u32,
        next_offset: u64,
    ) -> Result<(), BusError> {
        check_partition(topic, partition, self.partitions)?;
        self.offsets
            .write()
            .insert((group.to_string(), topic.to_string(), partition), next_offset);
        Ok(())
    }
}
