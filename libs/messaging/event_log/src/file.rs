//! File-backed event log
//!
//! Layout under the root directory:
//!
//! ```text
//! <root>/<topic>/partition-<n>.jsonl          one record per line, offset = line number
//! <root>/_offsets/<group>/<topic>-<n>.offset   committed next offset, plain text
//! ```
//!
//! Several processes may share a root: producers append whole lines, consumers
//! index complete lines only and pick up new ones on the next read.

use crate::{check_partition, partition_for, BusError, Delivered, EventLog, Record, RecordPosition};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::NamedTempFile;
use tracing::{debug, info};

#[derive(Serialize, Deserialize)]
struct StoredLine {
    key: String,
    timestamp_ms: i64,
    value: String,
}

/// Byte index of the complete lines of one partition file
#[derive(Debug)]
struct PartitionIndex {
    path: PathBuf,
    line_starts: Vec<u64>,
    indexed_len: u64,
}

impl PartitionIndex {
    fn new(path: PathBuf) -> Self {
        Self {
            path,
            line_starts: Vec::new(),
            indexed_len: 0,
        }
    }

    /// Index lines appended since the last refresh; a trailing partial line
    /// is left for a later refresh
    fn refresh(&mut self) -> Result<(), BusError> {
        let mut file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(BusError::io(&self.path, e)),
        };
        let len = file
            .metadata()
            .map_err(|e| BusError::io(&self.path, e))?
            .len();
        if len <= self.indexed_len {
            return Ok(());
        }

        file.seek(SeekFrom::Start(self.indexed_len))
            .map_err(|e| BusError::io(&self.path, e))?;
        let mut buf = Vec::with_capacity((len - self.indexed_len) as usize);
        file.read_to_end(&mut buf)
            .map_err(|e| BusError::io(&self.path, e))?;

        let mut start = 0usize;
        for (i, byte) in buf.iter().enumerate() {
            if *byte == b'\n' {
                self.line_starts.push(self.indexed_len + start as u64);
                start = i + 1;
            }
        }
        self.indexed_len += start as u64;
        Ok(())
    }

    fn len(&self) -> u64 {
        self.line_starts.len() as u64
    }
}

/// Event log persisted as JSON-lines files.
///
/// File access runs on tokio's blocking pool; the async methods only hand
/// work over and await it.
#[derive(Debug, Clone)]
pub struct FileLog {
    inner: Arc<FileLogInner>,
}

#[derive(Debug)]
struct FileLogInner {
    root: PathBuf,
    partitions: u32,
    indexes: Mutex<HashMap<(String, u32), PartitionIndex>>,
}

impl FileLog {
    pub fn open(root: impl Into<PathBuf>, partitions: u32) -> Result<Self, BusError> {
        assert!(partitions > 0, "FileLog needs at least one partition");
        let root = root.into();
        fs::create_dir_all(&root).map_err(|e| BusError::io(&root, e))?;
        info!("Opened file event log at {:?} ({} partitions)", root, partitions);
        Ok(Self {
            inner: Arc::new(FileLogInner {
                root,
                partitions,
                indexes: Mutex::new(HashMap::new()),
            }),
        })
    }

    #[cfg(test)]
    fn partition_path(&self, topic: &str, partition: u32) -> PathBuf {
        self.inner.partition_path(topic, partition)
    }

    async fn blocking<T, F>(&self, f: F) -> Result<T, BusError>
    where
        T: Send + 'static,
        F: FnOnce(&FileLogInner) -> Result<T, BusError> + Send + 'static,
    {
        let inner = self.inner.clone();
        tokio::task::spawn_blocking(move || f(&inner))
            .await
            .map_err(|e| BusError::Blocking(e.to_string()))?
    }
}

impl FileLogInner {
    fn partition_path(&self, topic: &str, partition: u32) -> PathBuf {
        self.root
            .join(topic)
            .join(format!("partition-{}.jsonl", partition))
    }

    fn offset_path(&self, group: &str, topic: &str, partition: u32) -> PathBuf {
        self.root
            .join("_offsets")
            .join(group)
            .join(format!("{}-{}.offset", topic, partition))
    }

    fn with_index<T>(
        &self,
        topic: &str,
        partition: u32,
        f: impl FnOnce(&mut PartitionIndex) -> Result<T, BusError>,
    ) -> Result<T, BusError> {
        let mut indexes = self.indexes.lock();
        let index = indexes
            .entry((topic.to_string(), partition))
            .or_insert_with(|| PartitionIndex::new(self.partition_path(topic, partition)));
        index.refresh()?;
        f(index)
    }

    fn append(&self, topic: &str, partition: u32, bytes: &[u8]) -> Result<u64, BusError> {
        let path = self.partition_path(topic, partition);

        // Hold the index lock so the offset we report is the line we wrote
        let mut indexes = self.indexes.lock();
        let index = indexes
            .entry((topic.to_string(), partition))
            .or_insert_with(|| PartitionIndex::new(path.clone()));

        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).map_err(|e| BusError::io(dir, e))?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| BusError::io(&path, e))?;
        file.write_all(bytes).map_err(|e| BusError::io(&path, e))?;
        file.flush().map_err(|e| BusError::io(&path, e))?;

        index.refresh()?;
        Ok(index.len().saturating_sub(1))
    }

    fn read(
        &self,
        topic: &str,
        partition: u32,
        from_offset: u64,
        max_records: usize,
    ) -> Result<Vec<Delivered>, BusError> {
        self.with_index(topic, partition, |index| {
            if from_offset >= index.len() || max_records == 0 {
                return Ok(Vec::new());
            }
            let count = ((index.len() - from_offset) as usize).min(max_records);

            let mut file = File::open(&index.path).map_err(|e| BusError::io(&index.path, e))?;
            file.seek(SeekFrom::Start(index.line_starts[from_offset as usize]))
                .map_err(|e| BusError::io(&index.path, e))?;
            let reader = BufReader::new(file);

            let mut delivered = Vec::with_capacity(count);
            for (i, line) in reader.lines().take(count).enumerate() {
                let line = line.map_err(|e| BusError::io(&index.path, e))?;
                let offset = from_offset + i as u64;
                let stored: StoredLine =
                    serde_json::from_str(&line).map_err(|e| BusError::Corrupt {
                        location: format!("{}:{}", index.path.display(), offset),
                        reason: e.to_string(),
                    })?;
                delivered.push(Delivered {
                    partition,
                    offset,
                    record: Record {
                        key: stored.key,
                        value: stored.value.into_bytes(),
                        timestamp_ms: stored.timestamp_ms,
                    },
                });
            }
            debug!(
                "Read {} records from {}/{} at offset {}",
                delivered.len(),
                topic,
                partition,
                from_offset
            );
            Ok(delivered)
        })
    }

    fn committed(&self, group: &str, topic: &str, partition: u32) -> Result<Option<u64>, BusError> {
        let path = self.offset_path(group, topic, partition);
        match fs::read_to_string(&path) {
            Ok(text) => text
                .trim()
                .parse::<u64>()
                .map(Some)
                .map_err(|e| BusError::Corrupt {
                    location: path.display().to_string(),
                    reason: e.to_string(),
                }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(BusError::io(&path, e)),
        }
    }

    fn commit(&self, group: &str, topic: &str, partition: u32, next_offset: u64) -> Result<(), BusError> {
        let path = self.offset_path(group, topic, partition);
        let dir = path.parent().unwrap_or(&self.root);
        fs::create_dir_all(dir).map_err(|e| BusError::io(dir, e))?;

        let mut tmp = NamedTempFile::new_in(dir).map_err(|e| BusError::io(dir, e))?;
        tmp.write_all(next_offset.to_string().as_bytes())
            .map_err(|e| BusError::io(&path, e))?;
        tmp.persist(&path).map_err(|e| BusError::io(&path, e.error))?;
        Ok(())
    }
}

#[async_trait]
impl EventLog for FileLog {
    fn partitions(&self) -> u32 {
        self.inner.partitions
    }

    async fn append(&self, topic: &str, record: Record) -> Result<RecordPosition, BusError> {
        let partition = partition_for(&record.key, self.inner.partitions);
        let value = String::from_utf8(record.value)
            .map_err(|e| BusError::InvalidPayload(e.to_string()))?;
        let line = StoredLine {
            key: record.key,
            timestamp_ms: record.timestamp_ms,
            value,
        };
        let mut bytes = serde_json::to_vec(&line).map_err(|e| BusError::InvalidPayload(e.to_string()))?;
        bytes.push(b'\n');

        let topic = topic.to_string();
        let offset = self
            .blocking(move |inner| inner.append(&topic, partition, &bytes))
            .await?;
        Ok(RecordPosition { partition, offset })
    }

    async fn read(
        &self,
        topic: &str,
        partition: u32,
        from_offset: u64,
        max_records: usize,
    ) -> Result<Vec<Delivered>, BusError> {
        check_partition(topic, partition, self.inner.partitions)?;
        let topic = topic.to_string();
        self.blocking(move |inner| inner.read(&topic, partition, from_offset, max_records))
            .await
    }

    async fn end_offset(&self, topic: &str, partition: u32) -> Result<u64, BusError> {
        check_partition(topic, partition, self.inner.partitions)?;
        let topic = topic.to_string();
        self.blocking(move |inner| inner.with_index(&topic, partition, |index| Ok(index.len())))
            .await
    }

    async fn committed(
        &self,
        group: &str,
        topic: &str,
        partition: u32,
    ) -> Result<Option<u64>, BusError> {
        check_partition(topic, partition, self.inner.partitions)?;
        let (group, topic) = (group.to_string(), topic.to_string());
        self.blocking(move |inner| inner.committed(&group, &topic, partition))
            .await
    }

    async fn commit(
        &self,
        group: &str,
        topic: &str,
        partition: u32,
        next_offset: u64,
    ) -> Result<(), BusError> {
        check_partition(topic, partition, self.inner.partitions)?;
        let (group, topic) = (group.to_string(), topic.to_string());
        self.blocking(move |inner| inner.commit(&group, &topic, partition, next_offset))
            .await
    }
}
