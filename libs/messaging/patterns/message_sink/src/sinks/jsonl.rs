//! JSON-lines file sink
//!
//! Stand-in for an online feature store: every message becomes one line
//! holding its payload object. A batch is written with a single write call.

use crate::{BatchResult, Message, MessageSink, SinkError, SinkMetadata};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info};

#[derive(Debug)]
pub struct JsonLinesSink {
    path: PathBuf,
    file: Mutex<File>,
    messages_sent: AtomicU64,
    messages_failed: AtomicU64,
}

impl JsonLinesSink {
    /// Open `path` for appending, creating parent directories as needed
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, SinkError> {
        let path = path.into();
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(dir).await?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        info!("Feature rows will be appended to {:?}", path);
        Ok(Self {
            path,
            file: Mutex::new(file),
            messages_sent: AtomicU64::new(0),
            messages_failed: AtomicU64::new(0),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn encode(message: &Message) -> Result<Vec<u8>, SinkError> {
        let mut line = serde_json::to_vec(&message.payload)?;
        line.push(b'\n');
        Ok(line)
    }
}

#[async_trait]
impl MessageSink for JsonLinesSink {
    async fn send(&self, message: Message) -> Result<(), SinkError> {
        let line = Self::encode(&message).inspect_err(|_| {
            self.messages_failed.fetch_add(1, Ordering::Relaxed);
        })?;
        let mut file = self.file.lock().await;
        file.write_all(&line).await?;
        file.flush().await?;
        self.messages_sent.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn send_batch(&self, messages: Vec<Message>) -> Result<BatchResult, SinkError> {
        let mut result = BatchResult::new(messages.len());
        let mut buffer = Vec::new();
        let mut encoded = 0usize;

        for (index, message) in messages.iter().enumerate() {
            match Self::encode(message) {
                Ok(line) => {
                    buffer.extend_from_slice(&line);
                    encoded += 1;
                }
                Err(e) => result.record_failure(index, e),
            }
        }

        if !buffer.is_empty() {
            let mut file = self.file.lock().await;
            file.write_all(&buffer).await?;
            file.flush().await?;
        }
        for _ in 0..encoded {
            result.record_success();
        }

        self.messages_sent
            .fetch_add(encoded as u64, Ordering::Relaxed);
        self.messages_failed
            .fetch_add(result.failed.len() as u64, Ordering::Relaxed);
        debug!("Wrote {} feature rows to {:?}", encoded, self.path);
        Ok(result)
    }

    async fn flush(&self) -> Result<(), SinkError> {
        let mut file = self.file.lock().await;
        file.flush().await?;
        file.sync_data().await?;
        Ok(())
    }

    fn metadata(&self) -> SinkMetadata {
        let mut metadata = SinkMetadata::new("feature-store-jsonl", "jsonl")
            .with_endpoint(self.path.display().to_string());
        metadata.messages_sent = self.messages_sent.load(Ordering::Relaxed);
        metadata.messages_failed = self.messages_failed.load(Ordering::Relaxed);
        metadata
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Map, Value};
    use tempfile::tempdir;

    fn row(pair: &str, close: f64) -> Message {
        let mut payload = Map::new();
        payload.insert("pair".into(), json!(pair));
        payload.insert("close".into(), json!(close));
        Message::new(pair, payload, 0)
    }

    #[tokio::test]
    async fn test_batch_appends_one_line_per_message() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store").join("features.jsonl");
        let sink = JsonLinesSink::open(&path).await.unwrap();

        let result = sink
            .send_batch(vec![row("BTC/USD", 1.0), row("ETH/USD", 2.0)])
            .await
            .unwrap();
        assert!(result.is_complete_success());
        sink.send(row("BTC/USD", 3.0)).await.unwrap();
        sink.flush().await.unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<Value> = text
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[1]["pair"], json!("ETH/USD"));
        assert_eq!(lines[2]["close"], json!(3.0));
        assert_eq!(sink.metadata().messages_sent, 3);
    }

    #[tokio::test]
    async fn test_reopen_appends() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("features.jsonl");
        {
            let sink = JsonLinesSink::open(&path).await.unwrap();
            sink.send_batch(vec![row("BTC/USD", 1.0)]).await.unwrap();
        }
        let sink = JsonLinesSink::open(&path).await.unwrap();
        sink.send_batch(vec![row("BTC/USD", 2.0)]).await.unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().count(), 2);
    }
}
