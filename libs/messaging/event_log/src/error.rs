use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum BusError {
    #[error("Partition {partition} out of range for topic '{topic}' ({partitions} partitions)")]
    UnknownPartition {
        topic: String,
        partition: u32,
        partitions: u32,
    },

    #[error("IO error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Corrupt log entry in {location}: {reason}")]
    Corrupt { location: String, reason: String },

    #[error("Payload is not valid UTF-8 JSON text: {0}")]
    InvalidPayload(String),

    #[error("Event log closed")]
    Closed,

    #[error("Blocking I/O task failed: {0}")]
    Blocking(String),
}

impl BusError {
    pub fn io(path: &Path, source: std::io::Error) -> Self {
        BusError::Io {
            path: path.display().to_string(),
            source,
        }
    }

    /// Transient failures a caller may retry
    pub fn is_recoverable(&self) -> bool {
        matches!(self, BusError::Io { .. })
    }
}
