use std::time::Duration;

#[derive(Debug, Clone, thiserror::Error)]
pub enum SinkError {
    /// Downstream asked us to slow down; the whole batch should be retried
    #[error("Sink backpressure, retry after {}ms", retry_after.as_millis())]
    Backpressure { retry_after: Duration },

    #[error("Message rejected by sink: {0}")]
    Rejected(String),

    #[error("Failed to encode message: {0}")]
    Encode(String),

    #[error("Sink closed")]
    Closed,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(String),
}

impl SinkError {
    /// Check if this is a recoverable error
    pub fn is_recoverable(&self) -> bool {
        matches!(self, SinkError::Backpressure { .. } | SinkError::Io(_))
    }

    /// Delay requested by the sink before the next attempt, if any
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            SinkError::Backpressure { retry_after } => Some(*retry_after),
            _ => None,
        }
    }

    pub fn backpressure(retry_after: Duration) -> Self {
        SinkError::Backpressure { retry_after }
    }

    pub fn invalid_config(msg: impl Into<String>) -> Self {
        SinkError::InvalidConfig(msg.into())
    }
}

impl From<std::io::Error> for SinkError {
    fn from(err: std::io::Error) -> Self {
        SinkError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for SinkError {
    fn from(err: serde_json::Error) -> Self {
        SinkError::Encode(err.to_string())
    }
}
