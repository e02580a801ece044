use crate::SinkError;
use serde::Serialize;
use serde_json::{Map, Value};

/// One feature row on its way to a sink
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    /// Entity key in the feature store (the trading pair)
    pub key: String,

    /// Flat JSON object of feature columns
    pub payload: Map<String, Value>,

    /// Event time of the row, milliseconds since the epoch
    pub timestamp_ms: i64,
}

impl Message {
    pub fn new(key: impl Into<String>, payload: Map<String, Value>, timestamp_ms: i64) -> Self {
        Self {
            key: key.into(),
            payload,
            timestamp_ms,
        }
    }

    /// Build from any value serializing to a JSON object
    pub fn from_serializable<T: Serialize>(
        key: impl Into<String>,
        value: &T,
        timestamp_ms: i64,
    ) -> Result<Self, SinkError> {
        match serde_json::to_value(value)? {
            Value::Object(payload) => Ok(Self::new(key, payload, timestamp_ms)),
            other => Err(SinkError::Encode(format!(
                "expected a JSON object, got {}",
                other
            ))),
        }
    }

    /// Decode a JSON object payload as read from the event log
    pub fn from_json_slice(
        key: impl Into<String>,
        bytes: &[u8],
        timestamp_ms: i64,
    ) -> Result<Self, SinkError> {
        let value: Value = serde_json::from_slice(bytes)?;
        Self::from_serializable(key, &value, timestamp_ms)
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.payload.get(column)
    }

    /// Encoded size in bytes
    pub fn size(&self) -> usize {
        serde_json::to_vec(&self.payload).map(|v| v.len()).unwrap_or(0)
    }
}
