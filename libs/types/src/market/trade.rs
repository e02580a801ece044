//! Trade record as published by the trades stage

use crate::common::errors::{ensure_finite, ValidationError};
use serde::{Deserialize, Serialize};

/// A single executed trade for one trading pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub pair: String,
    pub price: f64,
    pub volume: f64,
    /// Exchange timestamp in milliseconds since the Unix epoch
    pub timestamp_ms: i64,
}

impl Trade {
    pub fn new(pair: impl Into<String>, price: f64, volume: f64, timestamp_ms: i64) -> Self {
        Self {
            pair: pair.into(),
            price,
            volume,
            timestamp_ms,
        }
    }

    /// Decode a JSON payload and validate it in one step
    pub fn from_json(payload: &[u8]) -> Result<Self, ValidationError> {
        let trade: Trade = serde_json::from_slice(payload)?;
        trade.validate()?;
        Ok(trade)
    }

    pub fn to_json(&self) -> Result<Vec<u8>, ValidationError> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Check the invariants a trade must satisfy before aggregation
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.pair.trim().is_empty() {
            return Err(ValidationError::EmptyPair);
        }
        ensure_finite("price", self.price)?;
        ensure_finite("volume", self.volume)?;
        if self.price <= 0.0 {
            return Err(ValidationError::NonPositivePrice { price: self.price });
        }
        if self.volume < 0.0 {
            return Err(ValidationError::NegativeVolume {
                volume: self.volume,
            });
        }
        Ok(())
    }
}
