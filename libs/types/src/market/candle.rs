//! OHLCV candle record and tumbling-window identity

use crate::common::errors::ValidationError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Half-open interval `[start_ms, end_ms)` of one tumbling window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WindowBounds {
    pub start_ms: i64,
    pub end_ms: i64,
}

impl WindowBounds {
    /// Window of length `interval_ms` that contains `timestamp_ms`.
    ///
    /// Uses floor division so timestamps before the epoch still map to the
    /// window that contains them. `interval_ms` must be positive; a window
    /// that would not fit in `i64` is rejected.
    pub fn containing(timestamp_ms: i64, interval_ms: i64) -> Result<Self, ValidationError> {
        debug_assert!(interval_ms > 0, "window interval must be positive");
        let start_ms = timestamp_ms
            .div_euclid(interval_ms)
            .checked_mul(interval_ms)
            .ok_or(ValidationError::TimestampOutOfRange { timestamp_ms })?;
        let end_ms = start_ms
            .checked_add(interval_ms)
            .ok_or(ValidationError::TimestampOutOfRange { timestamp_ms })?;
        Ok(Self { start_ms, end_ms })
    }

    pub fn contains(&self, timestamp_ms: i64) -> bool {
        self.start_ms <= timestamp_ms && timestamp_ms < self.end_ms
    }

    pub fn duration_ms(&self) -> i64 {
        self.end_ms - self.start_ms
    }
}

impl fmt::Display for WindowBounds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start_ms, self.end_ms)
    }
}

/// Open/high/low/close/volume summary of the trades of one pair in one window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub pair: String,
    pub window_start_ms: i64,
    pub window_end_ms: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    /// Latest trade timestamp folded into this candle
    pub timestamp_ms: i64,
    /// Window length the candle was built with
    pub candle_interval_seconds: u64,
}

impl Candle {
    /// Field names of the serialized record; indicator keys must avoid them
    pub const FIELD_NAMES: [&'static str; 10] = [
        "pair",
        "window_start_ms",
        "window_end_ms",
        "open",
        "high",
        "low",
        "close",
        "volume",
        "timestamp_ms",
        "candle_interval_seconds",
    ];

    pub fn bounds(&self) -> WindowBounds {
        WindowBounds {
            start_ms: self.window_start_ms,
            end_ms: self.window_end_ms,
        }
    }

    /// Same pair and same window, regardless of the aggregated values
    pub fn same_window(&self, other: &Candle) -> bool {
        self.window_start_ms == other.window_start_ms
            && self.window_end_ms == other.window_end_ms
            && self.pair == other.pair
    }

    pub fn history_key(&self) -> HistoryKey {
        HistoryKey::new(self.pair.clone(), self.candle_interval_seconds)
    }

    /// Decode a JSON payload and check its structural invariants
    pub fn from_json(payload: &[u8]) -> Result<Self, ValidationError> {
        let candle: Candle = serde_json::from_slice(payload)?;
        candle.validate()?;
        Ok(candle)
    }

    pub fn to_json(&self) -> Result<Vec<u8>, ValidationError> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Structural checks only; non-finite prices are left for the
    /// indicator stage to skip per indicator.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.pair.trim().is_empty() {
            return Err(ValidationError::EmptyPair);
        }
        if self.window_end_ms <= self.window_start_ms {
            return Err(ValidationError::InvalidWindow {
                start_ms: self.window_start_ms,
                end_ms: self.window_end_ms,
            });
        }
        Ok(())
    }
}

/// State-store key: one bounded history per pair and window size
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct HistoryKey {
    pub pair: String,
    pub interval_seconds: u64,
}

impl HistoryKey {
    pub fn new(pair: impl Into<String>, interval_seconds: u64) -> Self {
        Self {
            pair: pair.into(),
            interval_seconds,
        }
    }
}

impl fmt::Display for HistoryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}s", self.pair, self.interval_seconds)
    }
}
