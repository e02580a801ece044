//! Pure indicator math over OHLCV columns.
//!
//! Every function takes oldest-first slices and returns the indicator's value
//! at the newest element. No I/O, no state between calls. The battery hands
//! each function exactly its lookback, so every recursion is seeded at the
//! start of that window.
//!
//! Smoothing conventions:
//! - EMA: `k = 2 / (period + 1)`, seeded with the SMA of the first `period`
//!   values
//! - Wilder (RSI, ATR, ADX): seeded with the plain average of the first
//!   `period` values, then `avg = (avg * (period - 1) + x) / period`

pub mod momentum;
pub mod moving;
pub mod volatility;

use thiserror::Error;
use types::Candle;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum IndicatorError {
    #[error("needs {required} candles, have {available}")]
    InsufficientHistory { required: usize, available: usize },

    #[error("{indicator}: {reason}")]
    Numeric {
        indicator: &'static str,
        reason: &'static str,
    },
}

pub type IndicatorResult<T> = Result<T, IndicatorError>;

pub(crate) fn ensure_len(values: &[f64], required: usize) -> IndicatorResult<()> {
    if values.len() < required {
        Err(IndicatorError::InsufficientHistory {
            required,
            available: values.len(),
        })
    } else {
        Ok(())
    }
}

pub(crate) fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// One Wilder smoothing step
pub(crate) fn wilder_step(average: f64, value: f64, period: usize) -> f64 {
    (average * (period as f64 - 1.0) + value) / period as f64
}

/// True range of bar `i` against the previous close; `i` must be ≥ 1
pub(crate) fn true_range(high: &[f64], low: &[f64], close: &[f64], i: usize) -> f64 {
    let prev_close = close[i - 1];
    (high[i] - low[i])
        .max((high[i] - prev_close).abs())
        .max((low[i] - prev_close).abs())
}

/// Input column of a candle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    High,
    Low,
    Close,
    Volume,
}

/// Column-oriented copy of a candle history
#[derive(Debug, Clone, Default)]
pub struct Series {
    pub high: Vec<f64>,
    pub low: Vec<f64>,
    pub close: Vec<f64>,
    pub volume: Vec<f64>,
}

impl Series {
    pub fn from_candles(candles: &[Candle]) -> Self {
        let mut series = Self {
            high: Vec::with_capacity(candles.len()),
            low: Vec::with_capacity(candles.len()),
            close: Vec::with_capacity(candles.len()),
            volume: Vec::with_capacity(candles.len()),
        };
        for candle in candles {
            series.high.push(candle.high);
            series.low.push(candle.low);
            series.close.push(candle.close);
            series.volume.push(candle.volume);
        }
        series
    }

    pub fn len(&self) -> usize {
        self.close.len()
    }

    pub fn is_empty(&self) -> bool {
        self.close.is_empty()
    }

    /// The newest `n` bars (all of them when `n` exceeds the length)
    pub fn tail(&self, n: usize) -> Columns<'_> {
        let start = self.len().saturating_sub(n);
        Columns {
            high: &self.high[start..],
            low: &self.low[start..],
            close: &self.close[start..],
            volume: &self.volume[start..],
        }
    }

    pub fn columns(&self) -> Columns<'_> {
        self.tail(self.len())
    }
}

/// Borrowed view over equally long columns
#[derive(Debug, Clone, Copy)]
pub struct Columns<'a> {
    pub high: &'a [f64],
    pub low: &'a [f64],
    pub close: &'a [f64],
    pub volume: &'a [f64],
}

impl<'a> Columns<'a> {
    pub fn len(&self) -> usize {
        self.close.len()
    }

    pub fn is_empty(&self) -> bool {
        self.close.is_empty()
    }

    pub fn field(&self, field: Field) -> &'a [f64] {
        match field {
            Field::High => self.high,
            Field::Low => self.low,
            Field::Close => self.close,
            Field::Volume => self.volume,
        }
    }

    /// Every value of the given columns is finite
    pub fn all_finite(&self, fields: &[Field]) -> bool {
        fields
            .iter()
            .all(|f| self.field(*f).iter().all(|v| v.is_finite()))
    }
}
