//! # Windowing Engine
//!
//! ## Purpose
//!
//! Splits the trade stream of every pair into tumbling windows of a fixed
//! length and drives the candle aggregator over each window.
//!
//! ## Window Lifecycle
//!
//! ```text
//! trade(pair, ts) ──► window = [floor(ts / I) * I, +I)
//!                        │
//!      no open window ───┼──► initialize           (open window for pair)
//!      same window ──────┼──► reduce
//!      later window ─────┼──► seal open window, initialize the new one
//!      earlier window ───┴──► LateTrade, nothing touched
//! ```
//!
//! ## Emission
//!
//! - [`EmitMode::Current`]: the updated open candle after every accepted trade
//! - [`EmitMode::Final`]: the sealed candle, once, when a later window opens
//!
//! Only one window per pair is open at a time, so memory is bounded by the
//! number of pairs.

use crate::aggregator::{CandleAggregator, OhlcvAggregator};
use serde::{Deserialize, Serialize};
use service_config::EmitMode;
use state_store::{StateError, Stateful};
use std::collections::HashMap;
use thiserror::Error;
use tracing::{debug, warn};
use types::{Candle, Trade, ValidationError, WindowBounds};

#[derive(Debug, Error)]
pub enum WindowError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Late trade for {pair}: window {window} is before open window {open}")]
    LateTrade {
        pair: String,
        window: WindowBounds,
        open: WindowBounds,
    },

    #[error("Window interval must be positive, got {interval_seconds}s")]
    InvalidInterval { interval_seconds: u64 },
}

#[derive(Serialize, Deserialize)]
struct EngineSnapshot {
    interval_ms: i64,
    open: Vec<Candle>,
}

#[derive(Debug)]
pub struct WindowingEngine<A = OhlcvAggregator> {
    interval_ms: i64,
    mode: EmitMode,
    aggregator: A,
    open: HashMap<String, Candle>,
}

impl WindowingEngine<OhlcvAggregator> {
    pub fn new(interval_seconds: u64, mode: EmitMode) -> Result<Self, WindowError> {
        Self::with_aggregator(interval_seconds, mode, OhlcvAggregator)
    }
}

impl<A: CandleAggregator> WindowingEngine<A> {
    pub fn with_aggregator(
        interval_seconds: u64,
        mode: EmitMode,
        aggregator: A,
    ) -> Result<Self, WindowError> {
        let interval_ms = i64::try_from(interval_seconds)
            .ok()
            .and_then(|s| s.checked_mul(1000))
            .filter(|ms| *ms > 0)
            .ok_or(WindowError::InvalidInterval { interval_seconds })?;
        Ok(Self {
            interval_ms,
            mode,
            aggregator,
            open: HashMap::new(),
        })
    }

    /// Feed one trade; returns the candle to publish, if any
    pub fn process(&mut self, trade: Trade) -> Result<Option<Candle>, WindowError> {
        trade.validate()?;
        let bounds = WindowBounds::containing(trade.timestamp_ms, self.interval_ms)?;

        let Some(open) = self.open.get_mut(&trade.pair) else {
            let candle = self.aggregator.initialize(&trade, bounds);
            debug!("Opened window {} for {}", bounds, trade.pair);
            let emitted = self.emit_current(&candle);
            self.open.insert(trade.pair, candle);
            return Ok(emitted);
        };

        let open_bounds = open.bounds();
        if bounds.start_ms == open_bounds.start_ms {
            *open = self.aggregator.reduce(open, &trade);
            return Ok(match self.mode {
                EmitMode::Current => Some(open.clone()),
                EmitMode::Final => None,
            });
        }

        if bounds.start_ms < open_bounds.start_ms {
            return Err(WindowError::LateTrade {
                pair: trade.pair,
                window: bounds,
                open: open_bounds,
            });
        }

        let sealed = std::mem::replace(open, self.aggregator.initialize(&trade, bounds));
        debug!(
            "Sealed window {} for {}, opened {}",
            open_bounds, sealed.pair, bounds
        );
        Ok(match self.mode {
            EmitMode::Current => Some(open.clone()),
            EmitMode::Final => Some(sealed),
        })
    }

    fn emit_current(&self, candle: &Candle) -> Option<Candle> {
        match self.mode {
            EmitMode::Current => Some(candle.clone()),
            EmitMode::Final => None,
        }
    }

    /// In-progress aggregate of a pair
    pub fn open_candle(&self, pair: &str) -> Option<&Candle> {
        self.open.get(pair)
    }

    pub fn open_pairs(&self) -> usize {
        self.open.len()
    }

    pub fn interval_ms(&self) -> i64 {
        self.interval_ms
    }
}

impl<A: CandleAggregator> Stateful for WindowingEngine<A> {
    type Event = Trade;
    type Output = Option<Candle>;
    type Error = WindowError;

    fn apply_event(&mut self, trade: Trade) -> Result<Option<Candle>, WindowError> {
        self.process(trade)
    }

    fn snapshot(&self) -> Result<Vec<u8>, StateError> {
        let mut open: Vec<Candle> = self.open.values().cloned().collect();
        open.sort_by(|a, b| a.pair.cmp(&b.pair));
        bincode::serialize(&EngineSnapshot {
            interval_ms: self.interval_ms,
            open,
        })
        .map_err(StateError::encode)
    }

    fn restore(&mut self, snapshot: &[u8]) -> Result<(), StateError> {
        let snapshot: EngineSnapshot =
            bincode::deserialize(snapshot).map_err(StateError::decode)?;
        self.open.clear();
        if snapshot.interval_ms != self.interval_ms {
            warn!(
                "Discarding {} open windows built with a {}ms interval (now {}ms)",
                snapshot.open.len(),
                snapshot.interval_ms,
                self.interval_ms
            );
            return Ok(());
        }
        self.open = snapshot
            .open
            .into_iter()
            .map(|candle| (candle.pair.clone(), candle))
            .collect();
        Ok(())
    }
}
