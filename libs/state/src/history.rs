//! Bounded, ordered candle history for a single (pair, interval) key

use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use types::Candle;

/// What an upsert did to the history
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// New window appended
    Appended,
    /// New window appended and the oldest window evicted
    AppendedWithEviction { evicted_window_start_ms: i64 },
    /// Newest window replaced by a newer version of itself
    Replaced,
    /// Candle is older than the newest window and was ignored
    Stale { newest_window_start_ms: i64 },
}

impl UpsertOutcome {
    pub fn is_stale(&self) -> bool {
        matches!(self, UpsertOutcome::Stale { .. })
    }
}

/// Up to `capacity` most recent candles, oldest first.
///
/// Invariant: `window_start_ms` strictly increasing, `len() <= capacity`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandleHistory {
    capacity: NonZeroUsize,
    candles: Vec<Candle>,
}

impl CandleHistory {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            capacity,
            candles: Vec::with_capacity(capacity.get() + 1),
        }
    }

    /// Insert a candle, replacing the newest entry when it is the same window
    pub fn upsert(&mut self, candle: Candle) -> UpsertOutcome {
        let Some(newest) = self.candles.last_mut() else {
            self.candles.push(candle);
            return UpsertOutcome::Appended;
        };

        if newest.same_window(&candle) {
            *newest = candle;
            return UpsertOutcome::Replaced;
        }

        if candle.window_start_ms <= newest.window_start_ms {
            return UpsertOutcome::Stale {
                newest_window_start_ms: newest.window_start_ms,
            };
        }

        self.candles.push(candle);
        if self.candles.len() > self.capacity.get() {
            let evicted = self.candles.remove(0);
            return UpsertOutcome::AppendedWithEviction {
                evicted_window_start_ms: evicted.window_start_ms,
            };
        }
        UpsertOutcome::Appended
    }

    /// Candles oldest first
    pub fn candles(&self) -> &[Candle] {
        &self.candles
    }

    pub fn newest(&self) -> Option<&Candle> {
        self.candles.last()
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity.get()
    }

    /// Shrink to a new capacity, dropping the oldest entries that no longer fit
    pub(crate) fn set_capacity(&mut self, capacity: NonZeroUsize) {
        self.capacity = capacity;
        let excess = self.candles.len().saturating_sub(capacity.get());
        if excess > 0 {
            self.candles.drain(..excess);
        }
    }
}
