//! Keyed bounded-history store
//!
//! Owned by exactly one partition worker; never shared across threads.

use crate::history::{CandleHistory, UpsertOutcome};
use crate::traits::{StateError, Stateful};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::convert::Infallible;
use std::num::NonZeroUsize;
use tracing::{debug, info};
use types::{Candle, HistoryKey};

/// Most recent `capacity` candles per (pair, interval)
#[derive(Debug, Clone)]
pub struct BoundedHistoryStore {
    capacity: NonZeroUsize,
    histories: HashMap<HistoryKey, CandleHistory>,
}

#[derive(Serialize, Deserialize)]
struct StoreSnapshot {
    histories: Vec<(HistoryKey, CandleHistory)>,
}

impl BoundedHistoryStore {
    pub fn new(capacity: usize) -> Result<Self, StateError> {
        let capacity = NonZeroUsize::new(capacity).ok_or_else(|| StateError::InvalidConfig {
            reason: "history capacity must be at least 1".to_string(),
        })?;
        Ok(Self {
            capacity,
            histories: HashMap::new(),
        })
    }

    /// Candles for `key`, oldest first; empty if the key was never seen
    pub fn get(&self, key: &HistoryKey) -> &[Candle] {
        self.histories
            .get(key)
            .map(CandleHistory::candles)
            .unwrap_or(&[])
    }

    pub fn upsert(&mut self, key: &HistoryKey, candle: Candle) -> UpsertOutcome {
        let capacity = self.capacity;
        let history = self
            .histories
            .entry(key.clone())
            .or_insert_with(|| CandleHistory::new(capacity));
        let outcome = history.upsert(candle);
        debug!(
            "Number of candles in state for {}: {} ({:?})",
            key,
            history.len(),
            outcome
        );
        outcome
    }

    pub fn capacity(&self) -> usize {
        self.capacity.get()
    }

    /// Number of keys tracked
    pub fn len(&self) -> usize {
        self.histories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.histories.is_empty()
    }
}

impl Stateful for BoundedHistoryStore {
    type Event = Candle;
    type Output = UpsertOutcome;
    type Error = Infallible;

    fn apply_event(&mut self, candle: Candle) -> Result<UpsertOutcome, Infallible> {
        let key = candle.history_key();
        Ok(self.upsert(&key, candle))
    }

    fn snapshot(&self) -> Result<Vec<u8>, StateError> {
        let mut histories: Vec<_> = self
            .histories
            .iter()
            .map(|(k, h)| (k.clone(), h.clone()))
            .collect();
        histories.sort_by(|a, b| a.0.cmp(&b.0));
        bincode::serialize(&StoreSnapshot { histories }).map_err(StateError::encode)
    }

    fn restore(&mut self, snapshot: &[u8]) -> Result<(), StateError> {
        let decoded: StoreSnapshot = bincode::deserialize(snapshot).map_err(StateError::decode)?;

        self.histories.clear();
        for (key, mut history) in decoded.histories {
            if history.capacity() != self.capacity.get() {
                info!(
                    "Resizing restored history {} from {} to {} candles",
                    key,
                    history.capacity(),
                    self.capacity
                );
                history.set_capacity(self.capacity);
            }
            self.histories.insert(key, history);
        }

        info!("Restored candle history for {} keys", self.histories.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candle(pair: &str, start: i64, close: f64) -> Candle {
        Candle {
            pair: pair.to_string(),
            window_start_ms: start,
            window_end_ms: start + 60_000,
            open: close,
            high: close + 1.0,
            low: close - 1.0,
            close,
            volume: 2.0,
            timestamp_ms: start + 30_000,
            candle_interval_seconds: 60,
        }
    }

    #[test]
    fn test_zero_capacity_rejected() {
        assert!(matches!(
            BoundedHistoryStore::new(0),
            Err(StateError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn test_unseen_key_is_empty() {
        let store = BoundedHistoryStore::new(4).unwrap();
        assert!(store.get(&HistoryKey::new("BTC/USD", 60)).is_empty());
    }

    #[test]
    fn test_keys_are_isolated() {
        let mut store = BoundedHistoryStore::new(4).unwrap();
        store.apply_event(candle("BTC/USD", 0, 100.0)).unwrap();
        store.apply_event(candle("ETH/USD", 0, 10.0)).unwrap();
        store.apply_event(candle("ETH/USD", 60_000, 11.0)).unwrap();

        assert_eq!(store.len(), 2);
        assert_eq!(store.get(&HistoryKey::new("BTC/USD", 60)).len(), 1);
        assert_eq!(store.get(&HistoryKey::new("ETH/USD", 60)).len(), 2);
        assert!(store.get(&HistoryKey::new("BTC/USD", 300)).is_empty());
    }

    #[test]
    fn test_snapshot_restore_roundtrip() {
        let mut store = BoundedHistoryStore::new(3).unwrap();
        for i in 0..5 {
            store.apply_event(candle("BTC/USD", i * 60_000, i as f64)).unwrap();
        }
        store.apply_event(candle("ETH/USD", 0, 7.0)).unwrap();

        let bytes = store.snapshot().unwrap();
        let mut restored = BoundedHistoryStore::new(3).unwrap();
        restored.restore(&bytes).unwrap();

        let key = HistoryKey::new("BTC/USD", 60);
        assert_eq!(restored.get(&key), store.get(&key));
        assert_eq!(restored.get(&key).len(), 3);
        assert_eq!(restored.len(), 2);
    }

    #[test]
    fn test_restore_into_smaller_capacity_truncates_oldest() {
        let mut store = BoundedHistoryStore::new(5).unwrap();
        for i in 0..5 {
            store.apply_event(candle("BTC/USD", i * 60_000, i as f64)).unwrap();
        }
        let bytes = store.snapshot().unwrap();

        let mut smaller = BoundedHistoryStore::new(2).unwrap();
        smaller.restore(&bytes).unwrap();
        let history = smaller.get(&HistoryKey::new("BTC/USD", 60));
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].close, 3.0);

        // New inserts honour the new capacity
        smaller.apply_event(candle("BTC/USD", 5 * 60_000, 5.0)).unwrap();
        assert_eq!(smaller.get(&HistoryKey::new("BTC/USD", 60)).len(), 2);
    }

    #[test]
    fn test_restore_garbage_fails() {
        let mut store = BoundedHistoryStore::new(2).unwrap();
        assert!(matches!(
            store.restore(&[0xff, 0x01]),
            Err(StateError::Decode { .. })
        ));
    }
}
