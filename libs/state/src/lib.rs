//! # Pipeline State Management - Bounded Candle History
//!
//! ## Purpose
//!
//! Per-key state owned by a single partition worker: the bounded, FIFO-evicted
//! history of recent candles per (pair, interval), plus the checkpoint files that
//! make any stage state survive a restart together with its stream offset.
//!
//! ## Integration Points
//!
//! - **Input Sources**: sealed or in-progress candles from the candles topic
//! - **Output Destinations**: technical indicator engine (read-only history access)
//! - **State Persistence**: atomic checkpoint files, one per consumed partition
//! - **Stateful Contract**: windowing engine and history store both implement
//!   `Stateful` so the partition worker can snapshot them uniformly
//!
//! ## Architecture Role
//!
//! ```text
//! Candle Events → [CandleHistory per key] → [Indicator Engine reads]
//!       ↓                   ↓                         ↓
//! upsert(key, c)     replace-or-append          oldest-first slice
//! stale rejected     evict oldest > N           never mutated by readers
//!
//! Checkpoint: state snapshot + next offset → temp file → atomic rename
//! ```
//!
//! ## Invariants
//!
//! - History windows are strictly increasing by `window_start_ms`
//! - A history never holds more than its capacity
//! - A checkpoint is either fully written or not visible at all

pub mod checkpoint;
pub mod history;
pub mod store;
pub mod traits;

pub use checkpoint::{Checkpoint, CheckpointStore};
pub use history::{CandleHistory, UpsertOutcome};
pub use store::BoundedHistoryStore;

// Re-export core traits for convenience
pub use traits::{StateError, Stateful};
