//! # Candles Service - Trades to Tumbling-Window OHLCV Candles
//!
//! ## Purpose
//!
//! Consumes the trades topic, groups each pair's trades into fixed-length
//! windows and publishes one OHLCV candle per window (or every update, in
//! `current` mode) to the candles topic, keyed by pair.
//!
//! ## Architecture Role
//!
//! ```text
//! trades topic ──► CandleStage (per partition)
//!                     ├── Trade::from_json + validate
//!                     ├── WindowingEngine ──► OhlcvAggregator
//!                     └── Candle::to_json ──► candles topic
//! ```
//!
//! Open windows are checkpointed with the consumed offset, so a restart
//! continues the windows it was building.

pub mod aggregator;
pub mod service;
pub mod window;

pub use aggregator::{init_candle, update_candle, CandleAggregator, OhlcvAggregator};
pub use service::{run, CandleStage};
pub use window::{WindowError, WindowingEngine};
