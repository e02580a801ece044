//! # Technical Indicators Service - Candle History to Enriched Candles
//!
//! ## Purpose
//!
//! Consumes the candles topic, keeps the most recent candles per
//! (pair, interval) in a bounded history and publishes every candle merged
//! with the battery of indicators its history supports.
//!
//! ## Architecture Role
//!
//! ```text
//! candles topic ──► IndicatorStage (per partition)
//!                     ├── Candle::from_json + interval filter
//!                     ├── BoundedHistoryStore::upsert (replace / append / evict)
//!                     ├── IndicatorEngine::compute over the history (read-only)
//!                     └── EnrichedCandle::to_json ──► technical_indicators topic
//! ```
//!
//! ## Indicator Battery
//!
//! SMA 14, RSI 9/14/21, MACD 10/24/9, Bollinger bands 10/15/20, ADX 14,
//! EMA 10, ATR 14, ROC 10, MFI 14 and Williams %R 14. An indicator whose
//! lookback is not yet filled, whose inputs are not finite or whose math
//! degenerates is left out of the record; the others are unaffected.
//!
//! The history capacity must cover the longest lookback
//! ([`battery::max_required`]); the service refuses to start otherwise.

pub mod battery;
pub mod engine;
pub mod indicators;
pub mod service;

pub use battery::{max_required, IndicatorEntry, BATTERY};
pub use engine::IndicatorEngine;
pub use indicators::{IndicatorError, IndicatorResult};
pub use service::{check_capacity, run, IndicatorStage, IndicatorStageError};
