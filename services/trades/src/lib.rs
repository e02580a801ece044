//! # Trades Service - Mock Exchange Feed
//!
//! ## Purpose
//!
//! Feeds the pipeline without an exchange connection: a seeded random walk
//! per configured pair, published as JSON trades keyed by pair so every trade
//! of a pair lands in the same partition.
//!
//! ## Architecture Role
//!
//! ```text
//! TradeGenerator (random walk, round-robin over pairs)
//!        │ Trade::to_json
//!        ▼
//! trades topic ──► candles service
//! ```

pub mod generator;
pub mod producer;

pub use generator::TradeGenerator;
pub use producer::{publish_trade, run};
