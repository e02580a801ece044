//! # Candlestream Types Library
//!
//! Record types exchanged between the pipeline stages.
//!
//! ## Design Philosophy
//!
//! - **Typed Records**: Trades and candles are explicit structs, never loose JSON maps
//! - **Validate at the Boundary**: `Trade::from_json` rejects malformed or non-finite
//!   input before any stage touches its state
//! - **Window Identity**: `WindowBounds` is the single place that maps a timestamp to
//!   its tumbling window
//! - **Disjoint Namespaces**: indicator keys can never shadow candle fields
//!
//! ## Quick Start
//!
//! ```rust
//! use types::{Trade, WindowBounds};
//!
//! let trade = Trade::new("BTC/USD", 100.0, 0.5, 125_000);
//! trade.validate().unwrap();
//!
//! let bounds = WindowBounds::containing(trade.timestamp_ms, 60_000).unwrap();
//! assert_eq!((bounds.start_ms, bounds.end_ms), (120_000, 180_000));
//! ```
//!
//! ## Integration Points
//!
//! - **trades**: produces `Trade` records keyed by pair
//! - **candles**: consumes `Trade`, produces `Candle`
//! - **technical-indicators**: consumes `Candle`, produces `EnrichedCandle`
//! - **to-feature-store**: consumes enriched records as flat JSON objects

pub mod common;
pub mod market;

pub use common::errors::ValidationError;
pub use market::candle::{Candle, HistoryKey, WindowBounds};
pub use market::indicators::{EnrichedCandle, IndicatorSet};
pub use market::trade::Trade;

pub type Result<T> = std::result::Result<T, ValidationError>;
