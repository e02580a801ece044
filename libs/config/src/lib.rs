//! # Candlestream Centralized Configuration
//!
//! This crate provides configuration loading and shared defaults for all
//! pipeline services, so every stage agrees on topic names, window sizes
//! and state locations.
//!
//! ## Features
//!
//! - **Layered Loading**: TOML file, optional environment file, then
//!   `PIPELINE__SECTION__KEY` environment variables
//! - **Service Defaults**: one module of constants per stage
//! - **Validation**: obviously broken values are refused before a service starts
//!
//! ## Usage
//!
//! ```rust,no_run
//! use service_config::{load_config, EmitMode};
//!
//! let config = load_config(None, None).unwrap();
//! let interval = config.candles.candle_interval_seconds;
//! assert!(interval > 0);
//! if config.candles.emit_mode == EmitMode::Current {
//!     // intermediate candles are published after every trade
//! }
//! ```

pub mod service;
pub mod service_config;

// Re-export commonly used types
pub use service_config::{
    load_config, BusConfig, CandlesConfig, EmitMode, FeatureStoreConfig, IndicatorsConfig,
    PipelineConfig, TradesConfig,
};
