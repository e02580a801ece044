//! End-to-end test harness for the candle pipeline
//!
//! Runs the candles, indicators and feature-store stages together over one
//! `MemoryLog`, with checkpoint directories in a temp dir and a
//! `CollectorSink` standing in for the feature store.

pub mod fixtures;
pub mod harness;

pub use fixtures::*;
pub use harness::PipelineHarness;
