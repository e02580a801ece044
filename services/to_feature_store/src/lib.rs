//! # Feature Store Writer - Enriched Candles to the Feature Store
//!
//! ## Purpose
//!
//! Last stage of the pipeline. Reads indicator-enriched candles, groups them
//! into batches and hands them to a [`message_sink::MessageSink`]. Offsets are
//! committed only after the sink accepted the batch, so a restart re-delivers
//! anything the sink never confirmed.
//!
//! ## Architecture Role
//!
//! ```text
//! technical_indicators topic ──► FeatureWriter (per partition)
//!                                   ├── Message::from_json_slice
//!                                   ├── batch_size / idle flush
//!                                   └── MessageSink::send_batch
//!                                         └── Backpressure → wait, resend
//! ```

pub mod writer;

pub use writer::{run, run_partition, WriterSettings};
