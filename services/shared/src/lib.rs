//! # Stream Service Shared - Runtime Pieces Common to Every Stage
//!
//! ## Purpose
//!
//! The candle and indicator stages are the same loop around different state:
//! consume a partition, apply each record to a [`Stateful`] processor, publish
//! the outputs, checkpoint, commit. This crate owns that loop together with
//! logging setup and the per-stage counters.
//!
//! ## Architecture Role
//!
//! ```text
//!   service main ──init_logging──► tracing subscriber
//!        │
//!        ├── spawn_partition_workers ──► run_partition_worker × partitions
//!        │                                 poll → apply → append → checkpoint → commit
//!        ├── shutdown_on_ctrl_c ──► watch channel ──► every worker
//!        └── supervise ──► first fatal error stops the stage
//! ```
//!
//! [`Stateful`]: state_store::Stateful

pub mod logging;
pub mod metrics;
pub mod worker;

pub use logging::init_logging;
pub use metrics::{spawn_reporter, MetricsSnapshot, StageMetrics};
pub use worker::{
    consumer_options, run_partition_worker, shutdown_on_ctrl_c, spawn_partition_workers,
    supervise, RecordProcessor, WorkerSettings,
};
