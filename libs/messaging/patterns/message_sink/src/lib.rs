//! # Message Sink - Downstream Delivery of Feature Rows
//!
//! ## Purpose
//!
//! Abstracts the destination of the last pipeline stage. The stage hands over
//! batches of flat feature rows; the sink decides how they are stored. A sink
//! can push back with [`SinkError::Backpressure`], in which case the caller
//! waits and retries the same batch.
//!
//! ## Architecture Role
//!
//! ```text
//! to-feature-store ──send_batch(Vec<Message>)──► MessageSink
//!                                                   ├── JsonLinesSink (file)
//!                                                   └── CollectorSink (tests)
//! ```

pub mod batch;
pub mod error;
pub mod message;
pub mod metadata;
pub mod sinks;
pub mod test_utils;

use async_trait::async_trait;
use std::fmt::Debug;

pub use batch::BatchResult;
pub use error::SinkError;
pub use message::Message;
pub use metadata::SinkMetadata;
pub use sinks::JsonLinesSink;

/// A destination for feature rows
#[async_trait]
pub trait MessageSink: Send + Sync + Debug {
    /// Send a single message
    async fn send(&self, message: Message) -> Result<(), SinkError>;

    /// Send multiple messages in order, returning partial results.
    ///
    /// Backpressure aborts the whole batch with `Err`; any other per-message
    /// failure is reported in the [`BatchResult`].
    async fn send_batch(&self, messages: Vec<Message>) -> Result<BatchResult, SinkError> {
        let mut result = BatchResult::new(messages.len());

        for (index, message) in messages.into_iter().enumerate() {
            match self.send(message).await {
                Ok(()) => result.record_success(),
                Err(e @ SinkError::Backpressure { .. }) => return Err(e),
                Err(e) => result.record_failure(index, e),
            }
        }

        Ok(result)
    }

    /// Make previously sent messages durable
    async fn flush(&self) -> Result<(), SinkError> {
        Ok(())
    }

    /// Get sink metadata for debugging/monitoring
    fn metadata(&self) -> SinkMetadata {
        SinkMetadata::default()
    }
}
