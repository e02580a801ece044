//! State Management Traits
//!
//! Core traits for implementing stateful components with snapshot support.

use thiserror::Error;

/// Error types for state management operations
#[derive(Debug, Error)]
pub enum StateError {
    #[error("Snapshot encoding failed: {reason}")]
    Encode { reason: String },

    #[error("Snapshot decoding failed: {reason}")]
    Decode { reason: String },

    #[error("Checkpoint {path} is corrupt: {reason}")]
    Corrupt { path: String, reason: String },

    #[error("Checkpoint I/O failed for {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid state configuration: {reason}")]
    InvalidConfig { reason: String },
}

impl StateError {
    pub fn encode(err: impl std::fmt::Display) -> Self {
        StateError::Encode {
            reason: err.to_string(),
        }
    }

    pub fn decode(err: impl std::fmt::Display) -> Self {
        StateError::Decode {
            reason: err.to_string(),
        }
    }

    pub fn io(path: &std::path::Path, source: std::io::Error) -> Self {
        StateError::Io {
            path: path.display().to_string(),
            source,
        }
    }
}

/// Core trait for stateful components that can apply events
pub trait Stateful {
    /// Event type this component can handle
    type Event;

    /// What applying one event produces for downstream stages
    type Output;

    /// Error type for rejected events
    type Error: std::error::Error + Send + Sync + 'static;

    /// Apply an event to update the state
    fn apply_event(&mut self, event: Self::Event) -> Result<Self::Output, Self::Error>;

    /// Create a snapshot of the current state
    fn snapshot(&self) -> Result<Vec<u8>, StateError>;

    /// Restore state from a snapshot, replacing everything held now
    fn restore(&mut self, snapshot: &[u8]) -> Result<(), StateError>;
}
