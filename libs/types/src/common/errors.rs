//! Error types for record validation
//!
//! Every record entering a stage is validated before it reaches stateful code.
//! A `ValidationError` rejects a single record; callers log it and move on.

use thiserror::Error;

/// Errors that can occur while decoding or validating a pipeline record
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    /// Payload could not be decoded (bad JSON, missing or mistyped field)
    #[error("Malformed record: {reason}")]
    Malformed { reason: String },

    /// Trading pair is empty or whitespace
    #[error("Trading pair cannot be empty")]
    EmptyPair,

    /// Numeric field is NaN or infinite
    #[error("Field '{field}' is not finite: {value}")]
    NotFinite { field: &'static str, value: f64 },

    /// Trade price must be strictly positive
    #[error("Price must be positive, got {price}")]
    NonPositivePrice { price: f64 },

    /// Trade volume cannot be negative
    #[error("Volume cannot be negative, got {volume}")]
    NegativeVolume { volume: f64 },

    /// Window end must be after window start
    #[error("Invalid window [{start_ms}, {end_ms})")]
    InvalidWindow { start_ms: i64, end_ms: i64 },

    /// Timestamp whose window does not fit in the millisecond range
    #[error("Timestamp {timestamp_ms} has no representable window")]
    TimestampOutOfRange { timestamp_ms: i64 },

    /// Indicator key collides with a candle field
    #[error("Indicator name '{name}' is reserved for candle fields")]
    ReservedIndicatorName { name: String },
}

impl ValidationError {
    /// Create a malformed-record error from any displayable cause
    pub fn malformed(reason: impl std::fmt::Display) -> Self {
        ValidationError::Malformed {
            reason: reason.to_string(),
        }
    }
}

impl From<serde_json::Error> for ValidationError {
    fn from(err: serde_json::Error) -> Self {
        ValidationError::malformed(err)
    }
}

/// Reject NaN and infinities for a named field
pub(crate) fn ensure_finite(field: &'static str, value: f64) -> Result<(), ValidationError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ValidationError::NotFinite { field, value })
    }
}
