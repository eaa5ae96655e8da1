//! Error types for the record module.

use thiserror::Error;

/// Reasons a record cannot be represented downstream.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordError {
    /// An attribute mapping contains an empty key.
    #[error("empty attribute key in {location}")]
    EmptyKey { location: String },

    /// A float value is NaN or infinite.
    #[error("non-finite float at {location}")]
    NonFiniteFloat { location: String },
}
