//! Error types for the converter module.

use thiserror::Error;

/// Errors that can occur in the converter.
#[derive(Debug, Error)]
pub enum ConverterError {
    /// The converter no longer accepts batches.
    #[error("Converter is stopped, dropped {records} records")]
    Stopped { records: usize },

    /// One or more converter tasks ended abnormally while draining.
    #[error("Converter task failed: {0}")]
    TaskFailed(String),
}

impl ConverterError {
    /// Records lost because of this error, if known.
    pub fn dropped_records(&self) -> usize {
        match self {
            Self::Stopped { records } => *records,
            Self::TaskFailed(_) => 0,
        }
    }
}
