//! Types for the log receiver.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::config::ConfigError;
use crate::converter::{ConverterError, ConverterStatus};
use crate::emitter::EmitterError;
use crate::storage::StorageError;

/// Lifecycle of a receiver. `Stopped` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReceiverState {
    Created,
    Starting,
    Running,
    Stopping,
    Stopped,
}

impl ReceiverState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
        }
    }
}

impl std::fmt::Display for ReceiverState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned by a [`LogConsumer`](super::LogConsumer).
#[derive(Debug, Error)]
pub enum ConsumerError {
    /// The consumer refused the batch.
    #[error("consumer rejected batch: {0}")]
    Rejected(String),

    /// The consumer could not be reached.
    #[error("consumer unavailable: {0}")]
    Unavailable(String),
}

/// Error returned by a [`LogPipeline`](super::LogPipeline).
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("upstream pipeline failed: {0}")]
    Failed(String),

    #[error("upstream storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Errors that can occur while running a receiver.
#[derive(Debug, Error)]
pub enum ReceiverError {
    /// Operation not allowed in the current state.
    #[error("invalid receiver state: expected {expected}, got {actual}")]
    InvalidState {
        expected: ReceiverState,
        actual: ReceiverState,
    },

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("upstream error: {0}")]
    Upstream(#[from] UpstreamError),

    #[error("emitter error: {0}")]
    Emitter(#[from] EmitterError),

    #[error("converter error: {0}")]
    Converter(#[from] ConverterError),

    /// A pump task ended abnormally.
    #[error("task failed: {0}")]
    TaskFailed(String),

    /// The consumer did not finish within the shutdown timeout. Deliveries
    /// still pending were abandoned.
    #[error("shutdown timed out after {0:?}, pending deliveries were abandoned")]
    ShutdownTimeout(Duration),

    /// Everything that went wrong during shutdown.
    #[error("shutdown failed: {}", join_errors(.0))]
    Shutdown(Vec<ReceiverError>),
}

fn join_errors(errors: &[ReceiverError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Current status of a receiver.
#[derive(Debug, Clone, Serialize)]
pub struct ReceiverStatus {
    pub state: ReceiverState,
    /// Records accepted by the emitter.
    pub records_accepted: u64,
    /// Records the consumer acknowledged.
    pub records_delivered: u64,
    /// Accepted records that will never reach the consumer.
    pub records_dropped: u64,
    /// Delivery calls made.
    pub deliveries: u64,
    /// Delivery calls that failed or were abandoned at shutdown.
    pub deliveries_failed: u64,
    pub converter: ConverterStatus,
}
