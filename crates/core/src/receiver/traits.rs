//! Receiver collaborator traits.

use async_trait::async_trait;

use crate::converter::DeliveryBatch;
use crate::emitter::LogEmitter;
use crate::storage::Persister;

use super::types::{ConsumerError, UpstreamError};

/// Downstream sink for grouped records.
///
/// Called once per delivery batch, never concurrently. A failure is logged
/// and counted; the batch is not retried.
#[async_trait]
pub trait LogConsumer: Send + Sync {
    async fn consume_logs(&self, batch: DeliveryBatch) -> Result<(), ConsumerError>;
}

/// The upstream parsing graph that produces records.
#[async_trait]
pub trait LogPipeline: Send + Sync {
    /// Starts producing. Records go to `emitter`, checkpoints to `persister`.
    async fn start(&self, persister: Persister, emitter: LogEmitter) -> Result<(), UpstreamError>;

    /// Stops producing. No record is accepted after this returns.
    async fn stop(&self) -> Result<(), UpstreamError>;
}
