//! Mock upstream pipeline for testing.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::emitter::{EmitterError, LogEmitter};
use crate::receiver::{LogPipeline, UpstreamError};
use crate::record::Record;
use crate::storage::Persister;

/// Mock implementation of the LogPipeline trait.
///
/// Stands in for the parsing graph: tests push records through
/// [`MockPipeline::emit`] once the receiver has started it.
#[derive(Default)]
pub struct MockPipeline {
    /// Emitter handed over on start; cleared on stop.
    emitter: Arc<RwLock<Option<LogEmitter>>>,
    /// Persister handed over on start.
    persister: Arc<RwLock<Option<Persister>>>,
    start_calls: Arc<RwLock<usize>>,
    stop_calls: Arc<RwLock<usize>>,
    /// Records emitted as part of start.
    initial_records: Arc<RwLock<Vec<Record>>>,
    start_error: Arc<RwLock<Option<UpstreamError>>>,
    stop_error: Arc<RwLock<Option<UpstreamError>>>,
}

impl MockPipeline {
    /// Create a new mock pipeline.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue records to be emitted while the pipeline starts.
    pub async fn set_initial_records(&self, records: Vec<Record>) {
        *self.initial_records.write().await = records;
    }

    /// Configure the next start to fail.
    pub async fn set_start_error(&self, error: UpstreamError) {
        *self.start_error.write().await = Some(error);
    }

    /// Configure the next stop to fail.
    pub async fn set_stop_error(&self, error: UpstreamError) {
        *self.stop_error.write().await = Some(error);
    }

    /// Emit one record, as the parser would.
    pub async fn emit(&self, record: Record) -> Result<(), EmitterError> {
        let emitter = self.emitter.read().await.clone();
        match emitter {
            Some(emitter) => emitter.accept(record).await,
            None => Err(EmitterError::Stopped),
        }
    }

    /// Emit records in order, stopping at the first error.
    pub async fn emit_all(&self, records: impl IntoIterator<Item = Record>) -> Result<(), EmitterError> {
        for record in records {
            self.emit(record).await?;
        }
        Ok(())
    }

    /// The persister received on start.
    pub async fn persister(&self) -> Option<Persister> {
        self.persister.read().await.clone()
    }

    pub async fn start_count(&self) -> usize {
        *self.start_calls.read().await
    }

    pub async fn stop_count(&self) -> usize {
        *self.stop_calls.read().await
    }

    /// Whether the pipeline currently holds an emitter.
    pub async fn is_running(&self) -> bool {
        self.emitter.read().await.is_some()
    }
}

#[async_trait]
impl LogPipeline for MockPipeline {
    async fn start(&self, persister: Persister, emitter: LogEmitter) -> Result<(), UpstreamError> {
        *self.start_calls.write().await += 1;
        if let Some(err) = self.start_error.write().await.take() {
            return Err(err);
        }

        let initial = std::mem::take(&mut *self.initial_records.write().await);
        for record in initial {
            emitter
                .accept(record)
                .await
                .map_err(|e| UpstreamError::Failed(e.to_string()))?;
        }

        *self.persister.write().await = Some(persister);
        *self.emitter.write().await = Some(emitter);
        Ok(())
    }

    async fn stop(&self) -> Result<(), UpstreamError> {
        *self.stop_calls.write().await += 1;
        self.emitter.write().await.take();
        if let Some(err) = self.stop_error.write().await.take() {
            return Err(err);
        }
        Ok(())
    }
}
