//! Log emitter implementation.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::ConfigError;
use crate::metrics;
use crate::record::Record;

use super::config::EmitterConfig;
use super::types::{Batch, FlushTrigger};

/// Error type for emitter operations.
#[derive(Debug, thiserror::Error)]
pub enum EmitterError {
    /// The emitter was stopped; the record was not accepted.
    #[error("Emitter is stopped")]
    Stopped,

    /// The output queue reader is gone; the closed batch was lost.
    #[error("Emitter output queue closed, dropped {records} records")]
    QueueClosed { records: usize },
}

/// Open batch plus the sending half of the output queue.
///
/// Both flush triggers take this lock, close the batch and push it before
/// releasing it, so a batch is pushed exactly once.
struct EmitterState {
    buffer: Vec<Record>,
    tx: Option<mpsc::Sender<Batch>>,
}

struct EmitterInner {
    config: EmitterConfig,
    state: Mutex<EmitterState>,
    ticker: Mutex<Option<JoinHandle<()>>>,
    shutdown_tx: broadcast::Sender<()>,
    accepted: AtomicU64,
    refused: AtomicU64,
    dropped: AtomicU64,
    batches: AtomicU64,
}

/// Accumulates records into batches and exposes them on a bounded queue.
///
/// This is cheaply cloneable; the upstream pipeline holds a clone and calls
/// [`LogEmitter::accept`] for every record it produces.
#[derive(Clone)]
pub struct LogEmitter {
    inner: Arc<EmitterInner>,
}

impl LogEmitter {
    /// Creates an emitter and the receiving half of its output queue.
    ///
    /// Fails if the configuration disables both flush triggers.
    pub fn channel(config: EmitterConfig) -> Result<(Self, mpsc::Receiver<Batch>), ConfigError> {
        config.validate()?;

        let (tx, rx) = mpsc::channel(config.queue_capacity);
        let (shutdown_tx, _) = broadcast::channel(1);

        let emitter = Self {
            inner: Arc::new(EmitterInner {
                config,
                state: Mutex::new(EmitterState {
                    buffer: Vec::new(),
                    tx: Some(tx),
                }),
                ticker: Mutex::new(None),
                shutdown_tx,
                accepted: AtomicU64::new(0),
                refused: AtomicU64::new(0),
                dropped: AtomicU64::new(0),
                batches: AtomicU64::new(0),
            }),
        };
        Ok((emitter, rx))
    }

    /// Starts the flush ticker, if a flush interval is configured.
    pub async fn start(&self) {
        let Some(interval) = self.inner.config.flush_interval() else {
            debug!("Emitter started without flush ticker");
            return;
        };

        let mut ticker_slot = self.inner.ticker.lock().await;
        if ticker_slot.is_some() {
            warn!("Emitter already started");
            return;
        }

        let inner = Arc::clone(&self.inner);
        let mut shutdown_rx = self.inner.shutdown_tx.subscribe();

        *ticker_slot = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            // The first tick completes immediately.
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => break,
                    _ = ticker.tick() => {
                        if let Err(e) = inner.flush(FlushTrigger::Interval).await {
                            warn!("Interval flush failed: {}", e);
                        }
                    }
                }
            }
            debug!("Emitter flush ticker stopped");
        }));

        info!(interval_ms = interval.as_millis() as u64, "Emitter started");
    }

    /// Appends a record to the open batch.
    ///
    /// Waits while the output queue is full. When the record fills the batch
    /// it is closed and pushed before this returns.
    pub async fn accept(&self, record: Record) -> Result<(), EmitterError> {
        let inner = &self.inner;
        let mut state = inner.state.lock().await;

        let Some(tx) = state.tx.clone() else {
            inner.refused.fetch_add(1, Ordering::Relaxed);
            metrics::RECORDS_REFUSED.inc();
            return Err(EmitterError::Stopped);
        };

        state.buffer.push(record);
        inner.accepted.fetch_add(1, Ordering::Relaxed);
        metrics::RECORDS_ACCEPTED.inc();

        if let Some(threshold) = inner.config.size_threshold() {
            if state.buffer.len() >= threshold {
                let records = std::mem::take(&mut state.buffer);
                inner.push(&tx, records, FlushTrigger::Size).await?;
            }
        }
        Ok(())
    }

    /// Stops the ticker, flushes the open batch and closes the output queue.
    ///
    /// Calling this more than once is a no-op.
    pub async fn stop(&self) -> Result<(), EmitterError> {
        let inner = &self.inner;
        let _ = inner.shutdown_tx.send(());

        if let Some(handle) = inner.ticker.lock().await.take() {
            if let Err(e) = handle.await {
                warn!("Emitter flush ticker ended abnormally: {}", e);
            }
        }

        let mut state = inner.state.lock().await;
        let Some(tx) = state.tx.take() else {
            return Ok(());
        };

        let records = std::mem::take(&mut state.buffer);
        let result = if records.is_empty() {
            Ok(())
        } else {
            inner.push(&tx, records, FlushTrigger::Stop).await
        };

        info!(
            accepted = inner.accepted.load(Ordering::Relaxed),
            batches = inner.batches.load(Ordering::Relaxed),
            "Emitter stopped"
        );
        result
    }

    /// Total records accepted.
    pub fn accepted_count(&self) -> u64 {
        self.inner.accepted.load(Ordering::Relaxed)
    }

    /// Records refused because the emitter was stopped.
    pub fn refused_count(&self) -> u64 {
        self.inner.refused.load(Ordering::Relaxed)
    }

    /// Accepted records lost because the output queue closed.
    pub fn dropped_count(&self) -> u64 {
        self.inner.dropped.load(Ordering::Relaxed)
    }

    /// Total batches pushed to the output queue.
    pub fn batch_count(&self) -> u64 {
        self.inner.batches.load(Ordering::Relaxed)
    }
}

impl EmitterInner {
    /// Closes and pushes the open batch, if it has any records.
    async fn flush(&self, trigger: FlushTrigger) -> Result<(), EmitterError> {
        let mut state = self.state.lock().await;
        if state.buffer.is_empty() {
            return Ok(());
        }
        let Some(tx) = state.tx.clone() else {
            return Ok(());
        };

        let records = std::mem::take(&mut state.buffer);
        self.push(&tx, records, trigger).await
    }

    /// Sends a closed batch. Called with the state lock held.
    async fn push(
        &self,
        tx: &mpsc::Sender<Batch>,
        records: Vec<Record>,
        trigger: FlushTrigger,
    ) -> Result<(), EmitterError> {
        let count = records.len();
        if tx.capacity() == 0 {
            debug!(records = count, "Emitter output queue full, waiting");
        }

        if tx.send(Batch::new(records, trigger)).await.is_err() {
            self.dropped.fetch_add(count as u64, Ordering::Relaxed);
            metrics::RECORDS_DROPPED
                .with_label_values(&["emitter"])
                .inc_by(count as u64);
            return Err(EmitterError::QueueClosed { records: count });
        }

        self.batches.fetch_add(1, Ordering::Relaxed);
        metrics::EMITTER_BATCHES
            .with_label_values(&[trigger.as_str()])
            .inc();
        metrics::EMITTER_BATCH_SIZE
            .with_label_values(&[trigger.as_str()])
            .observe(count as f64);
        debug!(records = count, trigger = trigger.as_str(), "Emitter flushed batch");
        Ok(())
    }
}
