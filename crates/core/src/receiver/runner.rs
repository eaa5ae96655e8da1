//! Log receiver implementation.
//!
//! Wires the upstream pipeline, emitter, converter and consumer together:
//! - Pump A: emitter queue -> converter input
//! - Pump B: converter output -> consumer, one delivery at a time
//!
//! Keeping the two pumps apart means a slow consumer only stalls record
//! acceptance once the converter's own queues are full.
//!
//! `stop` gives the consumer `shutdown_timeout_ms` to take what is left.
//! Past that deadline the in-flight delivery is cancelled and every batch
//! still queued is dropped, so a hung consumer cannot hold shutdown open.

use std::sync::atomic::{AtomicU64, Ordering};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{broadcast, mpsc, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::config::{validate_config, Config, ConfigError};
use crate::converter::{DeliveryBatch, LogConverter};
use crate::emitter::{Batch, LogEmitter};
use crate::metrics;
use crate::storage::{NopStorageClient, Persister, StorageClient, StorageHost};

use super::traits::{LogConsumer, LogPipeline};
use super::types::{ReceiverError, ReceiverState, ReceiverStatus};

/// Delivery counters shared with pump B.
#[derive(Default)]
struct DeliveryStats {
    records_delivered: AtomicU64,
    records_undelivered: AtomicU64,
    deliveries: AtomicU64,
    deliveries_failed: AtomicU64,
}

impl DeliveryStats {
    fn record_undelivered(&self, records: usize) {
        self.records_undelivered
            .fetch_add(records as u64, Ordering::Relaxed);
        metrics::RECORDS_DROPPED
            .with_label_values(&["pump"])
            .inc_by(records as u64);
    }
}

/// How a single delivery ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Delivery {
    Completed,
    Cancelled,
}

#[derive(Default)]
struct Pumps {
    forward: Option<JoinHandle<()>>,
    deliver: Option<JoinHandle<()>>,
}

/// Receives records from an upstream pipeline and delivers them, grouped by
/// resource, to a consumer.
pub struct LogReceiver {
    id: String,
    pipeline: Arc<dyn LogPipeline>,
    consumer: Arc<dyn LogConsumer>,
    storage_host: Arc<dyn StorageHost>,
    emitter: LogEmitter,
    converter: Arc<LogConverter>,
    shutdown_timeout: Duration,

    // Runtime state
    lifecycle: Mutex<()>,
    state: RwLock<ReceiverState>,
    emitter_rx: Mutex<Option<mpsc::Receiver<Batch>>>,
    storage: Mutex<Option<Arc<dyn StorageClient>>>,
    pumps: Mutex<Pumps>,
    shutdown_tx: broadcast::Sender<()>,
    stats: Arc<DeliveryStats>,
}

impl LogReceiver {
    /// Builds a receiver. Fails if the configuration is invalid.
    pub fn new(
        config: &Config,
        pipeline: Arc<dyn LogPipeline>,
        consumer: Arc<dyn LogConsumer>,
        storage_host: Arc<dyn StorageHost>,
    ) -> Result<Self, ConfigError> {
        validate_config(config)?;

        let (emitter, emitter_rx) = LogEmitter::channel(config.emitter.clone())?;
        let converter = LogConverter::new(config.converter.clone())?;
        let (shutdown_tx, _) = broadcast::channel(1);

        Ok(Self {
            id: config.receiver.id.clone(),
            pipeline,
            consumer,
            storage_host,
            emitter,
            converter: Arc::new(converter),
            shutdown_timeout: config.receiver.shutdown_timeout(),
            lifecycle: Mutex::new(()),
            state: RwLock::new(ReceiverState::Created),
            emitter_rx: Mutex::new(Some(emitter_rx)),
            storage: Mutex::new(None),
            pumps: Mutex::new(Pumps::default()),
            shutdown_tx,
            stats: Arc::new(DeliveryStats::default()),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Starts the receiver.
    ///
    /// A receiver starts once. If any step fails, whatever was already
    /// started is torn down and the receiver ends up `Stopped`.
    pub async fn start(&self) -> Result<(), ReceiverError> {
        let _guard = self.lifecycle.lock().await;
        {
            let mut state = self.state.write().await;
            if *state != ReceiverState::Created {
                return Err(ReceiverError::InvalidState {
                    expected: ReceiverState::Created,
                    actual: *state,
                });
            }
            *state = ReceiverState::Starting;
        }

        info!(receiver = %self.id, "Starting log receiver");

        let client = match self.storage_host.storage_client(&self.id).await {
            Ok(Some(client)) => client,
            Ok(None) => {
                debug!(receiver = %self.id, "No storage configured, checkpoints are discarded");
                Arc::new(NopStorageClient::new()) as Arc<dyn StorageClient>
            }
            Err(e) => {
                error!(receiver = %self.id, error = %e, "Failed to acquire storage client");
                self.abort_start().await;
                return Err(e.into());
            }
        };
        *self.storage.lock().await = Some(Arc::clone(&client));
        let persister = Persister::new(client, self.id.clone());

        self.emitter.start().await;
        self.converter.start().await;
        self.spawn_pumps().await;

        if let Err(e) = self.pipeline.start(persister, self.emitter.clone()).await {
            error!(receiver = %self.id, error = %e, "Upstream pipeline failed to start");
            self.abort_start().await;
            return Err(e.into());
        }

        *self.state.write().await = ReceiverState::Running;
        info!(receiver = %self.id, "Log receiver started");
        Ok(())
    }

    /// Stops the receiver, draining every accepted record to the consumer.
    ///
    /// Stopping an already stopped receiver is a no-op. Every failure along
    /// the way is collected into [`ReceiverError::Shutdown`].
    pub async fn stop(&self) -> Result<(), ReceiverError> {
        let _guard = self.lifecycle.lock().await;
        let previous = {
            let mut state = self.state.write().await;
            let previous = *state;
            if matches!(previous, ReceiverState::Stopping | ReceiverState::Stopped) {
                debug!(receiver = %self.id, "Log receiver already stopped");
                return Ok(());
            }
            *state = ReceiverState::Stopping;
            previous
        };

        info!(receiver = %self.id, "Stopping log receiver");
        let errors = self.shutdown(previous == ReceiverState::Running).await;
        *self.state.write().await = ReceiverState::Stopped;

        let status = self.status().await;
        info!(
            receiver = %self.id,
            accepted = status.records_accepted,
            delivered = status.records_delivered,
            dropped = status.records_dropped,
            "Log receiver stopped"
        );

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ReceiverError::Shutdown(errors))
        }
    }

    /// Get current receiver status.
    pub async fn status(&self) -> ReceiverStatus {
        let converter = self.converter.status();
        let records_dropped = self.emitter.dropped_count()
            + converter.records_dropped
            + self.stats.records_undelivered.load(Ordering::Relaxed);

        ReceiverStatus {
            state: *self.state.read().await,
            records_accepted: self.emitter.accepted_count(),
            records_delivered: self.stats.records_delivered.load(Ordering::Relaxed),
            records_dropped,
            deliveries: self.stats.deliveries.load(Ordering::Relaxed),
            deliveries_failed: self.stats.deliveries_failed.load(Ordering::Relaxed),
            converter,
        }
    }

    async fn abort_start(&self) {
        for e in self.shutdown(false).await {
            warn!(receiver = %self.id, error = %e, "Cleanup after failed start");
        }
        *self.state.write().await = ReceiverState::Stopped;
    }

    /// Tears everything down in dependency order and collects failures.
    ///
    /// The pipeline stop is awaited without bound. Every later step shares
    /// one deadline; once it passes, pending deliveries are abandoned.
    async fn shutdown(&self, stop_pipeline: bool) -> Vec<ReceiverError> {
        let mut errors = Vec::new();

        if stop_pipeline {
            if let Err(e) = self.pipeline.stop().await {
                warn!(receiver = %self.id, error = %e, "Upstream pipeline stop failed");
                errors.push(e.into());
            }
        }

        let deadline = tokio::time::Instant::now() + self.shutdown_timeout;
        let mut cancelled = false;

        // Final flush and close of the emitter queue; pump A drains it.
        let result = self
            .before_deadline(deadline, &mut cancelled, self.emitter.stop())
            .await;
        if let Err(e) = result {
            errors.push(e.into());
        }
        let forward = self.pumps.lock().await.forward.take();
        if let Some(handle) = forward {
            let result = self.before_deadline(deadline, &mut cancelled, handle).await;
            if let Err(e) = result {
                errors.push(ReceiverError::TaskFailed(format!("forward pump: {}", e)));
            }
        }

        // Pump B keeps delivering while the converter flushes.
        let result = self
            .before_deadline(deadline, &mut cancelled, self.converter.stop())
            .await;
        if let Err(e) = result {
            errors.push(e.into());
        }
        let deliver = self.pumps.lock().await.deliver.take();
        if let Some(handle) = deliver {
            let result = self.before_deadline(deadline, &mut cancelled, handle).await;
            if let Err(e) = result {
                errors.push(ReceiverError::TaskFailed(format!("delivery pump: {}", e)));
            }
        }

        if cancelled {
            errors.push(ReceiverError::ShutdownTimeout(self.shutdown_timeout));
        }

        let storage = self.storage.lock().await.take();
        if let Some(client) = storage {
            if let Err(e) = client.close().await {
                warn!(receiver = %self.id, error = %e, "Failed to close storage client");
                errors.push(e.into());
            }
        }

        errors
    }

    /// Awaits `step`. If `deadline` passes first, signals the pumps to
    /// abandon their work and then waits for `step` to finish.
    async fn before_deadline<F: Future>(
        &self,
        deadline: tokio::time::Instant,
        cancelled: &mut bool,
        step: F,
    ) -> F::Output {
        tokio::pin!(step);
        if !*cancelled {
            tokio::select! {
                output = &mut step => return output,
                _ = tokio::time::sleep_until(deadline) => {
                    warn!(
                        receiver = %self.id,
                        timeout_ms = self.shutdown_timeout.as_millis() as u64,
                        "Shutdown timeout reached, abandoning pending deliveries"
                    );
                    let _ = self.shutdown_tx.send(());
                    *cancelled = true;
                }
            }
        }
        step.await
    }

    async fn spawn_pumps(&self) {
        let mut pumps = self.pumps.lock().await;

        if let Some(batches) = self.emitter_rx.lock().await.take() {
            pumps.forward = Some(tokio::spawn(forward_loop(
                self.id.clone(),
                batches,
                Arc::clone(&self.converter),
                self.shutdown_tx.subscribe(),
            )));
        }

        if let Some(deliveries) = self.converter.take_out_channel().await {
            pumps.deliver = Some(tokio::spawn(deliver_loop(
                self.id.clone(),
                deliveries,
                Arc::clone(&self.consumer),
                Arc::clone(&self.stats),
                self.shutdown_tx.subscribe(),
            )));
        }
    }
}

/// Pump A: moves emitter batches into the converter.
async fn forward_loop(
    receiver: String,
    mut batches: mpsc::Receiver<Batch>,
    converter: Arc<LogConverter>,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    debug!(receiver = %receiver, "Forward pump started");

    loop {
        tokio::select! {
            biased;
            next = batches.recv() => {
                let Some(batch) = next else {
                    break;
                };
                forward(&receiver, &converter, batch).await;
            }
            _ = shutdown_rx.recv() => {
                batches.close();
                while let Some(batch) = batches.recv().await {
                    forward(&receiver, &converter, batch).await;
                }
                break;
            }
        }
    }

    debug!(receiver = %receiver, "Forward pump stopped");
}

async fn forward(receiver: &str, converter: &LogConverter, batch: Batch) {
    let records = batch.len();
    // The converter counts the records it refuses.
    if let Err(e) = converter.batch(batch).await {
        warn!(receiver, records, stage = "pump", error = %e, "Failed to forward batch to converter");
    }
}

/// Pump B: hands delivery batches to the consumer, one at a time.
///
/// After the shutdown signal it stops calling the consumer and drops what is
/// left until the converter closes the queue.
async fn deliver_loop(
    receiver: String,
    mut deliveries: mpsc::Receiver<DeliveryBatch>,
    consumer: Arc<dyn LogConsumer>,
    stats: Arc<DeliveryStats>,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    debug!(receiver = %receiver, "Delivery pump started");

    loop {
        tokio::select! {
            biased;
            _ = shutdown_rx.recv() => break,
            next = deliveries.recv() => {
                let Some(batch) = next else {
                    debug!(receiver = %receiver, "Delivery pump stopped");
                    return;
                };
                let delivery =
                    deliver(&receiver, consumer.as_ref(), &stats, batch, &mut shutdown_rx).await;
                if delivery == Delivery::Cancelled {
                    break;
                }
            }
        }
    }

    deliveries.close();
    let mut abandoned = 0;
    while let Some(batch) = deliveries.recv().await {
        abandoned += batch.record_count();
        stats.record_undelivered(batch.record_count());
    }
    if abandoned > 0 {
        warn!(receiver = %receiver, records = abandoned, stage = "pump", "Dropped undelivered batches at shutdown");
    }

    debug!(receiver = %receiver, "Delivery pump cancelled");
}

async fn deliver(
    receiver: &str,
    consumer: &dyn LogConsumer,
    stats: &DeliveryStats,
    batch: DeliveryBatch,
    shutdown_rx: &mut broadcast::Receiver<()>,
) -> Delivery {
    let records = batch.record_count();
    let groups = batch.group_count();
    let span = info_span!(
        "receiver.consume_logs",
        receiver,
        records,
        groups,
        outcome = tracing::field::Empty
    );

    async {
        let started = Instant::now();
        let result = tokio::select! {
            biased;
            _ = shutdown_rx.recv() => None,
            result = consumer.consume_logs(batch) => Some(result),
        };
        let outcome = match &result {
            Some(Ok(())) => "success",
            Some(Err(_)) => "failed",
            None => "cancelled",
        };
        tracing::Span::current().record("outcome", outcome);

        metrics::DELIVERIES.with_label_values(&[outcome]).inc();
        metrics::RECORDS_DELIVERED
            .with_label_values(&[outcome])
            .inc_by(records as u64);
        metrics::DELIVERY_DURATION
            .with_label_values(&[outcome])
            .observe(started.elapsed().as_secs_f64());
        stats.deliveries.fetch_add(1, Ordering::Relaxed);

        match result {
            Some(Ok(())) => {
                stats
                    .records_delivered
                    .fetch_add(records as u64, Ordering::Relaxed);
                debug!(records, groups, "Delivered batch to consumer");
                Delivery::Completed
            }
            Some(Err(e)) => {
                stats.deliveries_failed.fetch_add(1, Ordering::Relaxed);
                stats.record_undelivered(records);
                error!(records, groups, error = %e, "Consumer failed to accept batch");
                Delivery::Completed
            }
            None => {
                stats.deliveries_failed.fetch_add(1, Ordering::Relaxed);
                stats.record_undelivered(records);
                warn!(records, groups, stage = "pump", "Abandoned in-flight delivery at shutdown");
                Delivery::Cancelled
            }
        }
    }
    .instrument(span)
    .await
}
