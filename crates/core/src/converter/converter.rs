//! Log converter implementation.
//!
//! Batches flow through three stages:
//! - `batch()` tags each batch with a sequence number and queues it
//! - N workers validate and fingerprint records and group each batch
//! - one accumulator task re-sequences the groupings, merges them and
//!   flushes delivery batches to the output queue
//!
//! The accumulator is the only owner of the open grouping, so merges for a
//! fingerprint are serialized without any lock around the grouping itself.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::Interval;
use tracing::{debug, info, warn};

use crate::config::ConfigError;
use crate::emitter::Batch;
use crate::metrics;
use crate::record::ResourceFingerprint;

use super::config::ConverterConfig;
use super::error::ConverterError;
use super::grouping::GroupedRecords;
use super::reorder::ReorderBuffer;
use super::types::{ConverterStatus, DeliveryBatch, FlushReason};

/// A batch tagged with its position in the input stream.
struct SequencedBatch {
    sequence: u64,
    batch: Batch,
}

/// One worker's grouping of one input batch.
struct GroupedBatch {
    sequence: u64,
    grouped: GroupedRecords,
}

/// Tracks converter counters.
#[derive(Default)]
struct ConverterStats {
    batches_received: AtomicU64,
    records_converted: AtomicU64,
    records_dropped: AtomicU64,
    delivery_batches: AtomicU64,
}

impl ConverterStats {
    fn record_dropped(&self, count: usize) {
        self.records_dropped
            .fetch_add(count as u64, Ordering::Relaxed);
        metrics::RECORDS_DROPPED
            .with_label_values(&["converter"])
            .inc_by(count as u64);
    }
}

/// Queue ends handed to the tasks on start.
struct PendingQueues {
    input_rx: mpsc::Receiver<SequencedBatch>,
    out_tx: mpsc::Sender<DeliveryBatch>,
}

struct ConverterTasks {
    workers: Vec<JoinHandle<()>>,
    accumulator: JoinHandle<()>,
}

/// Groups emitter batches by resource and publishes delivery batches.
pub struct LogConverter {
    config: ConverterConfig,
    worker_count: usize,
    /// Sending side of the input queue. Only held long enough to clone.
    input_tx: Mutex<Option<mpsc::Sender<SequencedBatch>>>,
    /// Next sequence number. Held across the send so numbers stay dense.
    next_sequence: Mutex<u64>,
    pending: Mutex<Option<PendingQueues>>,
    out_rx: Mutex<Option<mpsc::Receiver<DeliveryBatch>>>,
    tasks: Mutex<Option<ConverterTasks>>,
    running: AtomicBool,
    stats: Arc<ConverterStats>,
}

impl LogConverter {
    /// Creates a converter. Nothing runs until [`LogConverter::start`].
    pub fn new(config: ConverterConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let (input_tx, input_rx) = mpsc::channel(config.queue_capacity);
        let (out_tx, out_rx) = mpsc::channel(config.queue_capacity);
        let worker_count = config.effective_worker_count();

        Ok(Self {
            config,
            worker_count,
            input_tx: Mutex::new(Some(input_tx)),
            next_sequence: Mutex::new(0),
            pending: Mutex::new(Some(PendingQueues { input_rx, out_tx })),
            out_rx: Mutex::new(Some(out_rx)),
            tasks: Mutex::new(None),
            running: AtomicBool::new(false),
            stats: Arc::new(ConverterStats::default()),
        })
    }

    /// Spawns the worker pool and the accumulator.
    pub async fn start(&self) {
        let Some(queues) = self.pending.lock().await.take() else {
            warn!("Converter already started or stopped");
            return;
        };

        let (grouped_tx, grouped_rx) = mpsc::channel(self.worker_count * 2);
        let input_rx = Arc::new(Mutex::new(queues.input_rx));

        let workers = (0..self.worker_count)
            .map(|id| {
                tokio::spawn(run_worker(
                    id,
                    Arc::clone(&input_rx),
                    grouped_tx.clone(),
                    Arc::clone(&self.stats),
                ))
            })
            .collect();
        // Workers hold the only senders; the accumulator ends once they do.
        drop(grouped_tx);

        let accumulator = tokio::spawn(run_accumulator(
            grouped_rx,
            queues.out_tx,
            self.config.clone(),
            Arc::clone(&self.stats),
        ));

        *self.tasks.lock().await = Some(ConverterTasks {
            workers,
            accumulator,
        });
        self.running.store(true, Ordering::SeqCst);

        info!(workers = self.worker_count, "Converter started");
    }

    /// Queues a batch for grouping.
    ///
    /// Waits while the input queue is full. A wait that is still pending when
    /// an unstarted converter stops ends with [`ConverterError::Stopped`].
    pub async fn batch(&self, batch: Batch) -> Result<(), ConverterError> {
        let records = batch.len();

        let Some(tx) = self.input_tx.lock().await.clone() else {
            self.stats.record_dropped(records);
            return Err(ConverterError::Stopped { records });
        };

        let mut next_sequence = self.next_sequence.lock().await;
        let sequence = *next_sequence;
        if tx.send(SequencedBatch { sequence, batch }).await.is_err() {
            self.stats.record_dropped(records);
            return Err(ConverterError::Stopped { records });
        }

        // Only advanced on success so the accumulator never waits on a gap.
        *next_sequence += 1;
        self.stats.batches_received.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Takes the receiving side of the output queue.
    ///
    /// Returns `None` after the first call.
    pub async fn take_out_channel(&self) -> Option<mpsc::Receiver<DeliveryBatch>> {
        self.out_rx.lock().await.take()
    }

    /// Stops accepting batches, drains the pool and flushes every group.
    ///
    /// The output queue closes once the last delivery batch is queued, so
    /// whoever holds it must keep reading until then.
    pub async fn stop(&self) -> Result<(), ConverterError> {
        self.input_tx.lock().await.take();

        if let Some(queues) = self.pending.lock().await.take() {
            // Never started: nothing will ever read the queued batches.
            // Closing also wakes any `batch` call waiting for space.
            let mut input_rx = queues.input_rx;
            input_rx.close();
            let mut lost = 0;
            while let Ok(sequenced) = input_rx.try_recv() {
                lost += sequenced.batch.len();
            }
            if lost > 0 {
                warn!(records = lost, "Converter stopped before start, dropping queued records");
                self.stats.record_dropped(lost);
            }
            return Ok(());
        }

        let Some(tasks) = self.tasks.lock().await.take() else {
            return Ok(());
        };

        let mut failures = Vec::new();
        for result in futures::future::join_all(tasks.workers).await {
            if let Err(e) = result {
                failures.push(format!("worker: {}", e));
            }
        }
        if let Err(e) = tasks.accumulator.await {
            failures.push(format!("accumulator: {}", e));
        }
        self.running.store(false, Ordering::SeqCst);

        let status = self.status();
        info!(
            batches = status.batches_received,
            records = status.records_converted,
            dropped = status.records_dropped,
            deliveries = status.delivery_batches,
            "Converter stopped"
        );

        if failures.is_empty() {
            Ok(())
        } else {
            Err(ConverterError::TaskFailed(failures.join("; ")))
        }
    }

    /// Returns the current converter status.
    pub fn status(&self) -> ConverterStatus {
        ConverterStatus {
            running: self.running.load(Ordering::Relaxed),
            worker_count: self.worker_count,
            batches_received: self.stats.batches_received.load(Ordering::Relaxed),
            records_converted: self.stats.records_converted.load(Ordering::Relaxed),
            records_dropped: self.stats.records_dropped.load(Ordering::Relaxed),
            delivery_batches: self.stats.delivery_batches.load(Ordering::Relaxed),
        }
    }
}

/// Groups one batch, dropping records that cannot be represented.
fn group_batch(worker: usize, batch: Batch, stats: &ConverterStats) -> GroupedRecords {
    let mut grouped = GroupedRecords::default();
    let mut dropped = 0;

    for record in batch.into_records() {
        if let Err(e) = record.validate() {
            warn!(worker, stage = "converter", error = %e, "Dropping malformed record");
            dropped += 1;
            continue;
        }
        let fingerprint = ResourceFingerprint::of(record.resource());
        grouped.insert(fingerprint, record);
    }

    if dropped > 0 {
        stats.record_dropped(dropped);
    }
    let converted = grouped.record_count() as u64;
    stats.records_converted.fetch_add(converted, Ordering::Relaxed);
    metrics::RECORDS_CONVERTED.inc_by(converted);
    grouped
}

async fn run_worker(
    id: usize,
    input: Arc<Mutex<mpsc::Receiver<SequencedBatch>>>,
    grouped_tx: mpsc::Sender<GroupedBatch>,
    stats: Arc<ConverterStats>,
) {
    debug!(worker = id, "Converter worker started");

    loop {
        let next = input.lock().await.recv().await;
        let Some(SequencedBatch { sequence, batch }) = next else {
            break;
        };

        let grouped = group_batch(id, batch, &stats);
        // Sent even when empty so the accumulator can advance past it.
        if grouped_tx
            .send(GroupedBatch { sequence, grouped })
            .await
            .is_err()
        {
            warn!(worker = id, "Accumulator gone, worker exiting");
            break;
        }
    }

    debug!(worker = id, "Converter worker stopped");
}

/// Waits for the next tick, or forever when no interval is configured.
async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

async fn run_accumulator(
    mut grouped_rx: mpsc::Receiver<GroupedBatch>,
    out_tx: mpsc::Sender<DeliveryBatch>,
    config: ConverterConfig,
    stats: Arc<ConverterStats>,
) {
    let mut reorder = ReorderBuffer::new();
    let mut open = GroupedRecords::default();
    let mut ticker = config.flush_interval().map(|interval| {
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        ticker
    });
    let per_batch = ticker.is_none();

    loop {
        tokio::select! {
            next = grouped_rx.recv() => {
                let Some(GroupedBatch { sequence, grouped }) = next else {
                    break;
                };
                reorder.insert(sequence, grouped);
                while let Some(grouped) = reorder.try_pop_next() {
                    open.merge(grouped);
                    if per_batch {
                        flush(&mut open, FlushReason::Batch, &out_tx, &stats).await;
                    } else if open.len() >= config.max_groups {
                        flush(&mut open, FlushReason::GroupCap, &out_tx, &stats).await;
                    }
                }
                if !reorder.is_empty() {
                    debug!(waiting = reorder.len(), "Groupings waiting for an earlier batch");
                }
            }
            _ = next_tick(&mut ticker) => {
                flush(&mut open, FlushReason::Interval, &out_tx, &stats).await;
            }
        }
    }

    // Only non-empty if a worker died holding a batch.
    let (leftover, gaps) = reorder.drain_remaining();
    if gaps > 0 {
        warn!(missing_batches = gaps, "Converter drained with missing batches");
    }
    for grouped in leftover {
        open.merge(grouped);
    }
    flush(&mut open, FlushReason::Drain, &out_tx, &stats).await;
    debug!("Converter accumulator stopped");
}

async fn flush(
    open: &mut GroupedRecords,
    reason: FlushReason,
    out_tx: &mpsc::Sender<DeliveryBatch>,
    stats: &ConverterStats,
) {
    if open.is_empty() {
        return;
    }

    let batch = DeliveryBatch::new(open.take(), reason);
    let records = batch.record_count();
    let groups = batch.group_count();

    if out_tx.send(batch).await.is_err() {
        warn!(records, groups, stage = "converter", "Output queue closed, dropping delivery batch");
        stats.record_dropped(records);
        return;
    }

    stats.delivery_batches.fetch_add(1, Ordering::Relaxed);
    metrics::DELIVERY_BATCHES
        .with_label_values(&[reason.as_str()])
        .inc();
    metrics::GROUPS_PER_DELIVERY
        .with_label_values(&[])
        .observe(groups as f64);
    debug!(records, groups, reason = reason.as_str(), "Converter flushed delivery batch");
}
