//! Emitter module: the entry point of the pipeline.
//!
//! The upstream parsing graph hands every record to a [`LogEmitter`], which
//! collects them into [`Batch`]es and pushes each batch onto a bounded queue
//! when either flush trigger fires:
//! - Size: the open batch reached `max_batch_size` records
//! - Interval: `flush_interval_ms` elapsed and the open batch is not empty
//!
//! When both triggers are enabled the size trigger wins: the `accept` call
//! that fills a batch pushes it while still holding the batch lock, so the
//! ticker can only ever see the next, still-open batch.
//!
//! # Example
//!
//! ```ignore
//! use logpipe_core::emitter::{EmitterConfig, LogEmitter};
//!
//! let (emitter, mut batches) = LogEmitter::channel(EmitterConfig::default())?;
//! emitter.start().await;
//!
//! emitter.accept(record).await?;
//!
//! emitter.stop().await?;
//! while let Some(batch) = batches.recv().await {
//!     println!("{} records ({:?})", batch.len(), batch.trigger());
//! }
//! ```

mod config;
#[allow(clippy::module_inception)]
mod emitter;
mod types;

pub use config::{EmitterConfig, MAX_BATCH_SIZE, MAX_QUEUE_CAPACITY};
pub use emitter::{EmitterError, LogEmitter};
pub use types::{Batch, FlushTrigger};
