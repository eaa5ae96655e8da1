//! Converter module: groups batched records by resource.
//!
//! Each emitter [`Batch`](crate::emitter::Batch) handed to
//! [`LogConverter::batch`] is split across a worker pool. Every record is
//! validated, fingerprinted from its resource attributes and placed in the
//! [`ResourceGroup`] for that fingerprint. Groupings are merged back in input
//! order, so records of one resource keep their relative order, and published
//! as [`DeliveryBatch`]es on the output queue.
//!
//! Groups are flushed:
//! - after every input batch when `flush_interval_ms` is 0
//! - on every interval tick otherwise
//! - as soon as `max_groups` resources are pending
//! - once more on stop, so nothing accepted is left behind
//!
//! # Example
//!
//! ```ignore
//! use logpipe_core::converter::{ConverterConfig, LogConverter};
//!
//! let converter = LogConverter::new(ConverterConfig::default())?;
//! let mut deliveries = converter.take_out_channel().await.unwrap();
//! converter.start().await;
//!
//! converter.batch(batch).await?;
//!
//! converter.stop().await?;
//! while let Some(delivery) = deliveries.recv().await {
//!     println!("{} groups", delivery.group_count());
//! }
//! ```

mod config;
#[allow(clippy::module_inception)]
mod converter;
mod error;
mod grouping;
mod reorder;
mod types;

pub use config::{ConverterConfig, MAX_WORKERS};
pub use converter::LogConverter;
pub use error::ConverterError;
pub use types::{ConverterStatus, DeliveryBatch, FlushReason, ResourceGroup};
