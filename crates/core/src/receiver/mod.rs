//! Receiver module: runs the whole pipeline for one upstream graph.
//!
//! A [`LogReceiver`] owns an emitter, a converter, the storage client and two
//! pump tasks. Its lifecycle is
//! `Created -> Starting -> Running -> Stopping -> Stopped`:
//! - `start` acquires storage, starts every stage and hands the upstream
//!   [`LogPipeline`] a [`Persister`](crate::storage::Persister) and the emitter
//! - `stop` shuts stages down front to back so every accepted record is
//!   either delivered to the [`LogConsumer`] or counted as dropped
//!
//! # Example
//!
//! ```ignore
//! use logpipe_core::config::Config;
//! use logpipe_core::receiver::LogReceiver;
//! use logpipe_core::storage::ConfiguredStorageHost;
//!
//! let host = Arc::new(ConfiguredStorageHost::new(config.storage.clone()));
//! let receiver = LogReceiver::new(&config, pipeline, consumer, host)?;
//!
//! receiver.start().await?;
//! // ...
//! receiver.stop().await?;
//! ```

mod config;
mod runner;
mod traits;
mod types;

pub use config::ReceiverConfig;
pub use runner::LogReceiver;
pub use traits::{LogConsumer, LogPipeline};
pub use types::{ConsumerError, ReceiverError, ReceiverState, ReceiverStatus, UpstreamError};
