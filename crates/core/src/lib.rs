//! Log batching and resource-grouping pipeline.
//!
//! Records produced by an upstream parser flow through three stages:
//! - [`emitter`]: batches records by size and time
//! - [`converter`]: groups each batch by resource identity on a worker pool
//! - [`receiver`]: pumps batches between stages and delivers them to a
//!   consumer, owning checkpoint [`storage`] for the upstream graph

pub mod config;
pub mod converter;
pub mod emitter;
pub mod logging;
pub mod metrics;
pub mod receiver;
pub mod record;
pub mod storage;
pub mod testing;

pub use config::{load_config, load_config_from_str, validate_config, Config, ConfigError};
pub use converter::{
    ConverterConfig, ConverterError, ConverterStatus, DeliveryBatch, FlushReason, LogConverter,
    ResourceGroup,
};
pub use emitter::{Batch, EmitterConfig, EmitterError, FlushTrigger, LogEmitter};
pub use logging::{init_tracing, LogFormat, LoggingConfig};
pub use receiver::{
    ConsumerError, LogConsumer, LogPipeline, LogReceiver, ReceiverConfig, ReceiverError,
    ReceiverState, ReceiverStatus, UpstreamError,
};
pub use record::{
    AttributeValue, Attributes, Record, RecordError, ResourceFingerprint, Severity, TraceContext,
};
pub use storage::{
    ConfiguredStorageHost, MemoryStorageClient, MemoryStore, NopStorageClient, Persister,
    SqliteStorageClient, StorageBackend, StorageClient, StorageConfig, StorageError, StorageHost,
};
