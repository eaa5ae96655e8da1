//! Checkpoint storage for the upstream pipeline.
//!
//! A [`StorageHost`] hands each receiver an optional [`StorageClient`]. The
//! receiver owns the client, wraps it in a [`Persister`] for the upstream
//! graph and closes it last during shutdown. Hosts without storage get a
//! [`NopStorageClient`].

mod config;
mod error;
mod host;
mod memory;
mod nop;
mod persister;
mod sqlite;
mod traits;

pub use config::{StorageBackend, StorageConfig};
pub use error::StorageError;
pub use host::ConfiguredStorageHost;
pub use memory::{MemoryStorageClient, MemoryStore};
pub use nop::NopStorageClient;
pub use persister::Persister;
pub use sqlite::SqliteStorageClient;
pub use traits::{StorageClient, StorageHost};
