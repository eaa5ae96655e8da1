//! Storage traits.

use std::sync::Arc;

use async_trait::async_trait;

use super::error::StorageError;

/// Key-value store for upstream checkpoints.
///
/// Values are opaque bytes. `close` may be called more than once; every
/// other operation fails with [`StorageError::Closed`] afterwards.
#[async_trait]
pub trait StorageClient: Send + Sync {
    /// Reads a value. Missing keys are `Ok(None)`.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError>;

    /// Writes a value, replacing any previous one.
    async fn set(&self, key: &str, value: Vec<u8>) -> Result<(), StorageError>;

    /// Removes a value. Removing a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<(), StorageError>;

    /// Releases the client.
    async fn close(&self) -> Result<(), StorageError>;
}

/// Hands out storage clients to receivers.
#[async_trait]
pub trait StorageHost: Send + Sync {
    /// Returns the client for a receiver, or `None` when the host has no
    /// storage configured.
    async fn storage_client(
        &self,
        receiver_id: &str,
    ) -> Result<Option<Arc<dyn StorageClient>>, StorageError>;
}
