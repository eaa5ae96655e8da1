//! Key-prefixed view over a storage client.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;

use super::error::StorageError;
use super::traits::StorageClient;

/// Checkpoint access handed to the upstream pipeline.
///
/// Every key is stored as `"<scope>.<key>"`, so operators sharing one client
/// cannot overwrite each other's checkpoints.
#[derive(Clone)]
pub struct Persister {
    client: Arc<dyn StorageClient>,
    scope: String,
}

impl Persister {
    pub fn new(client: Arc<dyn StorageClient>, scope: impl Into<String>) -> Self {
        Self {
            client,
            scope: scope.into(),
        }
    }

    /// A view nested one level below this one.
    pub fn scoped(&self, name: &str) -> Self {
        Self {
            client: Arc::clone(&self.client),
            scope: format!("{}.{}", self.scope, name),
        }
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    fn key(&self, key: &str) -> String {
        format!("{}.{}", self.scope, key)
    }

    pub async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        self.client.get(&self.key(key)).await
    }

    pub async fn set(&self, key: &str, value: Vec<u8>) -> Result<(), StorageError> {
        self.client.set(&self.key(key), value).await
    }

    pub async fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.client.delete(&self.key(key)).await
    }

    /// Reads a JSON-encoded value.
    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StorageError> {
        match self.get(key).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Writes a value as JSON.
    pub async fn set_json<T: Serialize>(&self, key: &str, value: &T) -> Result<(), StorageError> {
        let bytes = serde_json::to_vec(value)?;
        self.set(key, bytes).await
    }
}

impl std::fmt::Debug for Persister {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Persister")
            .field("scope", &self.scope)
            .finish_non_exhaustive()
    }
}
