//! Mock storage host for testing.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::storage::{StorageClient, StorageError, StorageHost};

/// Mock implementation of the StorageHost trait.
///
/// Hands out a fixed client (or none) and records which receivers asked.
#[derive(Default)]
pub struct MockStorageHost {
    client: Option<Arc<dyn StorageClient>>,
    requests: Arc<RwLock<Vec<String>>>,
    next_error: Arc<RwLock<Option<StorageError>>>,
}

impl MockStorageHost {
    /// A host without storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// A host that hands out `client` to every receiver.
    pub fn with_client(client: Arc<dyn StorageClient>) -> Self {
        Self {
            client: Some(client),
            ..Self::default()
        }
    }

    /// Receiver ids that requested a client.
    pub async fn requested_ids(&self) -> Vec<String> {
        self.requests.read().await.clone()
    }

    /// Configure the next request to fail with the given error.
    pub async fn set_next_error(&self, error: StorageError) {
        *self.next_error.write().await = Some(error);
    }
}

#[async_trait]
impl StorageHost for MockStorageHost {
    async fn storage_client(
        &self,
        receiver_id: &str,
    ) -> Result<Option<Arc<dyn StorageClient>>, StorageError> {
        self.requests.write().await.push(receiver_id.to_string());
        if let Some(err) = self.next_error.write().await.take() {
            return Err(err);
        }
        Ok(self.client.clone())
    }
}
