//! Storage host built from configuration.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::config::{StorageBackend, StorageConfig};
use super::error::StorageError;
use super::memory::{MemoryStorageClient, MemoryStore};
use super::sqlite::SqliteStorageClient;
use super::traits::{StorageClient, StorageHost};

/// Opens one client per receiver on the configured backend.
pub struct ConfiguredStorageHost {
    config: StorageConfig,
    memory: MemoryStore,
}

impl ConfiguredStorageHost {
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            memory: MemoryStore::new(),
        }
    }
}

#[async_trait]
impl StorageHost for ConfiguredStorageHost {
    async fn storage_client(
        &self,
        receiver_id: &str,
    ) -> Result<Option<Arc<dyn StorageClient>>, StorageError> {
        let client: Arc<dyn StorageClient> = match self.config.backend {
            StorageBackend::None => return Ok(None),
            StorageBackend::Memory => {
                Arc::new(MemoryStorageClient::open(&self.memory, receiver_id))
            }
            StorageBackend::Sqlite => {
                let path = self.config.path.as_deref().ok_or_else(|| {
                    StorageError::Database("no path configured for sqlite storage".to_string())
                })?;
                Arc::new(SqliteStorageClient::open(path, receiver_id)?)
            }
        };
        debug!(receiver = receiver_id, backend = ?self.config.backend, "Opened storage client");
        Ok(Some(client))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_none_backend_returns_no_client() {
        let host = ConfiguredStorageHost::new(StorageConfig::default());
        assert!(host.storage_client("r").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_memory_backend_survives_reopen() {
        let host = ConfiguredStorageHost::new(StorageConfig::memory());
        let client = host.storage_client("r").await.unwrap().unwrap();
        client.set("k", b"v".to_vec()).await.unwrap();
        client.close().await.unwrap();

        let again = host.storage_client("r").await.unwrap().unwrap();
        assert_eq!(again.get("k").await.unwrap(), Some(b"v".to_vec()));
    }

    #[tokio::test]
    async fn test_sqlite_backend() {
        let dir = TempDir::new().unwrap();
        let host = ConfiguredStorageHost::new(StorageConfig::sqlite(dir.path().join("s.db")));
        let client = host.storage_client("r").await.unwrap().unwrap();
        client.set("k", b"v".to_vec()).await.unwrap();
        assert_eq!(client.get("k").await.unwrap(), Some(b"v".to_vec()));
        client.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_sqlite_without_path_fails() {
        let host = ConfiguredStorageHost::new(StorageConfig {
            backend: StorageBackend::Sqlite,
            path: None,
        });
        assert!(matches!(
            host.storage_client("r").await,
            Err(StorageError::Database(_))
        ));
    }
}
