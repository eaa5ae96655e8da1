//! In-memory storage client.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::error::StorageError;
use super::traits::StorageClient;

/// Shared backing map for memory clients, keyed by component then key.
///
/// Cloning shares the data, so a client opened again for the same component
/// sees what an earlier one wrote.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    data: Arc<RwLock<HashMap<String, HashMap<String, Vec<u8>>>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys stored for a component.
    pub async fn len(&self, component: &str) -> usize {
        self.data
            .read()
            .await
            .get(component)
            .map(HashMap::len)
            .unwrap_or(0)
    }
}

/// Storage client backed by a [`MemoryStore`].
#[derive(Debug)]
pub struct MemoryStorageClient {
    store: MemoryStore,
    component: String,
    closed: AtomicBool,
}

impl MemoryStorageClient {
    /// Creates a client over a fresh, private store.
    pub fn new(component: impl Into<String>) -> Self {
        Self::open(&MemoryStore::new(), component)
    }

    /// Opens a client for `component` over an existing store.
    pub fn open(store: &MemoryStore, component: impl Into<String>) -> Self {
        Self {
            store: store.clone(),
            component: component.into(),
            closed: AtomicBool::new(false),
        }
    }

    fn ensure_open(&self) -> Result<(), StorageError> {
        if self.closed.load(Ordering::SeqCst) {
            Err(StorageError::Closed)
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl StorageClient for MemoryStorageClient {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        self.ensure_open()?;
        let data = self.store.data.read().await;
        Ok(data
            .get(&self.component)
            .and_then(|entries| entries.get(key))
            .cloned())
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> Result<(), StorageError> {
        self.ensure_open()?;
        self.store
            .data
            .write()
            .await
            .entry(self.component.clone())
            .or_default()
            .insert(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.ensure_open()?;
        if let Some(entries) = self.store.data.write().await.get_mut(&self.component) {
            entries.remove(key);
        }
        Ok(())
    }

    async fn close(&self) -> Result<(), StorageError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}
