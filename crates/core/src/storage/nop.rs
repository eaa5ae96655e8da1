//! Storage client used when the host has no storage.

use async_trait::async_trait;

use super::error::StorageError;
use super::traits::StorageClient;

/// Stores nothing. Reads always miss and writes are discarded.
#[derive(Debug, Default)]
pub struct NopStorageClient;

impl NopStorageClient {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl StorageClient for NopStorageClient {
    async fn get(&self, _key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(None)
    }

    async fn set(&self, _key: &str, _value: Vec<u8>) -> Result<(), StorageError> {
        Ok(())
    }

    async fn delete(&self, _key: &str) -> Result<(), StorageError> {
        Ok(())
    }

    async fn close(&self) -> Result<(), StorageError> {
        Ok(())
    }
}
