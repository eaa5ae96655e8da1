//! Configuration for checkpoint storage.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::config::ConfigError;

/// Which storage backend the host provides.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    /// No storage; checkpoints are discarded.
    #[default]
    None,
    Memory,
    Sqlite,
}

/// Storage configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,

    /// Database file, required for the sqlite backend.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl StorageConfig {
    pub fn memory() -> Self {
        Self {
            backend: StorageBackend::Memory,
            path: None,
        }
    }

    pub fn sqlite(path: impl Into<PathBuf>) -> Self {
        Self {
            backend: StorageBackend::Sqlite,
            path: Some(path.into()),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.backend == StorageBackend::Sqlite && self.path.is_none() {
            return Err(ConfigError::ValidationError(
                "storage.path is required for the sqlite backend".to_string(),
            ));
        }
        Ok(())
    }
}
