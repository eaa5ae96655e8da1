//! SQLite-backed storage client.
//!
//! rusqlite is synchronous, so every statement runs on the blocking pool.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};

use super::error::StorageError;
use super::traits::StorageClient;

/// Storage client persisting to a SQLite database.
///
/// Every component gets its own key space in a shared `checkpoints` table.
pub struct SqliteStorageClient {
    conn: Arc<Mutex<Option<Connection>>>,
    component: Arc<str>,
}

impl SqliteStorageClient {
    /// Open a database file, creating it and the table if needed.
    pub fn open(path: &Path, component: impl Into<String>) -> Result<Self, StorageError> {
        let conn = Connection::open(path)?;
        Self::with_connection(conn, component.into())
    }

    /// Create an in-memory database (useful for testing).
    pub fn in_memory(component: impl Into<String>) -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        Self::with_connection(conn, component.into())
    }

    fn with_connection(conn: Connection, component: String) -> Result<Self, StorageError> {
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(Some(conn))),
            component: component.into(),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), StorageError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS checkpoints (
                component TEXT NOT NULL,
                key TEXT NOT NULL,
                value BLOB NOT NULL,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (component, key)
            );
            "#,
        )?;
        Ok(())
    }

    /// Runs `f` against the open connection on the blocking pool.
    async fn with_conn<T, F>(&self, f: F) -> Result<T, StorageError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection, &str) -> Result<T, rusqlite::Error> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        let component = Arc::clone(&self.component);
        tokio::task::spawn_blocking(move || {
            let guard = conn
                .lock()
                .map_err(|e| StorageError::Database(format!("Lock poisoned: {}", e)))?;
            let conn = guard.as_ref().ok_or(StorageError::Closed)?;
            Ok(f(conn, &component)?)
        })
        .await
        .map_err(|e| StorageError::Database(format!("SQLite task failed: {}", e)))?
    }
}

#[async_trait]
impl StorageClient for SqliteStorageClient {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let key = key.to_string();
        self.with_conn(move |conn, component| {
            conn.query_row(
                "SELECT value FROM checkpoints WHERE component = ?1 AND key = ?2",
                params![component, key],
                |row| row.get(0),
            )
            .optional()
        })
        .await
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> Result<(), StorageError> {
        let key = key.to_string();
        let now = chrono::Utc::now().to_rfc3339();
        self.with_conn(move |conn, component| {
            conn.execute(
                "INSERT INTO checkpoints (component, key, value, updated_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(component, key) DO UPDATE SET
                    value = excluded.value,
                    updated_at = excluded.updated_at",
                params![component, key, value, now],
            )
        })
        .await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let key = key.to_string();
        self.with_conn(move |conn, component| {
            conn.execute(
                "DELETE FROM checkpoints WHERE component = ?1 AND key = ?2",
                params![component, key],
            )
        })
        .await?;
        Ok(())
    }

    async fn close(&self) -> Result<(), StorageError> {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let conn = conn
                .lock()
                .map_err(|e| StorageError::Database(format!("Lock poisoned: {}", e)))?
                .take();
            if let Some(conn) = conn {
                conn.close().map_err(|(_, e)| StorageError::from(e))?;
            }
            Ok(())
        })
        .await
        .map_err(|e| StorageError::Database(format!("SQLite task failed: {}", e)))?
    }
}
