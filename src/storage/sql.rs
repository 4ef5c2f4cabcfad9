// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! SQLite storage backend for the durable namespaces.
//!
//! Every namespace shares one table:
//! ```sql
//! CREATE TABLE offline_documents (
//!   namespace TEXT NOT NULL,
//!   doc_key TEXT NOT NULL,
//!   body BLOB NOT NULL,
//!   updated_at INTEGER NOT NULL,
//!   PRIMARY KEY (namespace, doc_key)
//! )
//! ```
//!
//! The queue namespace holds a single document, so a queue persist is one
//! upsert regardless of queue length.

use async_trait::async_trait;
use sqlx::{AnyPool, Row, any::AnyPoolOptions};
use super::traits::{DurableStore, Namespace, StorageError};
use crate::resilience::retry::{retry, RetryConfig};
use std::path::Path;
use std::sync::Once;
use std::time::Duration;
use tracing::{debug, info};

// SQLx `Any` driver requires runtime installation
static INSTALL_DRIVERS: Once = Once::new();

fn install_drivers() {
    INSTALL_DRIVERS.call_once(|| {
        sqlx::any::install_default_drivers();
    });
}

fn now_millis() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

pub struct SqliteStore {
    pool: AnyPool,
    path: String,
}

impl SqliteStore {
    /// Open (or create) the database file, with startup-mode retry.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        install_drivers();

        let path_str = path.as_ref().to_string_lossy().to_string();
        let url = format!("sqlite://{}?mode=rwc", path_str);

        let pool = retry("sqlite_connect", &RetryConfig::startup(), || async {
            AnyPoolOptions::new()
                .max_connections(4)
                .acquire_timeout(Duration::from_secs(10))
                .idle_timeout(Duration::from_secs(300))
                .connect(&url)
                .await
                .map_err(|e| StorageError::Backend(e.to_string()))
        })
        .await?;

        let store = Self { pool, path: path_str };
        store.enable_wal_mode().await?;
        store.init_schema().await?;

        info!(path = %store.path, "SQLite durable store ready");
        Ok(store)
    }

    /// Get a clone of the connection pool.
    pub fn pool(&self) -> AnyPool {
        self.pool.clone()
    }

    /// Path to the SQLite file.
    pub fn path(&self) -> &str {
        &self.path
    }

    async fn enable_wal_mode(&self) -> Result<(), StorageError> {
        sqlx::query("PRAGMA journal_mode = WAL")
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::Backend(format!("Failed to enable WAL mode: {}", e)))?;

        sqlx::query("PRAGMA synchronous = NORMAL")
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::Backend(format!("Failed to set synchronous mode: {}", e)))?;

        Ok(())
    }

    async fn init_schema(&self) -> Result<(), StorageError> {
        let sql = r#"
            CREATE TABLE IF NOT EXISTS offline_documents (
                namespace TEXT NOT NULL,
                doc_key TEXT NOT NULL,
                body BLOB NOT NULL,
                updated_at INTEGER NOT NULL,
                PRIMARY KEY (namespace, doc_key)
            )
        "#;

        retry("sqlite_init_schema", &RetryConfig::startup(), || async {
            sqlx::query(sql)
                .execute(&self.pool)
                .await
                .map_err(|e| StorageError::Backend(e.to_string()))
        })
        .await?;

        Ok(())
    }

    /// Truncate the SQLite WAL file to reclaim disk space.
    pub async fn checkpoint(&self) -> Result<(), StorageError> {
        sqlx::query("PRAGMA wal_checkpoint(TRUNCATE)")
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::Backend(format!("WAL checkpoint failed: {}", e)))?;

        debug!(path = %self.path, "SQLite checkpoint completed");
        Ok(())
    }
}

#[async_trait]
impl DurableStore for SqliteStore {
    async fn get(&self, ns: Namespace, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let row = sqlx::query("SELECT body FROM offline_documents WHERE namespace = ? AND doc_key = ?")
            .bind(ns.as_str())
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        match row {
            Some(row) => {
                let body: Vec<u8> = row
                    .try_get("body")
                    .map_err(|e| StorageError::Corruption {
                        namespace: ns.as_str(),
                        key: key.to_string(),
                        reason: e.to_string(),
                    })?;
                Ok(Some(body))
            }
            None => Ok(None),
        }
    }

    async fn put(&self, ns: Namespace, key: &str, value: &[u8]) -> Result<(), StorageError> {
        sqlx::query(
            "INSERT INTO offline_documents (namespace, doc_key, body, updated_at) VALUES (?, ?, ?, ?) \
             ON CONFLICT(namespace, doc_key) DO UPDATE SET body = excluded.body, updated_at = excluded.updated_at",
        )
        .bind(ns.as_str())
        .bind(key)
        .bind(value.to_vec())
        .bind(now_millis())
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Backend(e.to_string()))?;

        Ok(())
    }

    async fn delete(&self, ns: Namespace, key: &str) -> Result<(), StorageError> {
        sqlx::query("DELETE FROM offline_documents WHERE namespace = ? AND doc_key = ?")
            .bind(ns.as_str())
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        Ok(())
    }

    async fn scan_prefix(
        &self,
        ns: Namespace,
        prefix: &str,
    ) -> Result<Vec<(String, Vec<u8>)>, StorageError> {
        // substr() counts characters, not bytes
        let rows = sqlx::query(
            "SELECT doc_key, body FROM offline_documents WHERE namespace = ? AND substr(doc_key, 1, ?) = ?",
        )
        .bind(ns.as_str())
        .bind(prefix.chars().count() as i64)
        .bind(prefix)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::Backend(e.to_string()))?;

        let mut docs = Vec::with_capacity(rows.len());
        for row in rows {
            let key: String = row
                .try_get("doc_key")
                .map_err(|e| StorageError::Backend(e.to_string()))?;
            let body: Vec<u8> = row
                .try_get("body")
                .map_err(|e| StorageError::Corruption {
                    namespace: ns.as_str(),
                    key: key.clone(),
                    reason: e.to_string(),
                })?;
            docs.push((key, body));
        }
        Ok(docs)
    }

    async fn clear(&self, ns: Namespace) -> Result<(), StorageError> {
        let result = sqlx::query("DELETE FROM offline_documents WHERE namespace = ?")
            .bind(ns.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        debug!(namespace = %ns, removed = result.rows_affected(), "Cleared namespace");
        Ok(())
    }

    async fn delete_batch(&self, ns: Namespace, keys: &[String]) -> Result<usize, StorageError> {
        if keys.is_empty() {
            return Ok(0);
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        let mut deleted = 0usize;
        for key in keys {
            let result = sqlx::query("DELETE FROM offline_documents WHERE namespace = ? AND doc_key = ?")
                .bind(ns.as_str())
                .bind(key.as_str())
                .execute(&mut *tx)
                .await
                .map_err(|e| StorageError::Backend(e.to_string()))?;
            deleted += result.rows_affected() as usize;
        }

        tx.commit()
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        Ok(deleted)
    }
}
