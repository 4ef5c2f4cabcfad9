use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum StorageError {
    #[error("Storage backend error: {0}")]
    Backend(String),
    #[error("Corrupt document at {namespace}/{key}: {reason}")]
    Corruption {
        namespace: &'static str,
        key: String,
        reason: String,
    },
}

/// Durable namespaces. Each one is an independent key space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    /// One document per cache key
    Cache,
    /// One document per offline entity key
    Entities,
    /// The serialized mutation queue (single document)
    Queue,
}

impl Namespace {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cache => "cache",
            Self::Entities => "entities",
            Self::Queue => "queue",
        }
    }
}

impl std::fmt::Display for Namespace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Durable key/value medium behind the cache, entity store and queue.
///
/// Values are opaque byte documents; callers own the encoding.
#[async_trait]
pub trait DurableStore: Send + Sync {
    async fn get(&self, ns: Namespace, key: &str) -> Result<Option<Vec<u8>>, StorageError>;
    async fn put(&self, ns: Namespace, key: &str, value: &[u8]) -> Result<(), StorageError>;
    async fn delete(&self, ns: Namespace, key: &str) -> Result<(), StorageError>;

    /// All documents whose key starts with `prefix` (empty prefix = whole namespace).
    async fn scan_prefix(
        &self,
        ns: Namespace,
        prefix: &str,
    ) -> Result<Vec<(String, Vec<u8>)>, StorageError>;

    /// Remove every document in the namespace.
    async fn clear(&self, ns: Namespace) -> Result<(), StorageError>;

    /// Delete several keys. Default implementation falls back to sequential deletes.
    async fn delete_batch(&self, ns: Namespace, keys: &[String]) -> Result<usize, StorageError> {
        for key in keys {
            self.delete(ns, key).await?;
        }
        Ok(keys.len())
    }
}
