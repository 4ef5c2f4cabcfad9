use async_trait::async_trait;
use dashmap::DashMap;
use super::traits::{DurableStore, Namespace, StorageError};

/// Non-persistent [`DurableStore`], used when no database path is configured
/// and throughout the tests.
pub struct InMemoryStore {
    data: DashMap<(Namespace, String), Vec<u8>>,
}

impl InMemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            data: DashMap::new(),
        }
    }

    /// Get current document count across all namespaces
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Document count in one namespace
    #[must_use]
    pub fn count(&self, ns: Namespace) -> usize {
        self.data.iter().filter(|r| r.key().0 == ns).count()
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DurableStore for InMemoryStore {
    async fn get(&self, ns: Namespace, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self.data.get(&(ns, key.to_string())).map(|r| r.value().clone()))
    }

    async fn put(&self, ns: Namespace, key: &str, value: &[u8]) -> Result<(), StorageError> {
        self.data.insert((ns, key.to_string()), value.to_vec());
        Ok(())
    }

    async fn delete(&self, ns: Namespace, key: &str) -> Result<(), StorageError> {
        self.data.remove(&(ns, key.to_string()));
        Ok(())
    }

    async fn scan_prefix(
        &self,
        ns: Namespace,
        prefix: &str,
    ) -> Result<Vec<(String, Vec<u8>)>, StorageError> {
        Ok(self
            .data
            .iter()
            .filter(|r| r.key().0 == ns && r.key().1.starts_with(prefix))
            .map(|r| (r.key().1.clone(), r.value().clone()))
            .collect())
    }

    async fn clear(&self, ns: Namespace) -> Result<(), StorageError> {
        self.data.retain(|k, _| k.0 != ns);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_new_store_is_empty() {
        let store = InMemoryStore::new();
        assert!(store.is_empty());
        assert_eq!(store.len(), 0);
    }

    #[tokio::test]
    async fn test_put_and_get() {
        let store = InMemoryStore::new();
        store.put(Namespace::Cache, "k1", b"v1").await.unwrap();

        let result = store.get(Namespace::Cache, "k1").await.unwrap();
        assert_eq!(result.as_deref(), Some(&b"v1"[..]));
    }

    #[tokio::test]
    async fn test_namespaces_are_isolated() {
        let store = InMemoryStore::new();
        store.put(Namespace::Cache, "same", b"cache").await.unwrap();
        store.put(Namespace::Entities, "same", b"entity").await.unwrap();

        assert_eq!(store.get(Namespace::Cache, "same").await.unwrap().unwrap(), b"cache");
        assert_eq!(store.get(Namespace::Entities, "same").await.unwrap().unwrap(), b"entity");
        assert!(store.get(Namespace::Queue, "same").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_nonexistent_is_ok() {
        let store = InMemoryStore::new();
        assert!(store.delete(Namespace::Cache, "nonexistent").await.is_ok());
    }

    #[tokio::test]
    async fn test_put_overwrites() {
        let store = InMemoryStore::new();
        store.put(Namespace::Cache, "k", b"1").await.unwrap();
        store.put(Namespace::Cache, "k", b"2").await.unwrap();

        assert_eq!(store.len(), 1);
        assert_eq!(store.get(Namespace::Cache, "k").await.unwrap().unwrap(), b"2");
    }

    #[tokio::test]
    async fn test_scan_prefix() {
        let store = InMemoryStore::new();
        store.put(Namespace::Entities, "draft:1", b"a").await.unwrap();
        store.put(Namespace::Entities, "draft:2", b"b").await.unwrap();
        store.put(Namespace::Entities, "profile:me", b"c").await.unwrap();
        store.put(Namespace::Cache, "draft:3", b"d").await.unwrap();

        let mut drafts = store.scan_prefix(Namespace::Entities, "draft:").await.unwrap();
        drafts.sort();
        assert_eq!(drafts.len(), 2);
        assert_eq!(drafts[0].0, "draft:1");

        let all = store.scan_prefix(Namespace::Entities, "").await.unwrap();
        assert_eq!(all.len(), 3);
    }

    #[tokio::test]
    async fn test_clear_only_touches_namespace() {
        let store = InMemoryStore::new();
        for i in 0..5 {
            store.put(Namespace::Cache, &format!("c{i}"), b"x").await.unwrap();
        }
        store.put(Namespace::Queue, "q", b"[]").await.unwrap();

        store.clear(Namespace::Cache).await.unwrap();

        assert_eq!(store.count(Namespace::Cache), 0);
        assert_eq!(store.count(Namespace::Queue), 1);
    }

    #[tokio::test]
    async fn test_delete_batch_via_trait() {
        let store = InMemoryStore::new();
        let keys: Vec<String> = (0..4).map(|i| format!("k{i}")).collect();
        for k in &keys {
            store.put(Namespace::Cache, k, b"x").await.unwrap();
        }

        let deleted = store.delete_batch(Namespace::Cache, &keys[..3]).await.unwrap();
        assert_eq!(deleted, 3);
        assert_eq!(store.count(Namespace::Cache), 1);
    }

    #[tokio::test]
    async fn test_concurrent_access() {
        use std::sync::Arc;

        let store = Arc::new(InMemoryStore::new());
        let mut handles = vec![];

        for batch in 0..10 {
            let store_clone = store.clone();
            handles.push(tokio::spawn(async move {
                for i in 0..10 {
                    let key = format!("batch-{}-item-{}", batch, i);
                    store_clone.put(Namespace::Cache, &key, b"x").await.unwrap();
                }
            }));
        }

        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(store.len(), 100);
    }
}
