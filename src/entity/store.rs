// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Expiry-free entity persistence with a sync-status flag.
//!
//! Same two-layer shape as the cache: a DashMap hot layer over the
//! `entities` durable namespace. The hot layer is authoritative for keys it
//! holds, which keeps records readable when a durable write failed.
//!
//! Writers to one key (`save`, the status flips, `remove`) are serialized by
//! a per-key async lock, so a flip never stores a stale copy over a newer save.

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::record::{OfflineRecord, SyncStatus};
use crate::clock::Clock;
use crate::error::{ConfigError, SyncError};
use crate::storage::traits::{DurableStore, Namespace};

pub struct OfflineStore {
    memory: DashMap<String, OfflineRecord>,
    durable: Arc<dyn DurableStore>,
    clock: Arc<dyn Clock>,
    key_locks: DashMap<String, Arc<Mutex<()>>>,
}

impl OfflineStore {
    pub fn new(durable: Arc<dyn DurableStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            memory: DashMap::new(),
            durable,
            clock,
            key_locks: DashMap::new(),
        }
    }

    /// Persist `payload` under `key` as a pending record.
    ///
    /// Returns the record's new revision. Pass it to
    /// [`SyncQueue::enqueue_for_record`](crate::queue::SyncQueue::enqueue_for_record)
    /// so only this content is marked synced when the mutation applies.
    #[tracing::instrument(skip(self, payload))]
    pub async fn save(&self, key: &str, payload: Value) -> Result<u64, SyncError> {
        if key.is_empty() {
            return Err(ConfigError::EmptyKey.into());
        }
        let lock = self.key_lock(key);
        let _guard = lock.lock().await;

        let revision = self.record(key).await.map_or(1, |r| r.revision.saturating_add(1));
        let record = OfflineRecord {
            key: key.to_string(),
            payload,
            written_at: self.clock.now_millis(),
            revision,
            sync_status: SyncStatus::Pending,
        };
        self.write(record).await;
        crate::metrics::record_entity_op("save", "success");
        Ok(revision)
    }

    /// Payload for `key`, if any.
    pub async fn read(&self, key: &str) -> Option<Value> {
        self.record(key).await.map(|r| r.payload)
    }

    /// Full record for `key`, including its sync status.
    #[tracing::instrument(skip(self))]
    pub async fn record(&self, key: &str) -> Option<OfflineRecord> {
        if let Some(hot) = self.memory.get(key).map(|r| r.value().clone()) {
            crate::metrics::record_entity_op("read", "hit");
            return Some(hot);
        }

        let doc = match self.durable.get(Namespace::Entities, key).await {
            Ok(Some(doc)) => doc,
            Ok(None) => {
                crate::metrics::record_entity_op("read", "miss");
                return None;
            }
            Err(e) => {
                warn!(error = %e, "Durable entity read failed, treating as absent");
                crate::metrics::record_storage_error("entities", "get");
                return None;
            }
        };

        match serde_json::from_slice::<OfflineRecord>(&doc) {
            Ok(record) => {
                // A concurrent save may have populated the hot layer meanwhile
                let record = self
                    .memory
                    .entry(key.to_string())
                    .or_insert(record)
                    .value()
                    .clone();
                debug!("Durable hit, promoted to memory");
                crate::metrics::record_entity_op("read", "promoted");
                Some(record)
            }
            Err(e) => {
                // Unlike cache entries, records are not re-fetchable; keep the doc
                warn!(error = %e, "Unreadable entity document");
                crate::metrics::record_entity_op("read", "corrupt");
                None
            }
        }
    }

    /// Flip `key` to synced, whatever its revision. Returns false (and does
    /// nothing) when absent.
    #[tracing::instrument(skip(self))]
    pub async fn mark_synced(&self, key: &str) -> bool {
        self.flip_synced(key, None).await
    }

    /// Flip `key` to synced only while it is still at `revision`.
    ///
    /// Returns false when the record is absent or was saved again since.
    #[tracing::instrument(skip(self))]
    pub async fn mark_synced_if(&self, key: &str, revision: u64) -> bool {
        self.flip_synced(key, Some(revision)).await
    }

    /// Records whose key starts with `prefix`, newest first.
    ///
    /// The scan happens up front; the returned iterator is finite and
    /// single-use.
    pub async fn list_by_prefix(&self, prefix: &str) -> impl Iterator<Item = OfflineRecord> {
        let mut merged: HashMap<String, OfflineRecord> = HashMap::new();

        match self.durable.scan_prefix(Namespace::Entities, prefix).await {
            Ok(docs) => {
                for (key, doc) in docs {
                    match serde_json::from_slice::<OfflineRecord>(&doc) {
                        Ok(record) => {
                            merged.insert(key, record);
                        }
                        Err(e) => warn!(key = %key, error = %e, "Skipping unreadable entity document"),
                    }
                }
            }
            Err(e) => {
                warn!(error = %e, "Entity scan failed, listing memory layer only");
                crate::metrics::record_storage_error("entities", "scan");
            }
        }

        for r in self.memory.iter().filter(|r| r.key().starts_with(prefix)) {
            merged.insert(r.key().clone(), r.value().clone());
        }

        let mut records: Vec<OfflineRecord> = merged.into_values().collect();
        records.sort_by(|a, b| b.written_at.cmp(&a.written_at).then_with(|| a.key.cmp(&b.key)));
        records.into_iter()
    }

    pub async fn remove(&self, key: &str) {
        let lock = self.key_lock(key);
        let _guard = lock.lock().await;
        self.memory.remove(key);
        if let Err(e) = self.durable.delete(Namespace::Entities, key).await {
            warn!(error = %e, "Failed to delete durable entity");
            crate::metrics::record_storage_error("entities", "delete");
        }
        crate::metrics::record_entity_op("remove", "success");
    }

    pub async fn clear(&self) {
        self.memory.clear();
        if let Err(e) = self.durable.clear(Namespace::Entities).await {
            warn!(error = %e, "Failed to clear durable entities");
            crate::metrics::record_storage_error("entities", "clear");
        }
    }

    fn key_lock(&self, key: &str) -> Arc<Mutex<()>> {
        self.key_locks.entry(key.to_string()).or_default().value().clone()
    }

    async fn flip_synced(&self, key: &str, revision: Option<u64>) -> bool {
        let lock = self.key_lock(key);
        let _guard = lock.lock().await;

        let Some(mut record) = self.record(key).await else {
            debug!("No record to mark synced");
            return false;
        };
        if let Some(expected) = revision {
            if record.revision != expected {
                debug!(expected, current = record.revision, "Record saved again since, leaving pending");
                crate::metrics::record_entity_op("mark_synced", "stale");
                return false;
            }
        }
        if record.sync_status == SyncStatus::Synced {
            return true;
        }
        record.sync_status = SyncStatus::Synced;
        self.write(record).await;
        crate::metrics::record_entity_op("mark_synced", "success");
        true
    }

    /// Callers hold the key's lock.
    async fn write(&self, record: OfflineRecord) {
        let key = record.key.clone();
        match serde_json::to_vec(&record) {
            Ok(doc) => {
                if let Err(e) = self.durable.put(Namespace::Entities, &key, &doc).await {
                    warn!(error = %e, "Durable entity write failed, record kept in memory only");
                    crate::metrics::record_storage_error("entities", "put");
                }
            }
            Err(e) => warn!(error = %e, "Failed to encode entity record"),
        }
        self.memory.insert(key, record);
    }
}
