// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Two-layer TTL cache with a byte budget.
//!
//! The durable layer is the authority on what is resident; the DashMap hot
//! layer only mirrors entries read or written in this process. Resident size
//! is tracked per key so a `put` can tell cheaply whether it crossed the
//! ceiling. Cleanup rescans the durable layer, so the estimate self-corrects.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::entry::{CacheEntry, CacheOptions};
use crate::clock::Clock;
use crate::config::OfflineSyncConfig;
use crate::error::{ConfigError, SyncError};
use crate::storage::traits::{DurableStore, Namespace};

/// Outcome of a [`CacheStore::cleanup`] pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupReport {
    /// Expired or unreadable entries purged
    pub expired: usize,
    /// Valid entries evicted to get under the target
    pub evicted: usize,
    pub evicted_bytes: usize,
    /// Resident size of valid entries before eviction
    pub resident_before: usize,
    pub resident_after: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    /// Entries in the hot layer
    pub memory_entries: usize,
    /// Estimated bytes in the durable layer
    pub resident_bytes: usize,
    pub max_bytes: usize,
    pub cleanup_target: usize,
}

pub struct CacheStore {
    memory: DashMap<String, CacheEntry>,
    durable: Arc<dyn DurableStore>,
    clock: Arc<dyn Clock>,
    /// Durable footprint per key
    sizes: DashMap<String, usize>,
    resident_bytes: AtomicUsize,
    max_bytes: usize,
    cleanup_target: usize,
    default_ttl: Duration,
    /// Serializes cleanup passes (get/put never take it)
    cleanup_lock: Mutex<()>,
}

/// Bytes an entry occupies in the durable layer.
#[inline]
fn footprint(key: &str, doc: &[u8]) -> usize {
    key.len() + doc.len()
}

impl CacheStore {
    /// Open the cache over an existing durable layer, indexing resident entries.
    pub async fn open(
        durable: Arc<dyn DurableStore>,
        clock: Arc<dyn Clock>,
        config: &OfflineSyncConfig,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let store = Self {
            memory: DashMap::new(),
            durable,
            clock,
            sizes: DashMap::new(),
            resident_bytes: AtomicUsize::new(0),
            max_bytes: config.cache_max_bytes,
            cleanup_target: config.cache_cleanup_target(),
            default_ttl: config.cache_default_ttl(),
            cleanup_lock: Mutex::new(()),
        };

        match store.durable.scan_prefix(Namespace::Cache, "").await {
            Ok(docs) => {
                for (key, doc) in docs {
                    let size = footprint(&key, &doc);
                    store.sizes.insert(key, size);
                }
                store.recount();
                info!(
                    entries = store.sizes.len(),
                    resident_bytes = store.resident_bytes(),
                    "Cache index loaded"
                );
            }
            Err(e) => {
                warn!(error = %e, "Failed to index durable cache, starting with empty estimate");
                crate::metrics::record_storage_error("cache", "open");
            }
        }

        Ok(store)
    }

    /// Options using the configured default TTL and medium priority.
    #[must_use]
    pub fn default_options(&self) -> CacheOptions {
        CacheOptions::new(self.default_ttl)
    }

    /// Write `payload` under `key`, replacing any previous entry.
    ///
    /// Durable write failures are logged and leave the hot layer populated.
    /// Only invalid options are returned as errors.
    #[tracing::instrument(skip(self, payload, options), fields(ttl_ms = options.ttl_millis()))]
    pub async fn put(&self, key: &str, payload: Value, options: CacheOptions) -> Result<(), SyncError> {
        if key.is_empty() {
            return Err(ConfigError::EmptyKey.into());
        }
        options.validate()?;

        let entry = CacheEntry {
            key: key.to_string(),
            payload,
            written_at: self.clock.now_millis(),
            ttl_ms: options.ttl_millis(),
            priority: options.priority,
        };

        let doc = match serde_json::to_vec(&entry) {
            Ok(doc) => doc,
            Err(e) => {
                warn!(error = %e, "Failed to encode cache entry, skipping write");
                crate::metrics::record_cache_op("put", "error");
                return Ok(());
            }
        };

        self.memory.insert(key.to_string(), entry);

        match self.durable.put(Namespace::Cache, key, &doc).await {
            Ok(()) => {
                self.track_size(key, footprint(key, &doc));
                crate::metrics::record_cache_op("put", "success");
            }
            Err(e) => {
                warn!(error = %e, "Durable cache write failed, entry kept in memory only");
                crate::metrics::record_cache_op("put", "error");
                crate::metrics::record_storage_error("cache", "put");
            }
        }

        if self.resident_bytes() > self.max_bytes {
            self.maybe_cleanup().await;
        }

        Ok(())
    }

    /// Read a valid payload. Expired entries are purged from both layers.
    #[tracing::instrument(skip(self), fields(layer))]
    pub async fn get(&self, key: &str) -> Option<Value> {
        let now = self.clock.now_millis();

        // Clone out of the DashMap so no shard guard is held across an await
        let hot = self.memory.get(key).map(|r| r.value().clone());
        if let Some(entry) = hot {
            if entry.is_valid_at(now) {
                tracing::Span::current().record("layer", "memory");
                crate::metrics::record_cache_op("get", "hit");
                return Some(entry.payload);
            }
            debug!("Expired in memory layer");
            self.purge(key).await;
            crate::metrics::record_cache_op("get", "expired");
            return None;
        }

        let doc = match self.durable.get(Namespace::Cache, key).await {
            Ok(Some(doc)) => doc,
            Ok(None) => {
                tracing::Span::current().record("layer", "miss");
                crate::metrics::record_cache_op("get", "miss");
                return None;
            }
            Err(e) => {
                warn!(error = %e, "Durable cache read failed, treating as miss");
                crate::metrics::record_cache_op("get", "error");
                crate::metrics::record_storage_error("cache", "get");
                return None;
            }
        };

        let entry: CacheEntry = match serde_json::from_slice(&doc) {
            Ok(entry) => entry,
            Err(e) => {
                warn!(error = %e, "Unreadable cache document, discarding");
                self.purge(key).await;
                crate::metrics::record_cache_op("get", "corrupt");
                return None;
            }
        };

        if !entry.is_valid_at(now) {
            debug!("Expired in durable layer");
            self.purge(key).await;
            crate::metrics::record_cache_op("get", "expired");
            return None;
        }

        self.track_size(key, footprint(key, &doc));
        let payload = entry.payload.clone();
        self.memory.insert(key.to_string(), entry);
        tracing::Span::current().record("layer", "durable");
        debug!("Durable hit, promoted to memory");
        crate::metrics::record_cache_op("get", "promoted");
        Some(payload)
    }

    /// Remove one entry from both layers.
    pub async fn remove(&self, key: &str) {
        self.purge(key).await;
        crate::metrics::record_cache_op("remove", "success");
    }

    /// Remove every entry from both layers.
    #[tracing::instrument(skip(self))]
    pub async fn clear(&self) {
        self.memory.clear();
        if let Err(e) = self.durable.clear(Namespace::Cache).await {
            warn!(error = %e, "Failed to clear durable cache");
            crate::metrics::record_storage_error("cache", "clear");
        }
        self.sizes.clear();
        self.resident_bytes.store(0, Ordering::Release);
        crate::metrics::set_cache_bytes(0);
        crate::metrics::set_cache_items(0);
        info!("Cache cleared");
    }

    /// Purge expired entries and, when over the ceiling, evict oldest-first
    /// until resident size is at or below the cleanup target.
    ///
    /// Waits for any in-progress pass to finish first.
    pub async fn cleanup(&self) -> CleanupReport {
        let _guard = self.cleanup_lock.lock().await;
        self.cleanup_locked().await
    }

    /// Run a cleanup pass unless one is already in progress.
    async fn maybe_cleanup(&self) -> Option<CleanupReport> {
        match self.cleanup_lock.try_lock() {
            Ok(_guard) => Some(self.cleanup_locked().await),
            Err(_) => {
                debug!("Cleanup already running, skipping");
                None
            }
        }
    }

    #[tracing::instrument(skip(self))]
    async fn cleanup_locked(&self) -> CleanupReport {
        let start = Instant::now();
        let now = self.clock.now_millis();

        let docs = match self.durable.scan_prefix(Namespace::Cache, "").await {
            Ok(docs) => docs,
            Err(e) => {
                warn!(error = %e, "Cleanup scan failed, skipping pass");
                crate::metrics::record_storage_error("cache", "cleanup");
                let resident = self.resident_bytes();
                return CleanupReport {
                    resident_before: resident,
                    resident_after: resident,
                    ..Default::default()
                };
            }
        };

        // (key, written_at seen by the scan; None when unreadable)
        let mut doomed: Vec<(String, Option<i64>)> = Vec::new();
        // (written_at, key, size)
        let mut live: Vec<(i64, String, usize)> = Vec::with_capacity(docs.len());
        for (key, doc) in docs {
            let size = footprint(&key, &doc);
            match serde_json::from_slice::<CacheEntry>(&doc) {
                Ok(entry) if entry.is_valid_at(now) => live.push((entry.written_at, key, size)),
                Ok(entry) => doomed.push((key, Some(entry.written_at))),
                Err(_) => doomed.push((key, None)),
            }
        }
        let expired = doomed.len();

        let resident_before: usize = live.iter().map(|(_, _, size)| size).sum();
        let mut resident = resident_before;
        let mut evicted = 0usize;
        let mut evicted_bytes = 0usize;

        if resident > self.max_bytes {
            // Oldest first; key breaks ties so passes are deterministic
            live.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)));
            let mut survivors = Vec::with_capacity(live.len());
            for (written_at, key, size) in live {
                if resident > self.cleanup_target {
                    resident -= size;
                    evicted += 1;
                    evicted_bytes += size;
                    doomed.push((key, Some(written_at)));
                } else {
                    survivors.push((written_at, key, size));
                }
            }
            live = survivors;
        }

        // A put that landed after the scan replaced the document; keep it
        let mut deletions: Vec<String> = Vec::with_capacity(doomed.len());
        for (key, scanned_at) in doomed {
            let rewritten = self
                .memory
                .get(&key)
                .is_some_and(|hot| Some(hot.written_at) != scanned_at);
            if rewritten {
                debug!(key = %key, "Rewritten since cleanup scan, keeping");
                continue;
            }
            self.memory.remove(&key);
            self.sizes.remove(&key);
            deletions.push(key);
        }
        if !deletions.is_empty() {
            if let Err(e) = self.durable.delete_batch(Namespace::Cache, &deletions).await {
                warn!(error = %e, count = deletions.len(), "Failed to delete cache entries during cleanup");
                crate::metrics::record_storage_error("cache", "cleanup");
            }
            self.restore_rewritten(&deletions, now).await;
        }
        for (_, key, size) in live {
            self.sizes.insert(key, size);
        }
        self.recount();

        if evicted > 0 {
            crate::metrics::record_eviction(evicted, evicted_bytes);
            info!(
                evicted,
                evicted_bytes,
                expired,
                resident_before,
                resident_after = resident,
                "Evicted oldest cache entries"
            );
        } else if expired > 0 {
            debug!(expired, "Purged expired cache entries");
        }
        crate::metrics::record_cleanup(start.elapsed());

        CleanupReport {
            expired,
            evicted,
            evicted_bytes,
            resident_before,
            resident_after: resident,
        }
    }

    /// Re-persist entries put while their keys were being deleted.
    ///
    /// Their hot copies were removed before the delete, so any hot entry
    /// written at or after the scan came from a concurrent `put`.
    async fn restore_rewritten(&self, deleted: &[String], scanned_at: i64) {
        for key in deleted {
            let Some(entry) = self
                .memory
                .get(key)
                .filter(|hot| hot.written_at >= scanned_at)
                .map(|hot| hot.value().clone())
            else {
                continue;
            };
            let Ok(doc) = serde_json::to_vec(&entry) else {
                continue;
            };
            match self.durable.put(Namespace::Cache, key, &doc).await {
                Ok(()) => {
                    debug!(key = %key, "Restored entry rewritten during cleanup");
                    self.track_size(key, footprint(key, &doc));
                }
                Err(e) => {
                    warn!(error = %e, "Failed to restore cache entry after cleanup");
                    crate::metrics::record_storage_error("cache", "put");
                }
            }
        }
    }

    #[must_use]
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            memory_entries: self.memory.len(),
            resident_bytes: self.resident_bytes(),
            max_bytes: self.max_bytes,
            cleanup_target: self.cleanup_target,
        }
    }

    #[must_use]
    pub fn resident_bytes(&self) -> usize {
        self.resident_bytes.load(Ordering::Acquire)
    }

    // --- Internal helpers ---

    async fn purge(&self, key: &str) {
        self.memory.remove(key);
        if let Err(e) = self.durable.delete(Namespace::Cache, key).await {
            warn!(error = %e, "Failed to delete durable cache entry");
            crate::metrics::record_storage_error("cache", "delete");
        }
        if let Some((_, size)) = self.sizes.remove(key) {
            self.sub_resident(size);
        }
    }

    fn track_size(&self, key: &str, size: usize) {
        match self.sizes.insert(key.to_string(), size) {
            Some(old) => self.adjust_resident(|total| total.saturating_sub(old).saturating_add(size)),
            None => {
                self.resident_bytes.fetch_add(size, Ordering::AcqRel);
            }
        }
        crate::metrics::set_cache_bytes(self.resident_bytes());
        crate::metrics::set_cache_items(self.memory.len());
    }

    fn sub_resident(&self, size: usize) {
        self.adjust_resident(|total| total.saturating_sub(size));
        crate::metrics::set_cache_bytes(self.resident_bytes());
    }

    fn adjust_resident(&self, f: impl Fn(usize) -> usize) {
        // The closure never declines, so this cannot fail
        let _ = self
            .resident_bytes
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |total| Some(f(total)));
    }

    fn recount(&self) {
        let total: usize = self.sizes.iter().map(|r| *r.value()).sum();
        self.resident_bytes.store(total, Ordering::Release);
        crate::metrics::set_cache_bytes(total);
        crate::metrics::set_cache_items(self.memory.len());
    }
}
