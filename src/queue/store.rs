// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Durable mutation queue.
//!
//! The whole queue is one JSON document under `queue/pending_mutations`.
//! Items taken by a drain cycle move to an in-flight list but stay in the
//! persisted document until [`SyncQueue::finish_drain`], so a crash
//! mid-cycle replays them (at-least-once delivery).

use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use tracing::{debug, info, warn};

use super::item::{QueueSnapshot, SyncAction, SyncQueueItem};
use crate::clock::Clock;
use crate::coordinator::DrainTrigger;
use crate::error::{ConfigError, SyncError};
use crate::network::NetworkMonitor;
use crate::priority::Priority;
use crate::storage::traits::{DurableStore, Namespace};

/// Durable key of the queue document.
pub const QUEUE_DOC_KEY: &str = "pending_mutations";

#[derive(Default)]
struct QueueState {
    /// Insertion order
    pending: Vec<SyncQueueItem>,
    /// Taken by the running cycle
    in_flight: Vec<SyncQueueItem>,
}

impl QueueState {
    fn all(&self) -> Vec<SyncQueueItem> {
        self.in_flight.iter().chain(self.pending.iter()).cloned().collect()
    }

    fn len(&self) -> usize {
        self.in_flight.len() + self.pending.len()
    }
}

pub struct SyncQueue {
    state: Mutex<QueueState>,
    durable: Arc<dyn DurableStore>,
    clock: Arc<dyn Clock>,
    network: Arc<NetworkMonitor>,
    trigger: DrainTrigger,
    max_retries: u32,
    /// Orders document writes so the last write carries the latest state
    persist_lock: tokio::sync::Mutex<()>,
}

impl SyncQueue {
    /// Load the persisted queue. An unreadable document is logged and the
    /// queue starts empty.
    pub async fn open(
        durable: Arc<dyn DurableStore>,
        clock: Arc<dyn Clock>,
        network: Arc<NetworkMonitor>,
        trigger: DrainTrigger,
        max_retries: u32,
    ) -> Self {
        let pending = match durable.get(Namespace::Queue, QUEUE_DOC_KEY).await {
            Ok(Some(doc)) => match serde_json::from_slice::<Vec<SyncQueueItem>>(&doc) {
                Ok(items) => items,
                Err(e) => {
                    warn!(error = %e, "Unreadable queue document, starting empty");
                    Vec::new()
                }
            },
            Ok(None) => Vec::new(),
            Err(e) => {
                warn!(error = %e, "Failed to load queue document, starting empty");
                crate::metrics::record_storage_error("queue", "open");
                Vec::new()
            }
        };

        if !pending.is_empty() {
            info!(pending = pending.len(), "Recovered queued mutations");
        }
        crate::metrics::set_queue_depth(pending.len());

        Self {
            state: Mutex::new(QueueState {
                pending,
                in_flight: Vec::new(),
            }),
            durable,
            clock,
            network,
            trigger,
            max_retries,
            persist_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Append a mutation and persist. Requests a drain when online.
    pub async fn enqueue(
        &self,
        action: SyncAction,
        resource: &str,
        payload: Value,
        priority: Priority,
    ) -> Result<String, SyncError> {
        self.push(action, resource, payload, priority, None).await
    }

    /// Like [`enqueue`](Self::enqueue), linked to an offline record.
    ///
    /// `revision` is what [`OfflineStore::save`](crate::entity::OfflineStore::save)
    /// returned for the content this mutation carries. The record is marked
    /// synced on success only if it has not been saved again since.
    pub async fn enqueue_for_record(
        &self,
        action: SyncAction,
        resource: &str,
        payload: Value,
        priority: Priority,
        record_key: &str,
        revision: u64,
    ) -> Result<String, SyncError> {
        if record_key.is_empty() {
            return Err(ConfigError::EmptyKey.into());
        }
        self.push(action, resource, payload, priority, Some((record_key.to_string(), revision)))
            .await
    }

    #[tracing::instrument(skip(self, payload, record), fields(id))]
    async fn push(
        &self,
        action: SyncAction,
        resource: &str,
        payload: Value,
        priority: Priority,
        record: Option<(String, u64)>,
    ) -> Result<String, SyncError> {
        if resource.trim().is_empty() {
            return Err(ConfigError::EmptyResource.into());
        }

        let id = uuid::Uuid::new_v4().to_string();
        tracing::Span::current().record("id", id.as_str());

        let item = SyncQueueItem {
            id: id.clone(),
            action,
            resource: resource.to_string(),
            payload,
            enqueued_at: self.clock.now_millis(),
            priority,
            retry_count: 0,
            record_revision: record.as_ref().map(|(_, revision)| *revision),
            record_key: record.map(|(key, _)| key),
            last_error: None,
        };
        self.state.lock().pending.push(item);

        self.persist().await;
        crate::metrics::record_enqueue(resource);
        debug!("Mutation enqueued");

        if self.network.is_online() {
            self.trigger.request();
        }
        Ok(id)
    }

    /// Counts and items (including in-flight ones) in drain order.
    #[must_use]
    pub fn snapshot(&self) -> QueueSnapshot {
        let mut items = self.state.lock().all();
        items.sort_by(SyncQueueItem::drain_order);
        QueueSnapshot::classify(items, self.max_retries)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.state.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Move every pending item to in-flight and return them in drain order.
    ///
    /// Callers must not overlap cycles; the coordinator's drain lock
    /// guarantees this.
    pub(crate) fn begin_drain(&self) -> Vec<SyncQueueItem> {
        let mut state = self.state.lock();
        let taken = std::mem::take(&mut state.pending);
        state.in_flight.extend(taken);
        let mut batch = state.in_flight.clone();
        drop(state);
        batch.sort_by(SyncQueueItem::drain_order);
        batch
    }

    /// End a cycle: drop in-flight items, put `requeued` ahead of items
    /// enqueued during the cycle, and persist once.
    pub(crate) async fn finish_drain(&self, requeued: Vec<SyncQueueItem>) {
        {
            let mut state = self.state.lock();
            state.in_flight.clear();
            let arrived = std::mem::take(&mut state.pending);
            state.pending = requeued;
            state.pending.extend(arrived);
        }
        self.persist().await;
    }

    /// Write the queue document. Failures are logged; the in-memory queue
    /// stays authoritative and the next persist retries.
    async fn persist(&self) {
        let _guard = self.persist_lock.lock().await;
        let items = self.state.lock().all();
        let depth = items.len();

        let doc = match serde_json::to_vec(&items) {
            Ok(doc) => doc,
            Err(e) => {
                warn!(error = %e, "Failed to encode queue document");
                return;
            }
        };
        if let Err(e) = self.durable.put(Namespace::Queue, QUEUE_DOC_KEY, &doc).await {
            warn!(error = %e, depth, "Failed to persist queue document");
            crate::metrics::record_storage_error("queue", "persist");
        }
        crate::metrics::set_queue_depth(depth);
    }
}
