// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Queued mutation types.

use std::cmp::Ordering;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ConfigError;
use crate::priority::Priority;

/// Kind of server-side change a mutation represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncAction {
    Create,
    Update,
    Delete,
}

impl SyncAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncAction::Create => "create",
            SyncAction::Update => "update",
            SyncAction::Delete => "delete",
        }
    }
}

impl std::fmt::Display for SyncAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncAction {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "create" => Ok(SyncAction::Create),
            "update" => Ok(SyncAction::Update),
            "delete" => Ok(SyncAction::Delete),
            _ => Err(ConfigError::UnknownAction(s.to_string())),
        }
    }
}

/// A pending mutation as persisted in the queue document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncQueueItem {
    /// UUID v4
    pub id: String,
    pub action: SyncAction,
    pub resource: String,
    pub payload: Value,
    /// Epoch millis
    pub enqueued_at: i64,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub retry_count: u32,
    /// Offline record to mark synced once the mutation is applied
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record_key: Option<String>,
    /// Revision of the linked record this mutation carries
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record_revision: Option<u64>,
    /// Most recent apply failure
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl SyncQueueItem {
    /// Drain order: priority first, then oldest first.
    ///
    /// Equal items compare `Equal`, so a stable sort keeps insertion order.
    pub fn drain_order(a: &Self, b: &Self) -> Ordering {
        a.priority
            .cmp(&b.priority)
            .then_with(|| a.enqueued_at.cmp(&b.enqueued_at))
    }
}

/// Point-in-time view of the queue, in drain order.
#[derive(Debug, Clone, Default)]
pub struct QueueSnapshot {
    /// Never attempted
    pub pending_count: usize,
    /// Failed at least once, still eligible
    pub in_retry_count: usize,
    /// At or past the retry limit (only seen after the limit was lowered)
    pub exhausted_count: usize,
    pub items: Vec<SyncQueueItem>,
}

impl QueueSnapshot {
    pub(crate) fn classify(items: Vec<SyncQueueItem>, max_retries: u32) -> Self {
        let mut snapshot = QueueSnapshot::default();
        for item in &items {
            match item.retry_count {
                0 => snapshot.pending_count += 1,
                rc if rc < max_retries => snapshot.in_retry_count += 1,
                _ => snapshot.exhausted_count += 1,
            }
        }
        snapshot.items = items;
        snapshot
    }

    #[must_use]
    pub fn total(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
