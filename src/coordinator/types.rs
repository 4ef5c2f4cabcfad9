// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Public types for the sync coordinator.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::Notify;

use crate::error::ApplyError;
use crate::queue::{SyncAction, SyncQueueItem};

/// What the applier receives for one queued item.
#[derive(Debug, Clone, PartialEq)]
pub struct Mutation {
    pub action: SyncAction,
    pub resource: String,
    pub payload: Value,
}

impl From<&SyncQueueItem> for Mutation {
    fn from(item: &SyncQueueItem) -> Self {
        Self {
            action: item.action,
            resource: item.resource.clone(),
            payload: item.payload.clone(),
        }
    }
}

/// Coordinator drain state.
///
/// Use [`super::SyncCoordinator::state_receiver()`] to watch transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DrainState {
    #[default]
    Idle,
    Draining,
}

impl std::fmt::Display for DrainState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::Draining => write!(f, "Draining"),
        }
    }
}

/// Result of one drain cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// Items taken by the cycle
    pub attempted: usize,
    pub succeeded: usize,
    /// Failed but still under the retry limit
    pub requeued: usize,
    /// Failed and dropped
    pub exhausted: usize,
}

impl DrainReport {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.attempted == 0
    }
}

/// A mutation dropped after its final failed attempt.
#[derive(Debug, Clone)]
pub struct ExhaustedMutation {
    /// The item as of its last attempt (`retry_count` == limit)
    pub item: SyncQueueItem,
    pub error: ApplyError,
}

/// Diagnostics published by the coordinator.
#[derive(Debug, Clone)]
pub enum SyncEvent {
    Exhausted(ExhaustedMutation),
    DrainCompleted(DrainReport),
}

/// Coalescing "please drain" signal shared by the queue, the network
/// monitor's reconnect hook and the coordinator's worker.
///
/// Any number of requests made while the worker is busy collapse into a
/// single pending permit, so they cost exactly one follow-up cycle.
#[derive(Clone, Default)]
pub struct DrainTrigger {
    inner: Arc<TriggerInner>,
}

#[derive(Default)]
struct TriggerInner {
    notify: Notify,
    requested: AtomicBool,
}

impl DrainTrigger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fire-and-forget. Never blocks.
    pub fn request(&self) {
        self.inner.requested.store(true, Ordering::Release);
        self.inner.notify.notify_one();
    }

    /// Whether a request is waiting to be picked up.
    #[must_use]
    pub fn is_requested(&self) -> bool {
        self.inner.requested.load(Ordering::Acquire)
    }

    /// Wait for the next request (returns at once if one is pending).
    pub(crate) async fn requested(&self) {
        self.inner.notify.notified().await;
        self.inner.requested.store(false, Ordering::Release);
    }
}

impl std::fmt::Debug for DrainTrigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DrainTrigger")
            .field("requested", &self.is_requested())
            .finish()
    }
}
