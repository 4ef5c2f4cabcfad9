// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Sync coordinator.
//!
//! The [`SyncCoordinator`] drains the [`SyncQueue`](crate::queue::SyncQueue)
//! through a [`MutationApplier`]:
//! - items are applied in priority order, oldest first
//! - failures are re-queued until `max_retries`, then published as
//!   [`SyncEvent::Exhausted`]
//! - applied items linked to an offline record mark it synced
//!
//! # Lifecycle
//!
//! ```text
//! Idle → Draining → Idle
//! ```
//!
//! Only one cycle runs at a time. Drain requests arriving during a cycle
//! collapse into one follow-up cycle.

mod applier;
mod lifecycle;
mod types;

pub use applier::{MutationApplier, ResourceRouter};
pub use types::{DrainReport, DrainState, DrainTrigger, ExhaustedMutation, Mutation, SyncEvent};

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::OfflineSyncConfig;
use crate::entity::OfflineStore;
use crate::error::ApplyError;
use crate::network::NetworkMonitor;
use crate::queue::{SyncQueue, SyncQueueItem};
use crate::resilience::retry::RetryConfig;

pub struct SyncCoordinator {
    queue: Arc<SyncQueue>,
    entities: Arc<OfflineStore>,
    applier: Arc<dyn MutationApplier>,
    network: Arc<NetworkMonitor>,
    trigger: DrainTrigger,

    /// Single-flight guard for drain cycles
    drain_lock: tokio::sync::Mutex<()>,

    /// Drain state (broadcast to watchers)
    state: watch::Sender<DrainState>,

    /// Diagnostics channel
    events: broadcast::Sender<SyncEvent>,

    /// Most recent exhausted mutations, oldest first
    dead_letters: Mutex<VecDeque<ExhaustedMutation>>,
    dead_letter_capacity: usize,

    apply_timeout: Option<Duration>,

    /// Follow-up drain delays after cycles that re-queued work
    backoff: RetryConfig,
    /// Consecutive cycles that re-queued something
    backoff_attempt: AtomicU32,

    pub(super) shutdown: watch::Sender<bool>,
    pub(super) worker: Mutex<Option<JoinHandle<()>>>,
}

impl SyncCoordinator {
    pub fn new(
        queue: Arc<SyncQueue>,
        entities: Arc<OfflineStore>,
        applier: Arc<dyn MutationApplier>,
        network: Arc<NetworkMonitor>,
        trigger: DrainTrigger,
        config: &OfflineSyncConfig,
    ) -> Self {
        let (state, _) = watch::channel(DrainState::Idle);
        let (events, _) = broadcast::channel(config.diagnostics_capacity.max(1));
        let (shutdown, _) = watch::channel(false);

        Self {
            queue,
            entities,
            applier,
            network,
            trigger,
            drain_lock: tokio::sync::Mutex::new(()),
            state,
            events,
            dead_letters: Mutex::new(VecDeque::new()),
            dead_letter_capacity: config.dead_letter_capacity,
            apply_timeout: config.apply_timeout(),
            backoff: config.drain_backoff(),
            backoff_attempt: AtomicU32::new(0),
            shutdown,
            worker: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn state(&self) -> DrainState {
        *self.state.borrow()
    }

    /// Get a receiver to watch drain state changes.
    #[must_use]
    pub fn state_receiver(&self) -> watch::Receiver<DrainState> {
        self.state.subscribe()
    }

    /// Subscribe to diagnostics. Events sent before subscribing are not replayed.
    #[must_use]
    pub fn subscribe_events(&self) -> broadcast::Receiver<SyncEvent> {
        self.events.subscribe()
    }

    /// Drain the dead-letter buffer.
    pub fn take_dead_letters(&self) -> Vec<ExhaustedMutation> {
        self.dead_letters.lock().drain(..).collect()
    }

    #[must_use]
    pub fn trigger(&self) -> &DrainTrigger {
        &self.trigger
    }

    /// Run one drain cycle now, regardless of connectivity.
    ///
    /// Waits for an in-progress cycle to finish first.
    pub async fn drain_now(&self) -> DrainReport {
        self.run_cycle().await
    }

    #[tracing::instrument(skip(self), fields(attempted))]
    pub(crate) async fn run_cycle(&self) -> DrainReport {
        let _guard = self.drain_lock.lock().await;

        let batch = self.queue.begin_drain();
        if batch.is_empty() {
            debug!("Queue empty, nothing to drain");
            return DrainReport::default();
        }

        let start = Instant::now();
        tracing::Span::current().record("attempted", batch.len());
        self.state.send_replace(DrainState::Draining);
        info!(pending = batch.len(), "Draining sync queue");

        let max_retries = self.queue.max_retries();
        let mut report = DrainReport {
            attempted: batch.len(),
            ..Default::default()
        };
        let mut requeued: Vec<SyncQueueItem> = Vec::new();

        for mut item in batch {
            match self.apply_one(&item).await {
                Ok(()) => {
                    report.succeeded += 1;
                    crate::metrics::record_mutation(&item.resource, "success");
                    debug!(id = %item.id, resource = %item.resource, "Mutation applied");
                    if let Some(key) = item.record_key.as_deref() {
                        match item.record_revision {
                            Some(revision) => self.entities.mark_synced_if(key, revision).await,
                            // Queued before revisions were tracked
                            None => self.entities.mark_synced(key).await,
                        };
                    }
                }
                Err(e) => {
                    item.retry_count = item.retry_count.saturating_add(1);
                    item.last_error = Some(e.to_string());
                    if item.retry_count < max_retries {
                        debug!(
                            id = %item.id,
                            retry_count = item.retry_count,
                            error = %e,
                            "Mutation failed, will retry"
                        );
                        crate::metrics::record_mutation(&item.resource, "retry");
                        report.requeued += 1;
                        requeued.push(item);
                    } else {
                        report.exhausted += 1;
                        self.exhaust(item, e);
                    }
                }
            }
        }

        self.queue.finish_drain(requeued).await;
        self.state.send_replace(DrainState::Idle);

        crate::metrics::record_drain_cycle(start.elapsed(), report.attempted);
        info!(
            succeeded = report.succeeded,
            requeued = report.requeued,
            exhausted = report.exhausted,
            "Drain cycle complete"
        );
        let _ = self.events.send(SyncEvent::DrainCompleted(report.clone()));

        self.schedule_backoff(&report);
        report
    }

    async fn apply_one(&self, item: &SyncQueueItem) -> Result<(), ApplyError> {
        let mutation = Mutation::from(item);
        match self.apply_timeout {
            Some(limit) => match tokio::time::timeout(limit, self.applier.apply(&mutation)).await {
                Ok(result) => result,
                Err(_) => Err(ApplyError::Timeout(limit)),
            },
            None => self.applier.apply(&mutation).await,
        }
    }

    fn exhaust(&self, item: SyncQueueItem, error: ApplyError) {
        warn!(
            id = %item.id,
            resource = %item.resource,
            action = %item.action,
            attempts = item.retry_count,
            error = %error,
            "Mutation exhausted retries, dropping"
        );
        crate::metrics::record_exhausted(&item.resource);

        let exhausted = ExhaustedMutation { item, error };
        if self.dead_letter_capacity > 0 {
            let mut dead = self.dead_letters.lock();
            while dead.len() >= self.dead_letter_capacity {
                dead.pop_front();
            }
            dead.push_back(exhausted.clone());
        }
        // No receivers is fine
        let _ = self.events.send(SyncEvent::Exhausted(exhausted));
    }

    /// After a cycle that re-queued work, ask for another drain after an
    /// exponential delay. Resets once a cycle re-queues nothing.
    fn schedule_backoff(&self, report: &DrainReport) {
        if report.requeued == 0 {
            self.backoff_attempt.store(0, Ordering::Release);
            return;
        }
        if !self.network.is_online() {
            return;
        }

        let attempt = self.backoff_attempt.fetch_add(1, Ordering::AcqRel).saturating_add(1);
        let delay = self.backoff.delay_for(attempt);
        let trigger = self.trigger.clone();
        let mut shutdown = self.shutdown.subscribe();
        debug!(attempt, delay_ms = delay.as_millis() as u64, "Scheduling follow-up drain");

        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(delay) => trigger.request(),
                _ = shutdown.wait_for(|stop| *stop) => {}
            }
        });
    }
}
