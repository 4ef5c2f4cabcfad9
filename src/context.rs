// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Engine wiring.
//!
//! [`SyncContext`] builds every component exactly once and hands out
//! `Arc`s. There is no process-global state; drop or
//! [`shutdown`](SyncContext::shutdown) the context to tear down.

use std::sync::Arc;

use tracing::{info, warn};

use crate::cache::CacheStore;
use crate::clock::{Clock, SystemClock};
use crate::config::OfflineSyncConfig;
use crate::coordinator::{DrainTrigger, MutationApplier, SyncCoordinator};
use crate::entity::OfflineStore;
use crate::error::SyncError;
use crate::network::NetworkMonitor;
use crate::queue::SyncQueue;
use crate::storage::traits::DurableStore;
use crate::storage::{InMemoryStore, SqliteStore};

pub struct SyncContext {
    cache: Arc<CacheStore>,
    entities: Arc<OfflineStore>,
    queue: Arc<SyncQueue>,
    network: Arc<NetworkMonitor>,
    coordinator: Arc<SyncCoordinator>,
    /// Kept for a WAL checkpoint on shutdown
    sqlite: Option<Arc<SqliteStore>>,
}

impl SyncContext {
    /// Open the engine and start the drain worker.
    ///
    /// Uses SQLite at `config.db_path`, or an in-memory store when unset.
    /// Fails only on invalid configuration or when the database cannot be
    /// opened.
    #[tracing::instrument(skip(config, applier), fields(db_path = config.db_path.as_deref()))]
    pub async fn open(
        config: OfflineSyncConfig,
        applier: impl MutationApplier,
    ) -> Result<Self, SyncError> {
        config.validate()?;

        let (durable, sqlite): (Arc<dyn DurableStore>, Option<Arc<SqliteStore>>) =
            match config.db_path.as_deref() {
                Some(path) => {
                    let store = Arc::new(SqliteStore::open(path).await?);
                    (store.clone(), Some(store))
                }
                None => {
                    warn!("No db_path configured, offline state will not survive a restart");
                    (Arc::new(InMemoryStore::new()), None)
                }
            };

        let mut ctx = Self::with_store(
            config,
            applier,
            durable,
            Arc::new(SystemClock),
            Arc::new(NetworkMonitor::new()),
        )
        .await?;
        ctx.sqlite = sqlite;
        Ok(ctx)
    }

    /// Open over caller-supplied parts. The drain worker is started.
    pub async fn with_store(
        config: OfflineSyncConfig,
        applier: impl MutationApplier,
        durable: Arc<dyn DurableStore>,
        clock: Arc<dyn Clock>,
        network: Arc<NetworkMonitor>,
    ) -> Result<Self, SyncError> {
        config.validate()?;

        let trigger = DrainTrigger::new();
        let cache = Arc::new(CacheStore::open(durable.clone(), clock.clone(), &config).await?);
        let entities = Arc::new(OfflineStore::new(durable.clone(), clock.clone()));
        let queue = Arc::new(
            SyncQueue::open(
                durable,
                clock,
                network.clone(),
                trigger.clone(),
                config.max_retries,
            )
            .await,
        );
        let coordinator = Arc::new(SyncCoordinator::new(
            queue.clone(),
            entities.clone(),
            Arc::new(applier),
            network.clone(),
            trigger,
            &config,
        ));
        coordinator.start();

        info!(
            pending = queue.len(),
            online = network.is_online(),
            "Offline sync engine ready"
        );

        Ok(Self {
            cache,
            entities,
            queue,
            network,
            coordinator,
            sqlite: None,
        })
    }

    #[must_use]
    pub fn cache(&self) -> &Arc<CacheStore> {
        &self.cache
    }

    #[must_use]
    pub fn entities(&self) -> &Arc<OfflineStore> {
        &self.entities
    }

    #[must_use]
    pub fn queue(&self) -> &Arc<SyncQueue> {
        &self.queue
    }

    #[must_use]
    pub fn network(&self) -> &Arc<NetworkMonitor> {
        &self.network
    }

    #[must_use]
    pub fn coordinator(&self) -> &Arc<SyncCoordinator> {
        &self.coordinator
    }

    /// Stop the drain worker (after any running cycle) and flush SQLite.
    #[tracing::instrument(skip(self))]
    pub async fn shutdown(&self) {
        self.coordinator.shutdown().await;
        if let Some(sqlite) = &self.sqlite {
            if let Err(e) = sqlite.checkpoint().await {
                warn!(error = %e, "WAL checkpoint on shutdown failed");
            }
        }
        info!("Offline sync engine shut down");
    }
}
