// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Drain worker lifecycle: start, run loop, shutdown.

use std::sync::Arc;

use tracing::{debug, info, warn};

use super::SyncCoordinator;

impl SyncCoordinator {
    /// Spawn the drain worker and wire the network reconnect hook to it.
    ///
    /// Requests that arrive while offline are dropped; reconnecting fires
    /// the hook, which requests a fresh cycle. If the engine starts online
    /// with recovered work, one drain is requested immediately.
    #[tracing::instrument(skip(self))]
    pub fn start(self: &Arc<Self>) {
        let mut worker = self.worker.lock();
        if worker.is_some() {
            debug!("Drain worker already running");
            return;
        }

        let trigger = self.trigger.clone();
        self.network.set_reconnect_hook(move || trigger.request());

        let this = Arc::clone(self);
        let mut shutdown_rx = self.shutdown.subscribe();
        *worker = Some(tokio::spawn(async move {
            info!("Drain worker running");
            loop {
                tokio::select! {
                    _ = this.trigger.requested() => {}
                    _ = shutdown_rx.wait_for(|stop| *stop) => break,
                }

                if !this.network.is_online() {
                    debug!("Drain requested while offline, ignoring");
                    continue;
                }
                this.run_cycle().await;
            }
            info!("Drain worker stopped");
        }));
        drop(worker);

        if self.network.is_online() && !self.queue.is_empty() {
            self.trigger.request();
        }
    }

    /// Whether the background worker is running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.worker.lock().as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Stop the worker after its current cycle, if any, and detach the
    /// reconnect hook. Idempotent.
    #[tracing::instrument(skip(self))]
    pub async fn shutdown(&self) {
        self.network.clear_reconnect_hook();
        self.shutdown.send_replace(true);

        let handle = self.worker.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!(error = %e, "Drain worker ended abnormally");
            }
            info!("Sync coordinator shut down");
        }
    }
}
