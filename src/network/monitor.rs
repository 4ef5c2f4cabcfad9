use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Link type reported by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    Wifi,
    Cellular,
    Ethernet,
    Other,
    None,
}

impl std::fmt::Display for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Wifi => "wifi",
            Self::Cellular => "cellular",
            Self::Ethernet => "ethernet",
            Self::Other => "other",
            Self::None => "none",
        };
        f.write_str(s)
    }
}

/// Normalized connectivity snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkStatus {
    pub is_connected: bool,
    pub is_internet_reachable: bool,
    pub transport: Transport,
}

impl NetworkStatus {
    #[must_use]
    pub fn online(transport: Transport) -> Self {
        Self {
            is_connected: true,
            is_internet_reachable: true,
            transport,
        }
    }

    #[must_use]
    pub fn offline() -> Self {
        Self {
            is_connected: false,
            is_internet_reachable: false,
            transport: Transport::None,
        }
    }

    /// Connected and the internet is reachable.
    #[must_use]
    pub fn is_online(&self) -> bool {
        self.is_connected && self.is_internet_reachable
    }
}

impl Default for NetworkStatus {
    /// Optimistic until the platform says otherwise.
    fn default() -> Self {
        Self::online(Transport::Other)
    }
}

type Listener = Arc<dyn Fn(&NetworkStatus) + Send + Sync>;
type ReconnectHook = Arc<dyn Fn() + Send + Sync>;

#[derive(Default)]
struct ListenerRegistry {
    next_id: AtomicU64,
    listeners: Mutex<HashMap<u64, Listener>>,
}

impl ListenerRegistry {
    fn snapshot(&self) -> Vec<Listener> {
        self.listeners.lock().values().cloned().collect()
    }
}

/// Registration handle returned by [`NetworkMonitor::subscribe`].
///
/// Dropping it deregisters the listener.
#[must_use = "dropping a Subscription immediately unsubscribes the listener"]
pub struct Subscription {
    id: u64,
    registry: Weak<ListenerRegistry>,
}

impl Subscription {
    /// Explicitly unsubscribe (same as dropping).
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.listeners.lock().remove(&self.id);
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

/// Process-wide holder of the current [`NetworkStatus`].
pub struct NetworkMonitor {
    status_tx: watch::Sender<NetworkStatus>,
    registry: Arc<ListenerRegistry>,
    reconnect_hook: RwLock<Option<ReconnectHook>>,
    /// Serializes read-compare-store in `report` so each edge is seen once
    report_lock: Mutex<()>,
}

impl NetworkMonitor {
    #[must_use]
    pub fn new() -> Self {
        Self::with_initial(NetworkStatus::default())
    }

    #[must_use]
    pub fn with_initial(initial: NetworkStatus) -> Self {
        let (status_tx, _) = watch::channel(initial);
        Self {
            status_tx,
            registry: Arc::new(ListenerRegistry::default()),
            reconnect_hook: RwLock::new(None),
            report_lock: Mutex::new(()),
        }
    }

    /// Last-known status. Never blocks on the platform.
    #[must_use]
    pub fn current_status(&self) -> NetworkStatus {
        *self.status_tx.borrow()
    }

    #[must_use]
    pub fn is_online(&self) -> bool {
        self.current_status().is_online()
    }

    /// Register a listener for future status changes.
    ///
    /// The listener is not called with the current status; use
    /// [`current_status`](Self::current_status) for that.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&NetworkStatus) + Send + Sync + 'static,
    {
        let id = self.registry.next_id.fetch_add(1, Ordering::Relaxed);
        self.registry.listeners.lock().insert(id, Arc::new(listener));
        debug!(id, "Network listener subscribed");
        Subscription {
            id,
            registry: Arc::downgrade(&self.registry),
        }
    }

    /// Receiver that observes every stored status (async alternative to `subscribe`).
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<NetworkStatus> {
        self.status_tx.subscribe()
    }

    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.registry.listeners.lock().len()
    }

    /// Install the hook run on each offline→online edge (replaces any previous hook).
    pub fn set_reconnect_hook<F>(&self, hook: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        *self.reconnect_hook.write() = Some(Arc::new(hook));
    }

    pub fn clear_reconnect_hook(&self) {
        *self.reconnect_hook.write() = None;
    }

    /// Feed a platform connectivity callback into the monitor.
    pub fn report(&self, status: NetworkStatus) {
        let (previous, reconnected) = {
            let _guard = self.report_lock.lock();
            let previous = self.status_tx.send_replace(status);
            (previous, !previous.is_online() && status.is_online())
        };

        if previous == status {
            return;
        }

        crate::metrics::set_network_online(status.is_online());
        if previous.is_online() && !status.is_online() {
            warn!(transport = %status.transport, "Network lost, mutations will queue locally");
            crate::metrics::record_network_transition("offline");
        } else if reconnected {
            info!(transport = %status.transport, "Network restored");
            crate::metrics::record_network_transition("online");
        } else {
            debug!(?status, "Network status changed");
        }

        for listener in self.registry.snapshot() {
            listener(&status);
        }

        if reconnected {
            let hook = self.reconnect_hook.read().clone();
            if let Some(hook) = hook {
                hook();
            }
        }
    }
}

impl Default for NetworkMonitor {
    fn default() -> Self {
        Self::new()
    }
}
