// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Connectivity monitoring.
//!
//! The host application forwards every platform connectivity callback to
//! [`NetworkMonitor::report`]. The monitor keeps the last-known
//! [`NetworkStatus`], fans it out to subscribers, and fires the reconnect hook
//! once per offline→online edge.
//!
//! # Example
//!
//! ```
//! use offline_sync::network::{NetworkMonitor, NetworkStatus, Transport};
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//!
//! let monitor = NetworkMonitor::new();
//! let reconnects = Arc::new(AtomicUsize::new(0));
//! let counter = reconnects.clone();
//! monitor.set_reconnect_hook(move || { counter.fetch_add(1, Ordering::SeqCst); });
//!
//! monitor.report(NetworkStatus::offline());
//! monitor.report(NetworkStatus::online(Transport::Wifi));
//! monitor.report(NetworkStatus::online(Transport::Cellular));
//! assert_eq!(reconnects.load(Ordering::SeqCst), 1);
//! ```

mod monitor;

pub use monitor::{NetworkMonitor, NetworkStatus, Subscription, Transport};
