// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! # Offline Sync
//!
//! An offline-first sync engine for client applications: cache what can be
//! re-fetched, persist what cannot, and queue server-bound mutations until
//! connectivity returns.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Network Monitor                        │
//! │  • Last-known status, subscriptions, watch channel         │
//! │  • Reconnect hook fires once per offline → online edge     │
//! └─────────────────────────────────────────────────────────────┘
//!                              │ (drain request)
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Sync Coordinator                        │
//! │  • Single-flight drain cycles, coalesced triggers          │
//! │  • Retry bookkeeping, exhausted → diagnostics channel      │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!          ┌───────────────────┼───────────────────┐
//!          ▼                   ▼                   ▼
//! ┌─────────────────┐ ┌─────────────────┐ ┌─────────────────┐
//! │   Cache Store   │ │  Entity Store   │ │   Sync Queue    │
//! │ TTL + byte cap  │ │ no expiry,      │ │ priority order, │
//! │ FIFO eviction   │ │ sync status     │ │ one durable doc │
//! └─────────────────┘ └─────────────────┘ └─────────────────┘
//!          │                   │                   │
//!          └───────────────────┼───────────────────┘
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │          Durable store (SQLite via sqlx, or memory)         │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use offline_sync::{OfflineSyncConfig, SyncContext, Priority, SyncAction};
//! use offline_sync::coordinator::{Mutation, MutationApplier};
//! use offline_sync::network::{NetworkStatus, Transport};
//! use offline_sync::ApplyError;
//! use async_trait::async_trait;
//! use serde_json::json;
//!
//! struct Api;
//!
//! #[async_trait]
//! impl MutationApplier for Api {
//!     async fn apply(&self, m: &Mutation) -> Result<(), ApplyError> {
//!         println!("{} {}", m.action, m.resource);
//!         Ok(())
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), offline_sync::SyncError> {
//!     let config = OfflineSyncConfig {
//!         db_path: Some("./offline.db".into()),
//!         ..Default::default()
//!     };
//!     let ctx = SyncContext::open(config, Api).await?;
//!
//!     // Platform callback
//!     ctx.network().report(NetworkStatus::offline());
//!
//!     let revision = ctx.entities().save("profile:me", json!({"name": "B"})).await?;
//!     ctx.queue()
//!         .enqueue_for_record(SyncAction::Update, "profile", json!({"name": "B"}), Priority::High, "profile:me", revision)
//!         .await?;
//!
//!     // Reconnect drains the queue in the background
//!     ctx.network().report(NetworkStatus::online(Transport::Wifi));
//!
//!     ctx.shutdown().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//!
//! - [`network`]: Connectivity status and reconnect hook
//! - [`cache`]: Bounded TTL cache
//! - [`entity`]: Offline records with sync status
//! - [`queue`]: Durable mutation queue
//! - [`coordinator`]: Drain cycles and the [`MutationApplier`] seam
//! - [`storage`]: Durable backends (SQLite, memory)
//! - [`resilience`]: Retry with exponential backoff

pub mod cache;
pub mod clock;
pub mod config;
pub mod context;
pub mod coordinator;
pub mod entity;
pub mod error;
pub mod metrics;
pub mod network;
pub mod priority;
pub mod queue;
pub mod resilience;
pub mod storage;

// Note: We don't expose a `tracing` module to avoid conflict with the tracing crate

pub use cache::{CacheOptions, CacheStats, CacheStore, CleanupReport};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::OfflineSyncConfig;
pub use context::SyncContext;
pub use coordinator::{
    DrainReport, DrainState, ExhaustedMutation, Mutation, MutationApplier, ResourceRouter,
    SyncCoordinator, SyncEvent,
};
pub use entity::{OfflineRecord, OfflineStore, SyncStatus};
pub use error::{ApplyError, ConfigError, StorageError, SyncError};
pub use network::{NetworkMonitor, NetworkStatus, Subscription, Transport};
pub use priority::Priority;
pub use queue::{QueueSnapshot, SyncAction, SyncQueue, SyncQueueItem};
pub use resilience::retry::RetryConfig;
pub use storage::{DurableStore, InMemoryStore, Namespace, SqliteStore};
