// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Offline entity store: drafts, profile snapshots and other records that
//! must survive restarts until the server confirms them.

mod record;
mod store;

pub use record::{OfflineRecord, SyncStatus};
pub use store::OfflineStore;
