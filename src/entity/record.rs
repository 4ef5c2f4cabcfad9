// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Whether a record's latest state has been confirmed by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    #[default]
    Pending,
    Synced,
}

impl SyncStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStatus::Pending => "pending",
            SyncStatus::Synced => "synced",
        }
    }
}

impl std::fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A locally persisted entity. Never expires.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OfflineRecord {
    pub key: String,
    pub payload: Value,
    /// Epoch millis of the last `save`
    pub written_at: i64,
    /// Bumped on every `save`; links a queued mutation to the content it carried
    #[serde(default)]
    pub revision: u64,
    #[serde(default)]
    pub sync_status: SyncStatus,
}

impl OfflineRecord {
    #[must_use]
    pub fn is_synced(&self) -> bool {
        self.sync_status == SyncStatus::Synced
    }
}
