// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Cache entry and per-write options.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ConfigError;
use crate::priority::Priority;

/// Per-write cache settings.
///
/// # Example
///
/// ```
/// use offline_sync::cache::CacheOptions;
/// use offline_sync::Priority;
/// use std::time::Duration;
///
/// let opts = CacheOptions::new(Duration::from_secs(300)).with_priority(Priority::High);
/// assert!(opts.validate().is_ok());
///
/// // Untyped input from a host binding
/// assert!(CacheOptions::from_raw(-5, "high").is_err());
/// assert!(CacheOptions::from_raw(1_000, "urgent").is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheOptions {
    pub ttl: Duration,
    /// Informational only; eviction is purely age-based
    pub priority: Priority,
}

impl CacheOptions {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            priority: Priority::default(),
        }
    }

    #[must_use]
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Build from a signed millisecond TTL and a priority name.
    pub fn from_raw(ttl_ms: i64, priority: &str) -> Result<Self, ConfigError> {
        if ttl_ms <= 0 {
            return Err(ConfigError::InvalidTtl);
        }
        let options = Self {
            ttl: Duration::from_millis(ttl_ms as u64),
            priority: priority.parse()?,
        };
        options.validate()?;
        Ok(options)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ttl.is_zero() || self.ttl.as_millis() > i64::MAX as u128 {
            return Err(ConfigError::InvalidTtl);
        }
        Ok(())
    }

    pub(crate) fn ttl_millis(&self) -> u64 {
        self.ttl.as_millis().min(i64::MAX as u128) as u64
    }
}

/// A cached payload as stored in both layers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: String,
    pub payload: Value,
    /// Epoch millis
    pub written_at: i64,
    pub ttl_ms: u64,
    #[serde(default)]
    pub priority: Priority,
}

impl CacheEntry {
    /// Valid iff `now - written_at < ttl`.
    #[must_use]
    pub fn is_valid_at(&self, now_millis: i64) -> bool {
        let age = now_millis.saturating_sub(self.written_at);
        age < self.ttl_ms.min(i64::MAX as u64) as i64
    }

    /// Epoch millis at which the entry stops being valid.
    #[must_use]
    pub fn expires_at(&self) -> i64 {
        self.written_at.saturating_add(self.ttl_ms.min(i64::MAX as u64) as i64)
    }
}
