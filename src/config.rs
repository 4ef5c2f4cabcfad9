// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Configuration for the offline sync engine.
//!
//! # Example
//!
//! ```
//! use offline_sync::OfflineSyncConfig;
//!
//! // Minimal config (uses defaults)
//! let config = OfflineSyncConfig::default();
//! assert_eq!(config.cache_max_bytes, 50 * 1024 * 1024); // 50 MB
//! assert_eq!(config.max_retries, 3);
//!
//! // Custom config
//! let config = OfflineSyncConfig {
//!     db_path: Some("./offline.db".into()),
//!     cache_max_bytes: 8 * 1024 * 1024,
//!     ..Default::default()
//! };
//! assert!(config.validate().is_ok());
//! ```

use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::resilience::retry::RetryConfig;

/// Configuration for the offline sync engine.
///
/// All fields have defaults. Without `db_path` the engine keeps its durable
/// namespaces in memory, which is only useful for tests.
#[derive(Debug, Clone, Deserialize)]
pub struct OfflineSyncConfig {
    /// SQLite file holding the cache, entity and queue namespaces
    #[serde(default)]
    pub db_path: Option<String>,

    /// Cache ceiling in bytes (default: 50 MB)
    #[serde(default = "default_cache_max_bytes")]
    pub cache_max_bytes: usize,

    /// Fraction of the ceiling a cleanup pass shrinks the cache to
    #[serde(default = "default_cache_cleanup_ratio")]
    pub cache_cleanup_ratio: f64,

    /// TTL used by `CacheOptions::default()` callers (seconds)
    #[serde(default = "default_cache_default_ttl_secs")]
    pub cache_default_ttl_secs: u64,

    /// Failed apply attempts before a mutation is exhausted
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Backoff before re-draining a queue that holds retried items
    #[serde(default = "default_retry_initial_ms")]
    pub retry_initial_ms: u64,
    #[serde(default = "default_retry_max_ms")]
    pub retry_max_ms: u64,

    /// Engine-side cap on a single apply call (None = collaborator owns timeouts)
    #[serde(default)]
    pub apply_timeout_ms: Option<u64>,

    /// Exhausted mutations kept for `take_dead_letters()`
    #[serde(default = "default_dead_letter_capacity")]
    pub dead_letter_capacity: usize,

    /// Buffer of the diagnostics broadcast channel
    #[serde(default = "default_diagnostics_capacity")]
    pub diagnostics_capacity: usize,
}

fn default_cache_max_bytes() -> usize { 50 * 1024 * 1024 } // 50 MB
fn default_cache_cleanup_ratio() -> f64 { 0.8 }
fn default_cache_default_ttl_secs() -> u64 { 60 * 60 } // 1 hour
fn default_max_retries() -> u32 { 3 }
fn default_retry_initial_ms() -> u64 { 1_000 }
fn default_retry_max_ms() -> u64 { 60_000 }
fn default_dead_letter_capacity() -> usize { 100 }
fn default_diagnostics_capacity() -> usize { 64 }

impl Default for OfflineSyncConfig {
    fn default() -> Self {
        Self {
            db_path: None,
            cache_max_bytes: default_cache_max_bytes(),
            cache_cleanup_ratio: default_cache_cleanup_ratio(),
            cache_default_ttl_secs: default_cache_default_ttl_secs(),
            max_retries: default_max_retries(),
            retry_initial_ms: default_retry_initial_ms(),
            retry_max_ms: default_retry_max_ms(),
            apply_timeout_ms: None,
            dead_letter_capacity: default_dead_letter_capacity(),
            diagnostics_capacity: default_diagnostics_capacity(),
        }
    }
}

impl OfflineSyncConfig {
    /// Reject settings the engine cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cache_max_bytes == 0 {
            return Err(ConfigError::InvalidBudget("cache_max_bytes must be > 0".into()));
        }
        if !(self.cache_cleanup_ratio > 0.0 && self.cache_cleanup_ratio <= 1.0) {
            return Err(ConfigError::InvalidBudget(format!(
                "cache_cleanup_ratio must be in (0, 1], got {}",
                self.cache_cleanup_ratio
            )));
        }
        if self.cache_default_ttl_secs == 0 {
            return Err(ConfigError::InvalidTtl);
        }
        if self.max_retries == 0 {
            return Err(ConfigError::InvalidRetryPolicy("max_retries must be >= 1".into()));
        }
        if self.retry_initial_ms > self.retry_max_ms {
            return Err(ConfigError::InvalidRetryPolicy(format!(
                "retry_initial_ms ({}) exceeds retry_max_ms ({})",
                self.retry_initial_ms, self.retry_max_ms
            )));
        }
        if self.diagnostics_capacity == 0 {
            return Err(ConfigError::InvalidRetryPolicy(
                "diagnostics_capacity must be > 0".into(),
            ));
        }
        Ok(())
    }

    /// Resident size a cleanup pass shrinks to.
    #[must_use]
    pub fn cache_cleanup_target(&self) -> usize {
        (self.cache_max_bytes as f64 * self.cache_cleanup_ratio) as usize
    }

    #[must_use]
    pub fn cache_default_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_default_ttl_secs)
    }

    /// Backoff schedule for follow-up drains.
    #[must_use]
    pub fn drain_backoff(&self) -> RetryConfig {
        RetryConfig {
            initial_delay: Duration::from_millis(self.retry_initial_ms),
            max_delay: Duration::from_millis(self.retry_max_ms),
            factor: 2.0,
            max_retries: Some(self.max_retries as usize),
        }
    }

    #[must_use]
    pub fn apply_timeout(&self) -> Option<Duration> {
        self.apply_timeout_ms.map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = OfflineSyncConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.cache_cleanup_target(), 40 * 1024 * 1024);
        assert!(config.apply_timeout().is_none());
    }

    #[test]
    fn test_deserialize_fills_defaults() {
        let config: OfflineSyncConfig =
            serde_json::from_str(r#"{"db_path": "/tmp/x.db", "max_retries": 5}"#).unwrap();
        assert_eq!(config.db_path.as_deref(), Some("/tmp/x.db"));
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.cache_max_bytes, 50 * 1024 * 1024);
        assert_eq!(config.cache_cleanup_ratio, 0.8);
    }

    #[test]
    fn test_validate_rejects_bad_ratio() {
        let config = OfflineSyncConfig {
            cache_cleanup_ratio: 1.5,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::InvalidBudget(_))));
    }

    #[test]
    fn test_validate_rejects_zero_retries() {
        let config = OfflineSyncConfig {
            max_retries: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::InvalidRetryPolicy(_))));
    }

    #[test]
    fn test_drain_backoff_follows_config() {
        let config = OfflineSyncConfig {
            retry_initial_ms: 10,
            retry_max_ms: 80,
            ..Default::default()
        };
        let backoff = config.drain_backoff();
        assert_eq!(backoff.initial_delay, Duration::from_millis(10));
        assert_eq!(backoff.max_delay, Duration::from_millis(80));
        assert_eq!(backoff.max_retries, Some(3));
    }
}
