// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Error types surfaced across the engine's API boundary.
//!
//! Transient storage failures ([`StorageError`]) are logged and absorbed by
//! the cache, entity store and queue. Only configuration misuse and failure
//! to open the engine reach the caller as [`SyncError`].

use thiserror::Error;

pub use crate::storage::traits::StorageError;

/// Caller misuse, rejected before anything reaches durable state.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("TTL must be a positive duration that fits in epoch milliseconds")]
    InvalidTtl,
    #[error("Unknown priority '{0}' (expected high, medium or low)")]
    UnknownPriority(String),
    #[error("Unknown sync action '{0}' (expected create, update or delete)")]
    UnknownAction(String),
    #[error("Key must not be empty")]
    EmptyKey,
    #[error("Resource name must not be empty")]
    EmptyResource,
    #[error("Invalid cache budget: {0}")]
    InvalidBudget(String),
    #[error("Invalid retry policy: {0}")]
    InvalidRetryPolicy(String),
}

/// Failure reported by the host's apply-mutation capability.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApplyError {
    #[error("Remote rejected mutation: {0}")]
    Rejected(String),
    #[error("Remote unavailable: {0}")]
    Unavailable(String),
    #[error("Apply timed out after {0:?}")]
    Timeout(std::time::Duration),
    #[error("No handler registered for resource '{0}'")]
    UnknownResource(String),
}

/// Errors returned by the engine's public API.
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}
