// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Bounded TTL cache for re-fetchable data.
//!
//! Best-effort by contract: durable failures degrade to misses and
//! memory-only writes, never to errors.

mod entry;
mod store;

pub use entry::{CacheEntry, CacheOptions};
pub use store::{CacheStats, CacheStore, CleanupReport};
