// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Durable storage backends.
//!
//! - [`memory::InMemoryStore`]: DashMap-backed, non-persistent
//! - [`sql::SqliteStore`]: SQLite file via sqlx

pub mod traits;
pub mod memory;
pub mod sql;
#[cfg(test)]
pub(crate) mod failing;

pub use traits::{DurableStore, Namespace, StorageError};
pub use memory::InMemoryStore;
pub use sql::SqliteStore;
