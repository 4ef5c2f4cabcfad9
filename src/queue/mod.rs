// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Priority-ordered durable queue of server-bound mutations.

mod item;
mod store;

pub use item::{QueueSnapshot, SyncAction, SyncQueueItem};
pub use store::{SyncQueue, QUEUE_DOC_KEY};
