// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Metrics instrumentation for offline-sync.
//!
//! Uses the `metrics` crate for backend-agnostic metrics collection.
//! The host application is responsible for choosing the exporter.
//!
//! # Metric Naming Convention
//! - `offline_sync_` prefix for all metrics
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//! - `_bytes` suffix for sizes
//!
//! # Labels
//! - `component`: cache, entities, queue
//! - `operation`: get, put, remove, cleanup, persist, ...
//! - `status` / `outcome`: hit, miss, expired, success, error, ...

use metrics::{counter, gauge, histogram};
use std::time::Duration;

/// Record a cache operation outcome
pub fn record_cache_op(operation: &str, status: &str) {
    counter!(
        "offline_sync_cache_operations_total",
        "operation" => operation.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// Record an entity store operation outcome
pub fn record_entity_op(operation: &str, status: &str) {
    counter!(
        "offline_sync_entity_operations_total",
        "operation" => operation.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// Set estimated resident cache size in bytes
pub fn set_cache_bytes(bytes: usize) {
    gauge!("offline_sync_cache_bytes").set(bytes as f64);
}

/// Set in-memory cache entry count
pub fn set_cache_items(count: usize) {
    gauge!("offline_sync_cache_items").set(count as f64);
}

/// Record entries evicted by a cleanup pass
pub fn record_eviction(count: usize, bytes: usize) {
    counter!("offline_sync_cache_evictions_total").increment(count as u64);
    counter!("offline_sync_cache_evicted_bytes_total").increment(bytes as u64);
}

/// Record cleanup pass duration
pub fn record_cleanup(duration: Duration) {
    histogram!("offline_sync_cache_cleanup_seconds").record(duration.as_secs_f64());
}

/// Record a durable-layer failure that was absorbed
pub fn record_storage_error(component: &str, operation: &str) {
    counter!(
        "offline_sync_storage_errors_total",
        "component" => component.to_string(),
        "operation" => operation.to_string()
    )
    .increment(1);
}

/// Set number of mutations waiting (including in flight)
pub fn set_queue_depth(count: usize) {
    gauge!("offline_sync_queue_depth").set(count as f64);
}

/// Record a mutation submitted to the queue
pub fn record_enqueue(resource: &str) {
    counter!(
        "offline_sync_mutations_enqueued_total",
        "resource" => resource.to_string()
    )
    .increment(1);
}

/// Record the outcome of one apply attempt
pub fn record_mutation(resource: &str, outcome: &str) {
    counter!(
        "offline_sync_mutations_applied_total",
        "resource" => resource.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

/// Record a mutation dropped after exhausting its retries
pub fn record_exhausted(resource: &str) {
    counter!(
        "offline_sync_mutations_exhausted_total",
        "resource" => resource.to_string()
    )
    .increment(1);
}

/// Record a completed drain cycle
pub fn record_drain_cycle(duration: Duration, attempted: usize) {
    histogram!("offline_sync_drain_cycle_seconds").record(duration.as_secs_f64());
    histogram!("offline_sync_drain_cycle_items").record(attempted as f64);
}

/// Set 1 when online, 0 when offline
pub fn set_network_online(online: bool) {
    gauge!("offline_sync_network_online").set(if online { 1.0 } else { 0.0 });
}

/// Record a connectivity edge ("online" / "offline")
pub fn record_network_transition(direction: &str) {
    counter!(
        "offline_sync_network_transitions_total",
        "direction" => direction.to_string()
    )
    .increment(1);
}
