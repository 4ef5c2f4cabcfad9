// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Basic offline-sync usage example.
//!
//! Demonstrates:
//! 1. Opening the engine over a SQLite file
//! 2. Caching a re-fetchable template with a TTL
//! 3. Editing a profile while offline (record + queued mutation)
//! 4. Reconnecting and watching the queue drain
//! 5. Retry exhaustion surfacing on the diagnostics channel
//! 6. Displaying metrics
//! 7. Clean shutdown
//!
//! # Run
//!
//! ```bash
//! cargo run --example basic_usage
//! ```

use std::time::Duration;

use async_trait::async_trait;
use metrics_util::debugging::{DebugValue, DebuggingRecorder, Snapshotter};
use serde_json::json;

use offline_sync::coordinator::{Mutation, MutationApplier, ResourceRouter};
use offline_sync::network::{NetworkStatus, Transport};
use offline_sync::{
    ApplyError, CacheOptions, OfflineSyncConfig, Priority, SyncAction, SyncContext, SyncEvent,
};

/// Pretend profile endpoint: always accepts.
struct ProfileApi;

#[async_trait]
impl MutationApplier for ProfileApi {
    async fn apply(&self, m: &Mutation) -> Result<(), ApplyError> {
        println!("   → PUT /profile {}", m.payload);
        Ok(())
    }
}

/// Pretend posts endpoint: rejects everything.
struct BrokenPostsApi;

#[async_trait]
impl MutationApplier for BrokenPostsApi {
    async fn apply(&self, m: &Mutation) -> Result<(), ApplyError> {
        println!("   → {} /posts (server says 503)", m.action);
        Err(ApplyError::Unavailable("503 Service Unavailable".into()))
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Install metrics recorder (captures all metrics for display)
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    recorder.install().expect("failed to install metrics recorder");

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "offline_sync=info".into()),
        )
        .with_target(false)
        .compact()
        .init();

    println!("\n╔═══════════════════════════════════════════════════════════════╗");
    println!("║           offline-sync: Basic Usage Example                   ║");
    println!("╚═══════════════════════════════════════════════════════════════╝\n");

    // ─────────────────────────────────────────────────────────────────────────
    // 1. Open the engine
    // ─────────────────────────────────────────────────────────────────────────
    let dir = tempfile::tempdir()?;
    let config = OfflineSyncConfig {
        db_path: Some(dir.path().join("offline.db").to_string_lossy().into_owned()),
        retry_initial_ms: 100,
        retry_max_ms: 400,
        ..Default::default()
    };
    println!("📦 Opening engine at {}", config.db_path.as_deref().unwrap_or("<memory>"));

    let router = ResourceRouter::new()
        .route("profile", ProfileApi)
        .route("posts", BrokenPostsApi);
    let ctx = SyncContext::open(config, router).await?;
    let mut events = ctx.coordinator().subscribe_events();

    // ─────────────────────────────────────────────────────────────────────────
    // 2. Cache a template
    // ─────────────────────────────────────────────────────────────────────────
    println!("\n🗂  Caching template tpl:123 for 5 minutes");
    ctx.cache()
        .put(
            "tpl:123",
            json!({"subject": "Welcome", "body": "Hi {{name}}"}),
            CacheOptions::new(Duration::from_secs(300)).with_priority(Priority::High),
        )
        .await?;
    println!("   tpl:123 = {:?}", ctx.cache().get("tpl:123").await);

    // ─────────────────────────────────────────────────────────────────────────
    // 3. Go offline and edit
    // ─────────────────────────────────────────────────────────────────────────
    println!("\n📴 Connectivity lost");
    ctx.network().report(NetworkStatus::offline());

    let revision = ctx.entities().save("profile:me", json!({"name": "B"})).await?;
    ctx.queue()
        .enqueue_for_record(SyncAction::Update, "profile", json!({"name": "B"}), Priority::High, "profile:me", revision)
        .await?;
    ctx.queue()
        .enqueue(SyncAction::Create, "posts", json!({"title": "draft"}), Priority::Low)
        .await?;

    let snapshot = ctx.queue().snapshot();
    println!(
        "   queue: pending={} in_retry={} exhausted={}",
        snapshot.pending_count, snapshot.in_retry_count, snapshot.exhausted_count
    );

    // ─────────────────────────────────────────────────────────────────────────
    // 4. Reconnect
    // ─────────────────────────────────────────────────────────────────────────
    println!("\n📶 Back online (wifi)");
    ctx.network().report(NetworkStatus::online(Transport::Wifi));

    // ─────────────────────────────────────────────────────────────────────────
    // 5. Watch diagnostics until the broken mutation is exhausted
    // ─────────────────────────────────────────────────────────────────────────
    let deadline = tokio::time::sleep(Duration::from_secs(5));
    tokio::pin!(deadline);
    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(SyncEvent::DrainCompleted(report)) => println!(
                    "   cycle: attempted={} ok={} retry={} exhausted={}",
                    report.attempted, report.succeeded, report.requeued, report.exhausted
                ),
                Ok(SyncEvent::Exhausted(dead)) => {
                    println!("   ✗ gave up on {} {}: {}", dead.item.action, dead.item.resource, dead.error);
                    break;
                }
                Err(_) => break,
            },
            _ = &mut deadline => break,
        }
    }

    let synced = ctx
        .entities()
        .record("profile:me")
        .await
        .is_some_and(|r| r.is_synced());
    println!("\n✅ profile:me synced = {}", synced);
    println!("   queue empty = {}", ctx.queue().is_empty());

    // ─────────────────────────────────────────────────────────────────────────
    // 6. Metrics
    // ─────────────────────────────────────────────────────────────────────────
    println!("\n📊 Metrics");
    dump_metrics(&snapshotter);

    // ─────────────────────────────────────────────────────────────────────────
    // 7. Clean shutdown
    // ─────────────────────────────────────────────────────────────────────────
    ctx.shutdown().await;
    println!("\n👋 Done\n");
    Ok(())
}

fn dump_metrics(snapshotter: &Snapshotter) {
    let snapshot = snapshotter.snapshot();

    let mut counters: Vec<_> = vec![];
    let mut gauges: Vec<_> = vec![];
    let mut histograms: Vec<_> = vec![];

    for (composite_key, _, _, value) in snapshot.into_vec() {
        let (_, key) = composite_key.into_parts();
        let name = key.name().to_string();
        let labels: Vec<_> = key.labels().map(|l| format!("{}={}", l.key(), l.value())).collect();
        let label_str = if labels.is_empty() { String::new() } else { format!("{{{}}}", labels.join(",")) };

        match value {
            DebugValue::Counter(v) => counters.push((name, label_str, v)),
            DebugValue::Gauge(v) => gauges.push((name, label_str, v.into_inner())),
            DebugValue::Histogram(samples) => {
                let count = samples.len();
                let sum: f64 = samples.iter().map(|v| v.into_inner()).sum();
                histograms.push((name, label_str, count, sum));
            }
        }
    }

    counters.sort();
    gauges.sort_by(|a, b| a.0.cmp(&b.0));
    histograms.sort_by(|a, b| a.0.cmp(&b.0));

    if !counters.is_empty() {
        println!("   ┌─ Counters");
        for (name, labels, value) in &counters {
            println!("   │  └─ {}{} = {}", name, labels, value);
        }
    }
    if !gauges.is_empty() {
        println!("   ├─ Gauges");
        for (name, labels, value) in &gauges {
            println!("   │  └─ {}{} = {:.0}", name, labels, value);
        }
    }
    if !histograms.is_empty() {
        println!("   └─ Histograms");
        for (name, labels, count, sum) in &histograms {
            println!("      └─ {}{} count={} sum={:.4}", name, labels, count, sum);
        }
    }
    if counters.is_empty() && gauges.is_empty() && histograms.is_empty() {
        println!("   └─ (no metrics recorded)");
    }
}
