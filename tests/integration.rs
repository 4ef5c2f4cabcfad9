//! Integration Tests for Offline Sync
//!
//! End-to-end flows through [`SyncContext`]: feature code writes while
//! offline, the platform reports connectivity, the background worker drains.
//!
//! # Running Tests
//! ```bash
//! cargo test --test integration
//! ```
//!
//! # Test Organization
//! - `happy_*` - Normal operation: offline edits, reconnect, ordering, TTL
//! - `failure_*` - Apply failures, retry exhaustion, restart recovery

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};

use offline_sync::coordinator::{Mutation, MutationApplier};
use offline_sync::network::{NetworkMonitor, NetworkStatus, Transport};
use offline_sync::{
    ApplyError, CacheOptions, DrainState, InMemoryStore, ManualClock, OfflineSyncConfig,
    Priority, SqliteStore, SyncAction, SyncContext, SyncEvent, SystemClock,
};

// =============================================================================
// Helpers
// =============================================================================

/// Applier that records every mutation it receives and fails while `fail` is set.
#[derive(Default)]
struct RecordingApplier {
    applied: Mutex<Vec<Mutation>>,
    fail: std::sync::atomic::AtomicBool,
}

impl RecordingApplier {
    fn failing() -> Arc<Self> {
        let a = Self::default();
        a.fail.store(true, Ordering::SeqCst);
        Arc::new(a)
    }

    fn calls(&self) -> usize {
        self.applied.lock().len()
    }

    fn payloads(&self) -> Vec<Value> {
        self.applied.lock().iter().map(|m| m.payload.clone()).collect()
    }

    fn mutations(&self) -> Vec<Mutation> {
        self.applied.lock().clone()
    }
}

#[async_trait]
impl MutationApplier for RecordingApplier {
    async fn apply(&self, m: &Mutation) -> Result<(), ApplyError> {
        self.applied.lock().push(m.clone());
        if self.fail.load(Ordering::SeqCst) {
            Err(ApplyError::Unavailable("server down".into()))
        } else {
            Ok(())
        }
    }
}

struct Harness {
    ctx: SyncContext,
    clock: ManualClock,
}

async fn offline_context(applier: Arc<RecordingApplier>, config: OfflineSyncConfig) -> Harness {
    let clock = ManualClock::new(1_700_000_000_000);
    let ctx = SyncContext::with_store(
        config,
        applier,
        Arc::new(InMemoryStore::new()),
        Arc::new(clock.clone()),
        Arc::new(NetworkMonitor::with_initial(NetworkStatus::offline())),
    )
    .await
    .expect("context opens");
    Harness { ctx, clock }
}

/// Poll until `cond` holds or two seconds pass.
async fn wait_until(mut cond: impl FnMut() -> bool) -> bool {
    for _ in 0..200 {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    cond()
}

/// Let the worker pick up anything it was going to pick up.
async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}

// =============================================================================
// Happy Path
// =============================================================================

#[tokio::test]
async fn happy_profile_update_offline_then_online() {
    let applier = Arc::new(RecordingApplier::default());
    let h = offline_context(applier.clone(), OfflineSyncConfig::default()).await;
    let ctx = &h.ctx;

    let revision = ctx.entities().save("profile:me", json!({"name": "B"})).await.unwrap();
    ctx.queue()
        .enqueue_for_record(SyncAction::Update, "profile", json!({"name": "B"}), Priority::High, "profile:me", revision)
        .await
        .unwrap();

    settle().await;
    assert_eq!(ctx.queue().snapshot().pending_count, 1);
    assert_eq!(applier.calls(), 0);

    ctx.network().report(NetworkStatus::online(Transport::Wifi));

    assert!(wait_until(|| ctx.queue().is_empty()).await);
    assert_eq!(
        applier.mutations(),
        vec![Mutation {
            action: SyncAction::Update,
            resource: "profile".into(),
            payload: json!({"name": "B"}),
        }]
    );
    assert_eq!(ctx.queue().snapshot().pending_count, 0);
    assert!(ctx.entities().record("profile:me").await.unwrap().is_synced());

    ctx.shutdown().await;
}

#[tokio::test]
async fn happy_drain_order_is_priority_then_age() {
    let applier = Arc::new(RecordingApplier::default());
    let h = offline_context(applier.clone(), OfflineSyncConfig::default()).await;

    for (label, p) in [
        ("low", Priority::Low),
        ("high-1", Priority::High),
        ("medium", Priority::Medium),
        ("high-2", Priority::High),
    ] {
        h.ctx.queue().enqueue(SyncAction::Create, "post", json!(label), p).await.unwrap();
        h.clock.advance(Duration::from_millis(1));
    }

    let report = h.ctx.coordinator().drain_now().await;
    assert_eq!(report.succeeded, 4);
    assert_eq!(
        applier.payloads(),
        vec![json!("high-1"), json!("high-2"), json!("medium"), json!("low")]
    );
    h.ctx.shutdown().await;
}

#[tokio::test]
async fn happy_reconnect_triggers_exactly_one_drain() {
    let applier = Arc::new(RecordingApplier::default());
    let h = offline_context(applier.clone(), OfflineSyncConfig::default()).await;
    let mut events = h.ctx.coordinator().subscribe_events();

    for i in 0..3 {
        h.ctx.queue().enqueue(SyncAction::Create, "post", json!(i), Priority::Medium).await.unwrap();
    }

    let network = h.ctx.network();
    network.report(NetworkStatus::online(Transport::Wifi));
    network.report(NetworkStatus::online(Transport::Wifi));
    network.report(NetworkStatus::online(Transport::Cellular));

    assert!(wait_until(|| h.ctx.queue().is_empty()).await);
    settle().await;

    let mut cycles = 0;
    while let Ok(event) = events.try_recv() {
        if let SyncEvent::DrainCompleted(report) = event {
            assert_eq!(report.succeeded, 3);
            cycles += 1;
        }
    }
    assert_eq!(cycles, 1);
    assert_eq!(applier.calls(), 3);
    assert_eq!(h.ctx.coordinator().state(), DrainState::Idle);
    h.ctx.shutdown().await;
}

#[tokio::test]
async fn happy_template_cache_expires() {
    let applier = Arc::new(RecordingApplier::default());
    let h = offline_context(applier, OfflineSyncConfig::default()).await;
    let cache = h.ctx.cache();

    cache
        .put("tpl:123", json!({"body": "..."}), CacheOptions::new(Duration::from_secs(1)))
        .await
        .unwrap();
    assert!(cache.get("tpl:123").await.is_some());

    h.clock.advance(Duration::from_secs(2));
    assert!(cache.get("tpl:123").await.is_none());
    assert_eq!(cache.stats().memory_entries, 0);
    h.ctx.shutdown().await;
}

#[tokio::test]
async fn happy_drafts_listed_newest_first() {
    let applier = Arc::new(RecordingApplier::default());
    let h = offline_context(applier, OfflineSyncConfig::default()).await;

    for i in 0..4 {
        h.ctx.entities().save(&format!("draft:{i}"), json!({"n": i})).await.unwrap();
        h.clock.advance(Duration::from_secs(1));
    }

    let keys: Vec<String> = h.ctx.entities().list_by_prefix("draft:").await.map(|r| r.key).collect();
    assert_eq!(keys, vec!["draft:3", "draft:2", "draft:1", "draft:0"]);
    h.ctx.shutdown().await;
}

#[tokio::test]
async fn happy_requests_while_offline_are_ignored() {
    let applier = Arc::new(RecordingApplier::default());
    let h = offline_context(applier.clone(), OfflineSyncConfig::default()).await;

    h.ctx.queue().enqueue(SyncAction::Create, "post", json!(1), Priority::Low).await.unwrap();
    h.ctx.coordinator().trigger().request();
    settle().await;

    assert_eq!(applier.calls(), 0);
    assert_eq!(h.ctx.queue().len(), 1);
    h.ctx.shutdown().await;
}

// =============================================================================
// Failure Scenarios
// =============================================================================

#[tokio::test]
async fn failure_three_failures_exhaust_without_fourth_attempt() {
    let applier = RecordingApplier::failing();
    let h = offline_context(applier.clone(), OfflineSyncConfig::default()).await;
    let mut events = h.ctx.coordinator().subscribe_events();

    h.ctx.queue().enqueue(SyncAction::Update, "profile", json!({}), Priority::High).await.unwrap();

    for _ in 0..3 {
        h.ctx.coordinator().drain_now().await;
    }
    assert!(h.ctx.queue().is_empty());

    let extra = h.ctx.coordinator().drain_now().await;
    assert!(extra.is_empty());
    assert_eq!(applier.calls(), 3);

    let exhausted: Vec<_> = std::iter::from_fn(|| events.try_recv().ok())
        .filter_map(|e| match e {
            SyncEvent::Exhausted(x) => Some(x),
            _ => None,
        })
        .collect();
    assert_eq!(exhausted.len(), 1);
    assert_eq!(exhausted[0].item.resource, "profile");
    assert_eq!(exhausted[0].item.retry_count, 3);
    h.ctx.shutdown().await;
}

#[tokio::test]
async fn failure_backoff_retries_until_exhausted_while_online() {
    let applier = RecordingApplier::failing();
    let config = OfflineSyncConfig {
        retry_initial_ms: 5,
        retry_max_ms: 20,
        ..Default::default()
    };
    let h = offline_context(applier.clone(), config).await;

    h.ctx.queue().enqueue(SyncAction::Delete, "post", json!({"id": 1}), Priority::Low).await.unwrap();
    h.ctx.network().report(NetworkStatus::online(Transport::Ethernet));

    // First attempt on reconnect, then two backoff follow-ups
    assert!(wait_until(|| applier.calls() == 3).await);
    assert!(wait_until(|| h.ctx.queue().is_empty()).await);
    settle().await;
    assert_eq!(applier.calls(), 3);
    assert_eq!(h.ctx.coordinator().take_dead_letters().len(), 1);
    h.ctx.shutdown().await;
}

#[tokio::test]
async fn failure_recovers_after_transient_errors() {
    let applier = RecordingApplier::failing();
    let h = offline_context(applier.clone(), OfflineSyncConfig::default()).await;

    h.ctx.queue().enqueue(SyncAction::Create, "post", json!("x"), Priority::Medium).await.unwrap();
    h.ctx.coordinator().drain_now().await;
    assert_eq!(h.ctx.queue().snapshot().in_retry_count, 1);

    applier.fail.store(false, Ordering::SeqCst);
    let report = h.ctx.coordinator().drain_now().await;
    assert_eq!(report.succeeded, 1);
    assert!(h.ctx.queue().is_empty());
    h.ctx.shutdown().await;
}

#[tokio::test]
async fn failure_restart_replays_pending_mutations() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("offline.db");
    let path = path.to_string_lossy().into_owned();
    let config = OfflineSyncConfig {
        db_path: Some(path.clone()),
        ..Default::default()
    };

    // First run: offline the whole time
    {
        let ctx = SyncContext::with_store(
            config.clone(),
            RecordingApplier::default(),
            Arc::new(SqliteStore::open(&path).await.unwrap()),
            Arc::new(SystemClock),
            Arc::new(NetworkMonitor::with_initial(NetworkStatus::offline())),
        )
        .await
        .unwrap();
        ctx.queue().enqueue(SyncAction::Create, "post", json!("a"), Priority::Low).await.unwrap();
        ctx.queue().enqueue(SyncAction::Create, "post", json!("b"), Priority::High).await.unwrap();
        ctx.shutdown().await;
    }

    // Second run: starts online, drains recovered work
    let applier = Arc::new(RecordingApplier::default());
    let ctx = SyncContext::open(config, applier.clone()).await.unwrap();
    assert!(wait_until(|| applier.calls() == 2).await);
    assert_eq!(applier.payloads(), vec![json!("b"), json!("a")]);
    assert!(wait_until(|| ctx.queue().is_empty()).await);
    ctx.shutdown().await;
}

#[tokio::test]
async fn failure_invalid_input_never_persisted() {
    let applier = Arc::new(RecordingApplier::default());
    let h = offline_context(applier, OfflineSyncConfig::default()).await;

    assert!(h.ctx.queue().enqueue(SyncAction::Create, "", json!(1), Priority::Low).await.is_err());
    assert!("urgent".parse::<Priority>().is_err());
    assert!("merge".parse::<SyncAction>().is_err());
    assert!(CacheOptions::from_raw(0, "high").is_err());
    assert!(h.ctx.queue().is_empty());
    assert!(h.ctx.queue().snapshot().is_empty());
    h.ctx.shutdown().await;
}
