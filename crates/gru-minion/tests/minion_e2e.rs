//! End-to-end minion scenarios against the in-memory KV gateway.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use gru_catalog::{Catalog, Resource, ResourceSpec, ResourceState};
use gru_core::kv::{Kv, MemoryKv, SetOptions};
use gru_minion::agent::Minion;
use gru_minion::classifier;
use gru_minion::task::{Task, TaskState};
use gru_minion::writer::CLASSIFIER_TTL;
use gru_test_utils::{init_test_logging, TracingKv};

/// A resource that reports itself converged after a configurable pause.
struct Slow {
    name: String,
    pause: Duration,
}

#[async_trait]
impl Resource for Slow {
    fn name(&self) -> &str {
        &self.name
    }

    fn type_name(&self) -> &str {
        "slow"
    }

    async fn evaluate(&self) -> gru_catalog::Result<ResourceState> {
        tokio::time::sleep(self.pause).await;
        Ok(ResourceState {
            current: "present".into(),
            want: "present".into(),
            outdated: false,
        })
    }

    async fn create(&self, _sink: &mut gru_catalog::Sink) -> gru_catalog::Result<()> {
        Ok(())
    }

    async fn delete(&self, _sink: &mut gru_catalog::Sink) -> gru_catalog::Result<()> {
        Ok(())
    }

    async fn update(&self, sink: &mut gru_catalog::Sink) -> gru_catalog::Result<()> {
        writeln!(sink, "slow[{}] update", self.name)?;
        Ok(())
    }
}

fn slow_provider(spec: &ResourceSpec) -> gru_catalog::Result<Box<dyn Resource>> {
    let pause = spec
        .options
        .get("pause_ms")
        .and_then(|v| v.parse().ok())
        .map_or(Duration::from_millis(500), Duration::from_millis);
    Ok(Box::new(Slow {
        name: spec.name.clone(),
        pause,
    }))
}

fn register_providers() {
    gru_catalog::register_builtin();
    classifier::register_builtin();
    let _ = gru_catalog::register(gru_catalog::RegistryItem {
        type_name: "slow",
        provider: slow_provider,
    });
}

/// Polls the task log until the record for `task_id` reaches a terminal
/// state, or the timeout expires.
async fn await_terminal(kv: &dyn Kv, log_key: &str, timeout: Duration) -> Task {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if let Ok(node) = kv.get(log_key, false).await {
            if let Ok(task) = Task::from_json(&node.value) {
                if task.state.is_terminal() {
                    return task;
                }
            }
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "no terminal record at {log_key} within {timeout:?}"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

async fn await_gone(kv: &dyn Kv, key: &str, timeout: Duration) {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        match kv.get(key, false).await {
            Err(e) if e.is_not_found() => return,
            _ => {}
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "{key} still present after {timeout:?}"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

// S1: a separate reader observes the lastseen write at the derived key.
#[tokio::test]
async fn lastseen_write_through() {
    init_test_logging();
    let kv = Arc::new(MemoryKv::new());
    let minion = Minion::new("Kevin", kv.clone() as Arc<dyn Kv>);

    let want: i64 = 1_450_357_761;
    minion.writer().set_lastseen(want).await.unwrap();

    let id = gru_core::MinionId::derive("Kevin");
    let node = kv
        .get(&format!("/gru/minion/{id}/lastseen"), false)
        .await
        .unwrap();
    assert_eq!(node.value, "1450357761");
}

// S2: a queued task present before startup is drained, executed, and its
// terminal log records the empty-catalog header.
#[tokio::test]
async fn queue_drains_on_startup() {
    init_test_logging();
    register_providers();

    let kv = Arc::new(MemoryKv::new());
    let minion = Minion::new("Kevin", kv.clone() as Arc<dyn Kv>);
    let paths = minion.paths().clone();

    let task = Task::new(Catalog::new());
    kv.set(
        &paths.queue_key("aaa"),
        &task.to_json().unwrap(),
        SetOptions::none(),
    )
    .await
    .unwrap();

    minion.serve().await.unwrap();

    let done = await_terminal(
        kv.as_ref(),
        &paths.log_key(task.task_id),
        Duration::from_secs(5),
    )
    .await;
    assert_eq!(done.state, TaskState::Success);
    assert!(done.result.contains("Loaded 0 resources from catalog"));
    assert!(done.time_received > 0);
    assert!(done.time_processed >= done.time_received);

    await_gone(kv.as_ref(), &paths.queue_key("aaa"), Duration::from_secs(1)).await;
    minion.stop();
}

// S3: watch failures back off exponentially from one second, and the delay
// returns to one second after a successful event.
#[tokio::test(start_paused = true)]
async fn watcher_backs_off_and_resets() {
    init_test_logging();
    register_providers();

    let kv = Arc::new(TracingKv::new());
    kv.break_watch(true);

    let minion = Minion::new("Kevin", kv.clone() as Arc<dyn Kv>);
    let paths = minion.paths().clone();
    minion.serve().await.unwrap();

    // Let several failed establishment attempts accumulate.
    tokio::time::sleep(Duration::from_secs(40)).await;

    let attempts = kv.watch_attempts();
    assert!(attempts.len() >= 4, "expected several watch attempts");

    // First retry is exactly the minimum; later gaps stay inside the
    // doubling envelope and never shrink below the minimum.
    let tolerance = Duration::from_millis(20);
    let first_gap = attempts[1] - attempts[0];
    assert!(first_gap >= Duration::from_secs(1));
    assert!(first_gap <= Duration::from_secs(1) + tolerance);

    let mut envelope = Duration::from_secs(2);
    for pair in attempts[1..].windows(2) {
        let gap = pair[1] - pair[0];
        assert!(gap >= Duration::from_secs(1), "gap {gap:?} below minimum");
        assert!(gap <= envelope + tolerance, "gap {gap:?} above {envelope:?}");
        envelope = (envelope * 2).min(Duration::from_secs(600));
    }

    // Heal the store and deliver an event so the backoff resets.
    kv.break_watch(false);
    tokio::time::sleep(Duration::from_secs(700)).await;
    kv.set(&paths.queue_key("reset"), "not-a-task", SetOptions::none())
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_secs(1)).await;

    // Break again: the very next retry must come after the minimum delay.
    let before = kv.watch_attempts().len();
    let broken_at = tokio::time::Instant::now();
    kv.break_watch(true);
    tokio::time::sleep(Duration::from_secs(5)).await;

    let attempts = kv.watch_attempts();
    assert!(attempts.len() > before, "expected a retry after the break");
    let retry_gap = attempts[before] - broken_at;
    assert!(retry_gap >= Duration::from_secs(1));
    assert!(retry_gap <= Duration::from_secs(1) + tolerance);

    minion.stop();
}

// S4: a concurrent slow task does not block a sequential fast one, and both
// reach success.
#[tokio::test]
async fn concurrent_task_does_not_block_sequential() {
    init_test_logging();
    register_providers();

    let kv = Arc::new(MemoryKv::new());
    let minion = Minion::new("Kevin", kv.clone() as Arc<dyn Kv>);
    let paths = minion.paths().clone();

    let mut slow_spec = ResourceSpec::new("slow", "simmer");
    slow_spec
        .options
        .insert("pause_ms".into(), "500".into());
    let t1 = Task::new(Catalog::with_resources(vec![slow_spec])).concurrent();
    let t2 = Task::new(Catalog::new());

    kv.set(
        &paths.queue_key("aaa"),
        &t1.to_json().unwrap(),
        SetOptions::none(),
    )
    .await
    .unwrap();
    kv.set(
        &paths.queue_key("bbb"),
        &t2.to_json().unwrap(),
        SetOptions::none(),
    )
    .await
    .unwrap();

    minion.serve().await.unwrap();

    let t2_done = await_terminal(
        kv.as_ref(),
        &paths.log_key(t2.task_id),
        Duration::from_secs(5),
    )
    .await;
    assert_eq!(t2_done.state, TaskState::Success);

    // T1 is still simmering when T2 finishes.
    if let Ok(node) = kv.get(&paths.log_key(t1.task_id), false).await {
        let record = Task::from_json(&node.value).unwrap();
        assert!(!record.state.is_terminal(), "slow task finished too early");
    }

    let t1_done = await_terminal(
        kv.as_ref(),
        &paths.log_key(t1.task_id),
        Duration::from_secs(5),
    )
    .await;
    assert_eq!(t1_done.state, TaskState::Success);

    minion.stop();
}

// S5: a malformed payload is removed from the queue, produces no log
// record, and leaves the watcher healthy.
#[tokio::test]
async fn malformed_payload_never_wedges_the_queue() {
    init_test_logging();
    register_providers();

    let kv = Arc::new(MemoryKv::new());
    let minion = Minion::new("Kevin", kv.clone() as Arc<dyn Kv>);
    let paths = minion.paths().clone();
    minion.serve().await.unwrap();

    // Give the watcher a moment to subscribe.
    tokio::time::sleep(Duration::from_millis(50)).await;

    kv.set(&paths.queue_key("z"), "not-a-task", SetOptions::none())
        .await
        .unwrap();
    await_gone(kv.as_ref(), &paths.queue_key("z"), Duration::from_secs(5)).await;

    // No log record may exist for the dropped payload.
    assert!(kv.get(paths.log(), true).await.unwrap_err().is_not_found());

    // The watcher still executes valid tasks afterwards.
    let task = Task::new(Catalog::new());
    kv.set(
        &paths.queue_key("zz"),
        &task.to_json().unwrap(),
        SetOptions::none(),
    )
    .await
    .unwrap();
    let done = await_terminal(
        kv.as_ref(),
        &paths.log_key(task.task_id),
        Duration::from_secs(5),
    )
    .await;
    assert_eq!(done.state, TaskState::Success);

    minion.stop();
}

// S6: with the ticker running, classifier entries exist at every sampled
// moment across eleven minutes of simulated time.
#[tokio::test(start_paused = true)]
async fn classifier_ttl_stays_alive_across_ticks() {
    init_test_logging();
    register_providers();

    let kv = Arc::new(MemoryKv::new());
    let minion = Minion::new("Kevin", kv.clone() as Arc<dyn Kv>);
    let paths = minion.paths().clone();
    minion.serve().await.unwrap();

    // Initial classification runs as part of serve.
    tokio::time::sleep(Duration::from_millis(10)).await;
    let key = paths.classifier_key("os");

    let mut elapsed = Duration::ZERO;
    let step = Duration::from_secs(30);
    while elapsed < Duration::from_secs(11 * 60) {
        tokio::time::sleep(step).await;
        elapsed += step;

        let remaining = kv
            .ttl_remaining(&key)
            .unwrap()
            .unwrap_or_else(|| panic!("classifier expired after {elapsed:?}"));
        assert!(remaining > Duration::ZERO);
        assert!(remaining <= CLASSIFIER_TTL);

        let node = kv.get(&key, false).await.expect("classifier key present");
        assert!(!node.value.is_empty());
    }

    minion.stop();
}
