// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end scenarios against the library crates directly: a definition
//! goes in, a converged job tree comes out. No daemon process, no socket —
//! these exercise the same `JobManager`/`DurableQueue`/`JobDispatcher`/
//! `JobProcessor`/`JobMonitor`/`Scheduler`/`StaleReaper` wiring that `jwd`
//! assembles at startup.

use async_trait::async_trait;
use jw_core::{
    Clock, EngineError, ErrorTolerance, FailureAction, FakeClock, JobStatus, JobWorker, KvEntry,
    OnError, QueueJob, StepSpec, WorkerOutcome,
};
use jw_core::{JobDefinition, JobId};
use jw_engine::{DurableQueue, EventBus, JobDispatcher, JobManager, JobMonitor, JobProcessor, Scheduler, StaleReaper, StepManager};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

struct Harness {
    _dir: TempDir,
    manager: Arc<JobManager<FakeClock>>,
    queue: Arc<DurableQueue<FakeClock>>,
    steps: Arc<StepManager>,
    events: EventBus,
    clock: FakeClock,
}

fn harness() -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let clock = FakeClock::new();
    let events = EventBus::new();
    let manager = Arc::new(
        JobManager::open(&dir.path().join("jobs.wal"), events.clone(), clock.clone()).unwrap(),
    );
    let queue = Arc::new(DurableQueue::open(&dir.path().join("queue.wal"), clock.clone()).unwrap());
    let steps = Arc::new(StepManager::new());
    Harness { _dir: dir, manager, queue, steps, events, clock }
}

fn definition(id: &str, steps: Vec<StepSpec>) -> JobDefinition {
    JobDefinition {
        id: id.to_string(),
        name: id.to_string(),
        description: String::new(),
        schedule: None,
        timeout_secs: None,
        enabled: true,
        auto_start: false,
        tags: Vec::new(),
        error_tolerance: ErrorTolerance::default(),
        config: HashMap::new(),
        steps,
    }
}

fn step(name: &str, step_type: &str, depends: &[&str], config: HashMap<String, String>) -> StepSpec {
    StepSpec {
        name: name.to_string(),
        step_type: step_type.to_string(),
        depends: depends.iter().map(|s| s.to_string()).collect(),
        config,
        on_error: OnError::Fail,
        timeout_secs: None,
    }
}

/// A job worker that always fails permanently, for the error-tolerance
/// scenario. Mirrors the `echo` adapter's shape but without any leaf
/// fan-out.
struct AlwaysFailsWorker;

#[async_trait]
impl JobWorker for AlwaysFailsWorker {
    fn job_type(&self) -> &str {
        "always_fails"
    }

    fn validate(&self, _config: &HashMap<String, String>) -> Result<(), EngineError> {
        Ok(())
    }

    async fn execute(&self, _job_id: JobId, _config: &HashMap<String, String>) -> WorkerOutcome {
        // Simulate in-flight work so the monitor's cascade cancel has a
        // chance to reach the still-pending siblings before the single
        // worker would otherwise race through all three.
        tokio::time::sleep(Duration::from_millis(150)).await;
        WorkerOutcome::Permanent("synthetic failure".to_string())
    }
}

struct AlwaysFailsStepWorker;

#[async_trait]
impl jw_core::StepWorker for AlwaysFailsStepWorker {
    fn step_type(&self) -> &str {
        "always_fails"
    }

    async fn create_jobs(&self, ctx: &jw_core::StepContext) -> Result<Vec<jw_core::QueueJobSpec>, EngineError> {
        Ok((0..3)
            .map(|i| jw_core::QueueJobSpec::new(format!("{}-{i}", ctx.step_name), "always_fails"))
            .collect())
    }
}

/// Expand a two-step linear definition (`fetch` with `n=3`, `summarize`
/// with `n=2` depending on `fetch`) and run it to completion, asserting the
/// tree converges with the correct rollup counts.
#[tokio::test]
async fn linear_two_step_definition_converges_with_summed_results() {
    let h = harness();
    h.steps.register_step_worker(Arc::new(jw_adapters::EchoStepWorker));
    h.steps.register_job_worker(Arc::new(jw_adapters::EchoJobWorker));

    let dispatcher = Arc::new(JobDispatcher::with_poll_interval(
        h.manager.clone(),
        h.queue.clone(),
        h.steps.clone(),
        h.clock.clone(),
        Duration::from_millis(5),
    ));
    let processor = JobProcessor::new(h.manager.clone(), h.queue.clone(), h.steps.clone(), h.events.clone())
        .with_concurrency(4)
        .with_heartbeat_interval(Duration::from_secs(3600));
    let shutdown = CancellationToken::new();
    let processor_handle = tokio::spawn(processor.run(shutdown.clone()));

    let mut fetch_config = HashMap::new();
    fetch_config.insert("n".to_string(), "3".to_string());
    let mut summarize_config = HashMap::new();
    summarize_config.insert("n".to_string(), "2".to_string());

    let def = definition(
        "pipeline",
        vec![
            step("fetch", "echo", &[], fetch_config),
            step("summarize", "echo", &["fetch"], summarize_config),
        ],
    );

    let parent_id = tokio::time::timeout(
        Duration::from_secs(5),
        dispatcher.execute_definition(&def, HashMap::new()),
    )
    .await
    .expect("dispatch did not converge in time")
    .unwrap();

    let monitor = JobMonitor::new(h.manager.clone(), parent_id, ErrorTolerance::default());
    tokio::time::timeout(Duration::from_secs(5), monitor.run(h.events.clone()))
        .await
        .expect("monitor did not converge in time");

    shutdown.cancel();
    processor_handle.await.unwrap();

    let parent = h.manager.get(&parent_id).unwrap();
    assert_eq!(parent.status, JobStatus::Completed);
    assert_eq!(parent.result_count, 5);
    assert_eq!(h.manager.children_of(&parent_id).len(), 5);
}

/// A parent with `stop_all` error tolerance cancels every still-running
/// child the moment the failure threshold is crossed, rather than waiting
/// for the rest of the tree to finish on its own.
#[tokio::test]
async fn stop_all_error_tolerance_cascades_cancel_on_first_failure() {
    let h = harness();
    h.steps.register_step_worker(Arc::new(AlwaysFailsStepWorker));
    h.steps.register_job_worker(Arc::new(AlwaysFailsWorker));

    let dispatcher = Arc::new(JobDispatcher::new(h.manager.clone(), h.queue.clone(), h.steps.clone(), h.clock.clone()));
    let processor = JobProcessor::new(h.manager.clone(), h.queue.clone(), h.steps.clone(), h.events.clone())
        .with_concurrency(1)
        .with_heartbeat_interval(Duration::from_secs(3600));
    let shutdown = CancellationToken::new();
    let processor_handle = tokio::spawn(processor.run(shutdown.clone()));

    let def = definition("doomed", vec![step("fail", "always_fails", &[], HashMap::new())]);
    let tolerance = ErrorTolerance { max_child_failures: 1, failure_action: FailureAction::StopAll };

    let parent_id = tokio::time::timeout(
        Duration::from_secs(5),
        dispatcher.execute_definition(&def, HashMap::new()),
    )
    .await
    .expect("dispatch did not converge in time")
    .unwrap();

    let monitor = JobMonitor::new(h.manager.clone(), parent_id, tolerance);
    tokio::time::timeout(Duration::from_secs(5), monitor.run(h.events.clone()))
        .await
        .expect("monitor did not converge in time");

    shutdown.cancel();
    processor_handle.await.unwrap();

    let parent = h.manager.get(&parent_id).unwrap();
    assert_eq!(parent.status, JobStatus::Failed);
    let children = h.manager.children_of(&parent_id);
    assert!(children.iter().any(|c| c.status == JobStatus::Failed));
    assert!(children.iter().any(|c| c.status == JobStatus::Cancelled));
}

/// A running job whose heartbeat goes quiet past the threshold is failed
/// by the reaper sweep rather than left stuck forever.
#[tokio::test]
async fn stale_reaper_fails_jobs_past_the_heartbeat_threshold() {
    let h = harness();
    let job = QueueJob::builder().parent_id(None).build();
    h.manager.create(job.clone()).unwrap();
    h.manager.start(job.id).unwrap();

    let reaper = StaleReaper::new(h.manager.clone())
        .with_threshold(Duration::from_secs(60))
        .with_reap_interval(Duration::from_secs(1));

    assert!(reaper.sweep().is_empty());

    h.clock.advance(Duration::from_secs(120));
    let reaped = reaper.sweep();

    assert_eq!(reaped, vec![job.id]);
    let reaped_job = h.manager.get(&job.id).unwrap();
    assert_eq!(reaped_job.status, JobStatus::Failed);
    assert!(reaped_job.error.as_deref().unwrap_or_default().contains("heartbeat"));
}

/// `Scheduler::tick` fires an enabled, due definition exactly once and
/// respects the per-definition cooldown against a near-simultaneous second
/// tick.
#[tokio::test]
async fn scheduler_fires_a_due_definition_and_cools_down() {
    let h = harness();
    h.steps.register_step_worker(Arc::new(jw_adapters::EchoStepWorker));
    h.steps.register_job_worker(Arc::new(jw_adapters::EchoJobWorker));

    let dispatcher = Arc::new(JobDispatcher::new(h.manager.clone(), h.queue.clone(), h.steps.clone(), h.clock.clone()));
    let mut def = definition("ticker", vec![step("only", "echo", &[], HashMap::new())]);
    def.schedule = Some("* * * * * *".to_string());
    h.manager.upsert_definition(def).unwrap();

    let scheduler = Scheduler::new(h.manager.clone(), dispatcher.clone(), h.events.clone(), h.clock.clone())
        .with_tick_interval(Duration::from_secs(60))
        .with_cooldown(Duration::from_secs(60));

    let now_ms = h.clock.epoch_ms();
    let fired = scheduler.tick(now_ms);
    assert_eq!(fired, vec!["ticker".to_string()]);

    // A second tick one second later is inside the cooldown window.
    let fired_again = scheduler.tick(now_ms + 1_000);
    assert!(fired_again.is_empty());

    // Let the spawned dispatch task run to completion.
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(!h.manager.jobs_by_definition("ticker").is_empty());
}

/// `cascade_cancel` on a mid-flight parent reaches every non-terminal
/// descendant, leaving already-terminal siblings untouched.
#[tokio::test]
async fn cascade_cancel_stops_only_the_still_running_subtree() {
    let h = harness();
    let parent = QueueJob::builder().build();
    h.manager.create(parent.clone()).unwrap();
    h.manager.start(parent.id).unwrap();

    let done = QueueJob::builder().parent_id(Some(parent.id)).build();
    let running_a = QueueJob::builder().parent_id(Some(parent.id)).build();
    let running_b = QueueJob::builder().parent_id(Some(parent.id)).build();
    for child in [&done, &running_a, &running_b] {
        h.manager.create(child.clone()).unwrap();
    }
    h.manager.start(done.id).unwrap();
    h.manager.finish(done.id, JobStatus::Completed, 1, 0, None).unwrap();
    h.manager.start(running_a.id).unwrap();
    h.manager.start(running_b.id).unwrap();

    h.manager.cascade_cancel(parent.id).unwrap();

    assert_eq!(h.manager.get(&parent.id).unwrap().status, JobStatus::Cancelled);
    assert_eq!(h.manager.get(&done.id).unwrap().status, JobStatus::Completed);
    assert_eq!(h.manager.get(&running_a.id).unwrap().status, JobStatus::Cancelled);
    assert_eq!(h.manager.get(&running_b.id).unwrap().status, JobStatus::Cancelled);
}

/// `{key}` placeholders in a step's config resolve against KV storage, with
/// per-submission overrides taking precedence; an unresolved key is left
/// untouched and logged rather than failing the dispatch.
#[tokio::test]
async fn placeholder_substitution_prefers_overrides_over_kv_storage() {
    let h = harness();
    h.steps.register_step_worker(Arc::new(jw_adapters::EchoStepWorker));
    h.steps.register_job_worker(Arc::new(jw_adapters::EchoJobWorker));

    h.manager
        .kv_set(KvEntry { key: "region".to_string(), value: "us-east".to_string(), description: None })
        .unwrap();

    let dispatcher = Arc::new(JobDispatcher::new(h.manager.clone(), h.queue.clone(), h.steps.clone(), h.clock.clone()));

    let mut config = HashMap::new();
    config.insert("where".to_string(), "{region}".to_string());
    config.insert("missing".to_string(), "{nope}".to_string());
    let def = definition("templated", vec![step("only", "echo", &[], config)]);

    let mut overrides = HashMap::new();
    overrides.insert("region".to_string(), "eu-west".to_string());

    let parent_id = dispatcher.execute_definition(&def, overrides).await.unwrap();

    let children = h.manager.children_of(&parent_id);
    assert_eq!(children.len(), 1);
    assert_eq!(children[0].config.get("where"), Some(&"eu-west".to_string()));
    assert_eq!(children[0].config.get("missing"), Some(&"{nope}".to_string()));

    let logs = h.manager.logs_of(&parent_id);
    assert!(logs.iter().any(|l| l.message.contains("nope")));
}
