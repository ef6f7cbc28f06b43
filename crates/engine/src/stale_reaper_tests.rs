// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::event_bus::EventBus;
use jw_core::{FakeClock, JobStatus, QueueJob};
use tempfile::tempdir;

#[test]
fn a_running_job_past_the_threshold_is_failed_with_a_timeout_message() {
    let dir = tempdir().unwrap();
    let clock = FakeClock::new();
    let manager = Arc::new(
        JobManager::open(&dir.path().join("jobs.wal"), EventBus::new(), clock.clone()).unwrap(),
    );

    let job = QueueJob::builder().job_type("work").build();
    manager.create(job.clone()).unwrap();
    manager.start(job.id).unwrap();

    clock.advance(Duration::from_secs(10));

    let reaper = StaleReaper::new(manager.clone()).with_threshold(Duration::from_secs(5));
    let reaped = reaper.sweep();

    assert_eq!(reaped, vec![job.id]);
    let finished = manager.get(&job.id).unwrap();
    assert_eq!(finished.status, JobStatus::Failed);
    assert!(finished.error.as_deref().unwrap().starts_with("Timeout:"));
}

#[test]
fn a_fresh_heartbeat_is_left_alone() {
    let dir = tempdir().unwrap();
    let clock = FakeClock::new();
    let manager = Arc::new(
        JobManager::open(&dir.path().join("jobs.wal"), EventBus::new(), clock.clone()).unwrap(),
    );

    let job = QueueJob::builder().job_type("work").build();
    manager.create(job.clone()).unwrap();
    manager.start(job.id).unwrap();

    clock.advance(Duration::from_secs(2));
    manager.heartbeat(job.id).unwrap();
    clock.advance(Duration::from_secs(2));

    let reaper = StaleReaper::new(manager.clone()).with_threshold(Duration::from_secs(5));
    let reaped = reaper.sweep();

    assert!(reaped.is_empty());
    assert_eq!(manager.get(&job.id).unwrap().status, JobStatus::Running);
}

#[test]
fn a_pending_job_is_never_reaped_regardless_of_age() {
    let dir = tempdir().unwrap();
    let clock = FakeClock::new();
    let manager = Arc::new(
        JobManager::open(&dir.path().join("jobs.wal"), EventBus::new(), clock.clone()).unwrap(),
    );

    let job = QueueJob::builder().job_type("work").build();
    manager.create(job.clone()).unwrap();

    clock.advance(Duration::from_secs(3600));

    let reaper = StaleReaper::new(manager.clone()).with_threshold(Duration::from_secs(5));
    assert!(reaper.sweep().is_empty());
}

#[tokio::test]
async fn the_sweep_loop_reaps_within_the_configured_interval() {
    let dir = tempdir().unwrap();
    let clock = FakeClock::new();
    let manager = Arc::new(
        JobManager::open(&dir.path().join("jobs.wal"), EventBus::new(), clock.clone()).unwrap(),
    );

    let job = QueueJob::builder().job_type("work").build();
    manager.create(job.clone()).unwrap();
    manager.start(job.id).unwrap();
    clock.advance(Duration::from_secs(10));

    let reaper = StaleReaper::new(manager.clone())
        .with_threshold(Duration::from_secs(5))
        .with_reap_interval(Duration::from_millis(10));
    let shutdown = CancellationToken::new();
    let shutdown_clone = shutdown.clone();
    let handle = tokio::spawn(reaper.run(shutdown_clone));

    tokio::time::sleep(Duration::from_millis(100)).await;
    shutdown.cancel();
    let _ = handle.await;

    assert_eq!(manager.get(&job.id).unwrap().status, JobStatus::Failed);
}
