// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::queue::DurableQueue;
use crate::step_manager::StepManager;
use jw_core::{ErrorTolerance, FakeClock, JobDefinition};
use std::collections::HashMap;
use tempfile::tempdir;

fn definition(id: &str, schedule: Option<&str>, enabled: bool) -> JobDefinition {
    JobDefinition {
        id: id.to_string(),
        name: id.to_string(),
        description: String::new(),
        schedule: schedule.map(|s| s.to_string()),
        timeout_secs: None,
        enabled,
        auto_start: false,
        tags: Vec::new(),
        error_tolerance: ErrorTolerance::default(),
        config: HashMap::new(),
        steps: vec![jw_core::StepSpec {
            name: "only".to_string(),
            step_type: "noop".to_string(),
            depends: Vec::new(),
            config: HashMap::new(),
            on_error: jw_core::OnError::Fail,
            timeout_secs: None,
        }],
    }
}

fn harness(dir: &tempfile::TempDir) -> (Arc<JobManager<FakeClock>>, Arc<JobDispatcher<FakeClock>>, EventBus, FakeClock) {
    let clock = FakeClock::new();
    let events = EventBus::new();
    let manager = Arc::new(JobManager::open(&dir.path().join("jobs.wal"), events.clone(), clock.clone()).unwrap());
    let queue = Arc::new(DurableQueue::open(&dir.path().join("queue.wal"), clock.clone()).unwrap());
    let steps = Arc::new(StepManager::new());
    let dispatcher = Arc::new(JobDispatcher::new(manager.clone(), queue, steps, clock.clone()));
    (manager, dispatcher, events, clock)
}

#[test]
fn a_disabled_definition_never_fires() {
    let dir = tempdir().unwrap();
    let (manager, dispatcher, events, clock) = harness(&dir);
    manager.upsert_definition(definition("d1", Some("* * * * * *"), false)).unwrap();

    let scheduler = Scheduler::new(manager, dispatcher, events, clock.clone());
    let fired = scheduler.tick(clock.epoch_ms());
    assert!(fired.is_empty());
}

#[test]
fn a_definition_with_no_schedule_is_ignored() {
    let dir = tempdir().unwrap();
    let (manager, dispatcher, events, clock) = harness(&dir);
    manager.upsert_definition(definition("d1", None, true)).unwrap();

    let scheduler = Scheduler::new(manager, dispatcher, events, clock.clone());
    let fired = scheduler.tick(clock.epoch_ms());
    assert!(fired.is_empty());
}

#[test]
fn a_due_schedule_fires_once_per_tick() {
    let dir = tempdir().unwrap();
    let (manager, dispatcher, events, clock) = harness(&dir);
    // Fires every second.
    manager.upsert_definition(definition("d1", Some("* * * * * *"), true)).unwrap();

    let scheduler = Scheduler::new(manager, dispatcher, events, clock.clone())
        .with_tick_interval(Duration::from_secs(1))
        .with_cooldown(Duration::from_millis(500));

    let fired = scheduler.tick(clock.epoch_ms());
    assert_eq!(fired, vec!["d1".to_string()]);
}

#[test]
fn cooldown_suppresses_a_second_fire_within_the_window() {
    let dir = tempdir().unwrap();
    let (manager, dispatcher, events, clock) = harness(&dir);
    manager.upsert_definition(definition("d1", Some("* * * * * *"), true)).unwrap();

    let scheduler = Scheduler::new(manager, dispatcher, events, clock.clone())
        .with_tick_interval(Duration::from_secs(1))
        .with_cooldown(Duration::from_secs(60));

    let first = scheduler.tick(clock.epoch_ms());
    assert_eq!(first, vec!["d1".to_string()]);

    clock.advance(Duration::from_millis(500));
    let second = scheduler.tick(clock.epoch_ms());
    assert!(second.is_empty(), "second fire within cooldown should be suppressed");
}

#[test]
fn a_5_field_posix_schedule_is_normalized_and_fires() {
    // Spec §8 scenario 4's literal input: `schedule="*/1 * * * *"`, a bare
    // 5-field (no-seconds) expression, must fire — not be silently skipped
    // because the `cron` crate only accepts 6/7-field expressions.
    let dir = tempdir().unwrap();
    let (manager, dispatcher, events, clock) = harness(&dir);
    manager.upsert_definition(definition("d1", Some("*/1 * * * *"), true)).unwrap();

    let scheduler = Scheduler::new(manager, dispatcher, events, clock.clone())
        .with_tick_interval(Duration::from_secs(60))
        .with_cooldown(Duration::from_millis(500));

    let fired = scheduler.tick(clock.epoch_ms());
    assert_eq!(fired, vec!["d1".to_string()]);
}

#[test]
fn an_invalid_cron_expression_is_skipped_rather_than_panicking() {
    let dir = tempdir().unwrap();
    let (manager, dispatcher, events, clock) = harness(&dir);
    manager.upsert_definition(definition("d1", Some("not a cron expr"), true)).unwrap();

    let scheduler = Scheduler::new(manager, dispatcher, events, clock.clone());
    let fired = scheduler.tick(clock.epoch_ms());
    assert!(fired.is_empty());
}
