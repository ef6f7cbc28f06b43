// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use jw_core::LogLevel;

#[test]
fn upserting_a_new_job_indexes_it_under_its_parent() {
    let mut state = MaterializedState::default();
    let parent = QueueJob::builder().name("parent").build();
    let child = QueueJob::builder()
        .name("child")
        .parent_id(Some(parent.id))
        .build();

    state.apply(&JobRecord::JobUpserted { job: parent.clone() });
    state.apply(&JobRecord::JobUpserted { job: child.clone() });

    assert_eq!(state.children_of(&parent.id), &[child.id]);
    assert_eq!(state.get_job(&child.id).unwrap().name, "child");
}

#[test]
fn upserting_an_existing_job_does_not_duplicate_the_child_index() {
    let mut state = MaterializedState::default();
    let parent = QueueJob::builder().name("parent").build();
    let child = QueueJob::builder()
        .name("child")
        .parent_id(Some(parent.id))
        .build();

    state.apply(&JobRecord::JobUpserted { job: parent.clone() });
    state.apply(&JobRecord::JobUpserted { job: child.clone() });
    // Replaying (e.g. a status transition write) must not duplicate the index.
    state.apply(&JobRecord::JobUpserted { job: child.clone() });

    assert_eq!(state.children_of(&parent.id).len(), 1);
}

#[test]
fn deleting_a_job_removes_it_from_its_parents_child_index() {
    let mut state = MaterializedState::default();
    let parent = QueueJob::builder().name("parent").build();
    let child = QueueJob::builder()
        .name("child")
        .parent_id(Some(parent.id))
        .build();

    state.apply(&JobRecord::JobUpserted { job: parent.clone() });
    state.apply(&JobRecord::JobUpserted { job: child.clone() });
    state.apply(&JobRecord::JobDeleted { job_id: child.id });

    assert!(state.children_of(&parent.id).is_empty());
    assert!(state.get_job(&child.id).is_none());
}

#[test]
fn log_entries_accumulate_per_job() {
    let mut state = MaterializedState::default();
    let job = QueueJob::builder().build();
    let entry = LogEntry::builder()
        .level(LogLevel::Warn)
        .message("retrying")
        .build();
    let mut entry = entry;
    entry.job_id = job.id;

    state.apply(&JobRecord::LogAppended { entry: entry.clone() });
    state.apply(&JobRecord::LogAppended { entry });

    assert_eq!(state.logs.get(&job.id).unwrap().len(), 2);
}

#[test]
fn kv_set_then_delete_round_trips() {
    let mut state = MaterializedState::default();
    let entry = KvEntry::builder().key("region").value("us-east-1").build();

    state.apply(&JobRecord::KvSet { entry: entry.clone() });
    assert_eq!(state.kv.get("region").unwrap().value, "us-east-1");

    state.apply(&JobRecord::KvDeleted { key: "region".to_string() });
    assert!(state.kv.get("region").is_none());
}
