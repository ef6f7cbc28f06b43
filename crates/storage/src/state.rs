// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Materialized state built by replaying [`crate::record::JobRecord`]s.

use crate::record::JobRecord;
use jw_core::{JobDefinition, JobId, KvEntry, LogEntry, QueueJob};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// In-memory view of every durable job-tree record.
///
/// Held behind a single `parking_lot::Mutex` by `jw-engine`'s `JobManager`
/// so that every mutation writes the WAL record first and applies it here
/// second, keeping both in lockstep.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct MaterializedState {
    pub jobs: HashMap<JobId, QueueJob>,
    /// parent_id → child ids, in creation order.
    #[serde(default)]
    pub children: HashMap<JobId, Vec<JobId>>,
    #[serde(default)]
    pub logs: HashMap<JobId, Vec<LogEntry>>,
    #[serde(default)]
    pub definitions: HashMap<String, JobDefinition>,
    #[serde(default)]
    pub kv: HashMap<String, KvEntry>,
}

impl MaterializedState {
    /// Apply one record. Handlers are idempotent: replaying the same
    /// record twice (as happens when a crash lands between flush and
    /// snapshot) must produce the same state as applying it once.
    pub fn apply(&mut self, record: &JobRecord) {
        match record {
            JobRecord::JobUpserted { job } => {
                let is_new = !self.jobs.contains_key(&job.id);
                if is_new {
                    if let Some(parent_id) = job.parent_id {
                        let siblings = self.children.entry(parent_id).or_default();
                        if !siblings.contains(&job.id) {
                            siblings.push(job.id);
                        }
                    }
                }
                self.jobs.insert(job.id, job.clone());
            }
            JobRecord::JobDeleted { job_id } => {
                if let Some(job) = self.jobs.remove(job_id) {
                    if let Some(parent_id) = job.parent_id {
                        if let Some(siblings) = self.children.get_mut(&parent_id) {
                            siblings.retain(|id| id != job_id);
                        }
                    }
                }
                self.children.remove(job_id);
                self.logs.remove(job_id);
            }
            JobRecord::LogAppended { entry } => {
                self.logs.entry(entry.job_id).or_default().push(entry.clone());
            }
            JobRecord::DefinitionUpserted { definition } => {
                self.definitions.insert(definition.id.clone(), definition.clone());
            }
            JobRecord::DefinitionDeleted { definition_id } => {
                self.definitions.remove(definition_id);
            }
            JobRecord::KvSet { entry } => {
                self.kv.insert(entry.key.clone(), entry.clone());
            }
            JobRecord::KvDeleted { key } => {
                self.kv.remove(key);
            }
        }
    }

    pub fn children_of(&self, parent_id: &JobId) -> &[JobId] {
        self.children.get(parent_id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn get_job(&self, id: &JobId) -> Option<&QueueJob> {
        self.jobs.get(id)
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
