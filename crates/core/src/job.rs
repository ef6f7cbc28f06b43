// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Queue job identifier, status, and progress tracking.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

crate::define_id! {
    /// Unique identifier for a queue job instance.
    pub struct JobId;
}

/// Canonical status alphabet shared by every job in the tree.
///
/// `Pending` may transition to `Running` or skip straight to `Cancelled`.
/// `Completed`, `Failed`, and `Cancelled` are terminal: once reached, no
/// further status write is accepted (see [`crate::error::EngineError::Terminal`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }
}

crate::simple_display! {
    JobStatus {
        Pending => "pending",
        Running => "running",
        Completed => "completed",
        Failed => "failed",
        Cancelled => "cancelled",
    }
}

/// Rollup progress counters for a job (leaf jobs report their own work;
/// parent jobs mirror the sum of their children, written by the monitor).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    pub completed: u64,
    pub failed: u64,
    pub pending: u64,
    pub total: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_item: Option<String>,
}

impl Progress {
    /// Invariant 4 (spec §3): `total >= completed + failed + pending`.
    pub fn is_consistent(&self) -> bool {
        self.total >= self.completed + self.failed + self.pending
    }
}

/// A runnable instance of work, expanded either from a [`crate::definition::StepSpec`]
/// by the dispatcher, or emitted dynamically by a running worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueJob {
    pub id: JobId,
    pub parent_id: Option<JobId>,
    pub definition_id: Option<String>,
    pub step_name: Option<String>,
    /// Worker registry key (matches a `StepWorker`/`JobWorker`'s `step_type()`).
    #[serde(rename = "type")]
    pub job_type: String,
    pub name: String,
    /// Flattened, placeholder-resolved configuration for this job.
    pub config: HashMap<String, String>,
    pub metadata: HashMap<String, String>,
    pub status: JobStatus,
    pub progress: Progress,
    pub error: Option<String>,
    pub result_count: u64,
    pub failed_count: u64,
    /// Depth in the job tree; the root parent is depth 0.
    pub depth: u32,
    pub created_at_ms: u64,
    pub started_at_ms: Option<u64>,
    pub completed_at_ms: Option<u64>,
    pub finished_at_ms: Option<u64>,
    pub last_heartbeat_ms: Option<u64>,
}

impl QueueJob {
    /// Invariant 3 (spec §3): `finished_at` set iff terminal; `started_at`
    /// set iff status has ever been `running`. `Cancelled` is exempt from
    /// the latter since a job can be cascade-cancelled straight out of
    /// `pending`, before any worker ever leased it.
    pub fn invariants_hold(&self) -> bool {
        let finished_matches_terminal =
            self.finished_at_ms.is_some() == self.status.is_terminal();
        let started_implies_not_pending = self.started_at_ms.is_some()
            || matches!(self.status, JobStatus::Pending | JobStatus::Cancelled);
        finished_matches_terminal && started_implies_not_pending && self.progress.is_consistent()
    }
}

crate::builder! {
    pub struct QueueJobBuilder => QueueJob {
        into {
            name: String = "test-job",
            job_type: String = "echo",
        }
        set {
            parent_id: Option<JobId> = None,
            definition_id: Option<String> = None,
            step_name: Option<String> = None,
            config: HashMap<String, String> = HashMap::new(),
            metadata: HashMap<String, String> = HashMap::new(),
            status: JobStatus = JobStatus::Pending,
            progress: Progress = Progress::default(),
            result_count: u64 = 0,
            failed_count: u64 = 0,
            depth: u32 = 0,
            started_at_ms: Option<u64> = None,
            completed_at_ms: Option<u64> = None,
            finished_at_ms: Option<u64> = None,
            last_heartbeat_ms: Option<u64> = None,
        }
        option {
            error: String = None,
        }
        computed {
            id: JobId = JobId::new(),
            created_at_ms: u64 = 0,
        }
    }
}

#[cfg(test)]
#[path = "job_tests.rs"]
mod tests;
