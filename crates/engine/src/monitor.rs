// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `JobMonitor` computes a parent's rollup progress from its children and
//! applies the definition's error-tolerance policy, exiting once the whole
//! subtree has converged to a terminal status.
//!
//! `StepMonitor`'s responsibility — gating a dependent step's enqueue until
//! its predecessors' children are terminal — is option (a) from spec §4.7
//! and lives in [`crate::dispatcher::JobDispatcher::wait_for_predecessors`]
//! rather than as a separate type.

use crate::event_bus::EventBus;
use crate::job_manager::JobManager;
use jw_core::{Clock, Event, FailureAction, JobId, JobStatus, LogLevel, Progress};
use std::str::FromStr;
use std::sync::Arc;

pub struct JobMonitor<C: Clock> {
    manager: Arc<JobManager<C>>,
    parent_id: JobId,
    error_tolerance: jw_core::ErrorTolerance,
}

impl<C: Clock + Send + Sync + 'static> JobMonitor<C> {
    pub fn new(
        manager: Arc<JobManager<C>>,
        parent_id: JobId,
        error_tolerance: jw_core::ErrorTolerance,
    ) -> Self {
        Self { manager, parent_id, error_tolerance }
    }

    /// Run the rollup loop until the parent reaches a terminal status.
    ///
    /// Reconciles against current storage first (so a monitor respawned
    /// after a restart catches up before subscribing), then drives off the
    /// event bus.
    pub async fn run(self, events: EventBus) {
        if self.tick() {
            return;
        }
        let mut subscription = events.subscribe(None);
        while let Some(event) = subscription.recv().await {
            if self.is_relevant(&event) && self.tick() {
                return;
            }
        }
    }

    fn is_relevant(&self, event: &Event) -> bool {
        let job_id = match event {
            Event::JobCompleted { job_id, .. }
            | Event::JobFailed { job_id, .. }
            | Event::JobCancelled { job_id, .. } => job_id,
            _ => return false,
        };
        JobId::from_str(job_id)
            .ok()
            .and_then(|id| self.manager.get(&id))
            .map(|job| job.parent_id == Some(self.parent_id))
            .unwrap_or(false)
    }

    /// Recompute rollup progress and apply error tolerance / terminal
    /// transition. Returns `true` once the monitor should exit.
    fn tick(&self) -> bool {
        let children = self.manager.children_of(&self.parent_id);
        if children.is_empty() {
            // Spec §8 boundary behavior: a step whose `create_jobs` yields no
            // specs (or a single-step definition shaped that way) leaves the
            // parent with nothing to roll up — it is immediately terminal
            // with zero progress rather than waiting forever for a child
            // event that can never arrive.
            let _ = self.manager.finish(self.parent_id, JobStatus::Completed, 0, 0, None);
            return true;
        }

        let completed_count = children.iter().filter(|c| c.status == JobStatus::Completed).count() as u64;
        let failed_count = children.iter().filter(|c| c.status == JobStatus::Failed).count() as u64;
        let pending = children.iter().filter(|c| !c.status.is_terminal()).count() as u64;
        let total = children.len() as u64;

        // Invariant 6 (spec §3): a parent's result_count/failed_count equal
        // the sum of its children's, not merely how many children reached
        // each terminal status.
        let result_sum: u64 = children
            .iter()
            .filter(|c| c.status == JobStatus::Completed)
            .map(|c| c.result_count)
            .sum();
        let failed_sum: u64 = children
            .iter()
            .filter(|c| c.status == JobStatus::Failed)
            .map(|c| c.failed_count)
            .sum();

        let _ = self.manager.update_progress(
            self.parent_id,
            Progress { completed: completed_count, failed: failed_count, pending, total, current_item: None },
        );

        if self.error_tolerance.exceeded_by(failed_count) {
            match self.error_tolerance.failure_action {
                FailureAction::StopAll => {
                    for child in children.iter().filter(|c| !c.status.is_terminal()) {
                        let _ = self.manager.cascade_cancel(child.id);
                    }
                    let _ = self.manager.finish(
                        self.parent_id,
                        JobStatus::Failed,
                        result_sum,
                        failed_sum,
                        Some("failure_threshold_exceeded".to_string()),
                    );
                    return true;
                }
                FailureAction::Continue => {
                    self.log(LogLevel::Warn, "error tolerance exceeded, continuing");
                }
                FailureAction::MarkWarning => {
                    let _ = self.manager.set_metadata(self.parent_id, "warning", "failure_threshold_exceeded");
                    self.log(LogLevel::Warn, "error tolerance exceeded, marking parent");
                }
            }
        }

        if pending == 0 {
            let status = if failed_count > 0 && self.error_tolerance.failure_action == FailureAction::StopAll {
                JobStatus::Failed
            } else {
                JobStatus::Completed
            };
            let _ = self.manager.finish(self.parent_id, status, result_sum, failed_sum, None);
            return true;
        }

        false
    }

    fn log(&self, level: LogLevel, message: &str) {
        let entry = jw_core::LogEntry {
            job_id: self.parent_id,
            ts_ms: self.manager.epoch_ms(),
            level,
            message: message.to_string(),
            fields: Default::default(),
        };
        let _ = self.manager.append_log(entry);
    }
}

#[cfg(test)]
#[path = "monitor_tests.rs"]
mod tests;
