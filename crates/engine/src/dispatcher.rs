// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `JobDispatcher` expands a [`JobDefinition`] into a live parent job with
//! its step children, enqueueing each child into the durable queue with the
//! correct parent linkage.

use crate::job_manager::JobManager;
use crate::queue::DurableQueue;
use crate::step_manager::StepManager;
use jw_core::{Clock, EngineError, JobDefinition, JobId, JobStatus, Progress, QueueJob, StepContext};
use jw_definitions::template::interpolate_config;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// How often the dispatcher polls for a step's predecessors to finish
/// before enqueueing its own children (spec §4.7, option (a)).
const DEFAULT_STEP_POLL_INTERVAL: Duration = Duration::from_millis(50);

pub struct JobDispatcher<C: Clock> {
    manager: Arc<JobManager<C>>,
    queue: Arc<DurableQueue<C>>,
    steps: Arc<StepManager>,
    clock: C,
    step_poll_interval: Duration,
}

impl<C: Clock> JobDispatcher<C> {
    pub fn new(manager: Arc<JobManager<C>>, queue: Arc<DurableQueue<C>>, steps: Arc<StepManager>, clock: C) -> Self {
        Self::with_poll_interval(manager, queue, steps, clock, DEFAULT_STEP_POLL_INTERVAL)
    }

    pub fn with_poll_interval(
        manager: Arc<JobManager<C>>,
        queue: Arc<DurableQueue<C>>,
        steps: Arc<StepManager>,
        clock: C,
        step_poll_interval: Duration,
    ) -> Self {
        Self { manager, queue, steps, clock, step_poll_interval }
    }

    /// Build a freshly-minted `pending` job with no history yet.
    fn new_job(
        &self,
        name: String,
        job_type: String,
        parent_id: Option<JobId>,
        definition_id: Option<String>,
        step_name: Option<String>,
        config: HashMap<String, String>,
        metadata: HashMap<String, String>,
        depth: u32,
    ) -> QueueJob {
        QueueJob {
            id: JobId::new(),
            parent_id,
            definition_id,
            step_name,
            job_type,
            name,
            config,
            metadata,
            status: JobStatus::Pending,
            progress: Progress::default(),
            error: None,
            result_count: 0,
            failed_count: 0,
            depth,
            created_at_ms: self.clock.epoch_ms(),
            started_at_ms: None,
            completed_at_ms: None,
            finished_at_ms: None,
            last_heartbeat_ms: None,
        }
    }

    /// Expand `def` into a parent job and its step children, honoring
    /// `depends[]` ordering. Returns the parent's id once every child has
    /// been enqueued and the parent has transitioned to `running`.
    ///
    /// `overrides` take precedence over KV storage when resolving `{key}`
    /// placeholders.
    pub async fn execute_definition(
        &self,
        def: &JobDefinition,
        overrides: HashMap<String, String>,
    ) -> Result<JobId, EngineError> {
        let sorted = def
            .topo_sorted_steps()
            .map_err(|e| EngineError::InvalidDefinition(def.id.clone(), e))?;

        let mut vars = self.manager.kv_all();
        vars.extend(overrides);

        let (parent_config, def_unresolved) = interpolate_config(&def.config, &vars);

        let parent = self.new_job(
            def.name.clone(),
            "parent".to_string(),
            None,
            Some(def.id.clone()),
            None,
            parent_config,
            HashMap::new(),
            0,
        );
        self.manager.create(parent.clone())?;

        for key in &def_unresolved {
            self.manager.warn_unresolved_placeholder(parent.id, key);
        }

        let mut enqueued: Vec<JobId> = Vec::new();
        for step in sorted {
            if !step.depends.is_empty() {
                if let Err(e) = self.wait_for_predecessors(parent.id, &step.depends).await {
                    self.rollback(&enqueued, parent.id, &e.to_string())?;
                    return Err(e);
                }
            }

            let (resolved_config, unresolved) = interpolate_config(&step.config, &vars);
            for key in &unresolved {
                self.manager.warn_unresolved_placeholder(parent.id, key);
            }

            let worker = match self.steps.step_worker(&step.step_type) {
                Ok(w) => w,
                Err(e) => {
                    self.rollback(&enqueued, parent.id, &e.to_string())?;
                    return Err(e);
                }
            };

            let ctx = StepContext {
                parent_id: parent.id,
                definition_id: def.id.clone(),
                step_name: step.name.clone(),
                config: resolved_config,
                depth: parent.depth + 1,
            };

            let specs = match worker.create_jobs(&ctx).await {
                Ok(s) => s,
                Err(e) => {
                    self.rollback(&enqueued, parent.id, &e.to_string())?;
                    return Err(e);
                }
            };

            for spec in specs {
                let mut metadata = spec.metadata;
                metadata.insert("step_name".to_string(), step.name.clone());
                metadata.insert("on_error".to_string(), format!("{:?}", step.on_error));
                if let Some(timeout) = step.timeout_secs {
                    metadata.insert("timeout_secs".to_string(), timeout.to_string());
                }

                let child = self.new_job(
                    spec.name,
                    spec.job_type,
                    Some(parent.id),
                    Some(def.id.clone()),
                    Some(step.name.clone()),
                    spec.config,
                    metadata,
                    parent.depth + 1,
                );

                if let Err(e) = self.manager.create(child.clone()) {
                    self.rollback(&enqueued, parent.id, &e.to_string())?;
                    return Err(e);
                }
                if let Err(e) = self.queue.enqueue(child.id) {
                    let err = EngineError::Storage(e.to_string());
                    self.rollback(&enqueued, parent.id, &err.to_string())?;
                    return Err(err);
                }
                enqueued.push(child.id);
            }
        }

        self.manager.start(parent.id)?;
        Ok(parent.id)
    }

    /// Wait until every already-enqueued child of `step_names` reaches a
    /// terminal status, or the parent itself becomes terminal (e.g.
    /// cancelled by a monitor reacting to an earlier step's failures).
    async fn wait_for_predecessors(
        &self,
        parent_id: JobId,
        step_names: &[String],
    ) -> Result<(), EngineError> {
        loop {
            if let Some(parent) = self.manager.get(&parent_id) {
                if parent.status.is_terminal() {
                    return Err(EngineError::Cancelled(parent_id));
                }
            }

            let children = self.manager.children_of(&parent_id);
            let relevant: Vec<&QueueJob> = children
                .iter()
                .filter(|c| {
                    c.step_name
                        .as_deref()
                        .map(|s| step_names.iter().any(|d| d == s))
                        .unwrap_or(false)
                })
                .collect();

            if !relevant.is_empty() && relevant.iter().all(|c| c.status.is_terminal()) {
                return Ok(());
            }

            tokio::time::sleep(self.step_poll_interval).await;
        }
    }

    /// Cancel every child enqueued so far and fail the parent, per the
    /// partial-enqueue rollback rule (spec §4.5).
    fn rollback(&self, enqueued: &[JobId], parent_id: JobId, reason: &str) -> Result<(), EngineError> {
        for &child_id in enqueued {
            let _ = self.manager.cascade_cancel(child_id);
        }
        self.manager.finish(parent_id, JobStatus::Failed, 0, 0, Some(reason.to_string()))
    }
}

#[cfg(test)]
#[path = "dispatcher_tests.rs"]
mod tests;
