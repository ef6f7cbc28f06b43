// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker traits: the seam between the engine and domain-specific step
//! logic (registered by `jw-adapters`, looked up by `jw-engine`'s
//! `StepManager`/`JobProcessor`).

use crate::error::{EngineError, WorkerOutcome};
use crate::job::JobId;
use async_trait::async_trait;
use std::collections::HashMap;

/// Inputs a [`StepWorker`] needs to expand a step into queue jobs.
#[derive(Debug, Clone)]
pub struct StepContext {
    pub parent_id: JobId,
    pub definition_id: String,
    pub step_name: String,
    pub config: HashMap<String, String>,
    pub depth: u32,
}

/// A queue job not yet assigned an id, name, or creation timestamp —
/// produced by [`StepWorker::create_jobs`] and turned into real
/// [`crate::job::QueueJob`]s by the dispatcher.
#[derive(Debug, Clone)]
pub struct QueueJobSpec {
    pub name: String,
    pub job_type: String,
    pub config: HashMap<String, String>,
    pub metadata: HashMap<String, String>,
}

impl QueueJobSpec {
    pub fn new(name: impl Into<String>, job_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            job_type: job_type.into(),
            config: HashMap::new(),
            metadata: HashMap::new(),
        }
    }

    pub fn with_config(mut self, config: HashMap<String, String>) -> Self {
        self.config = config;
        self
    }
}

/// Expands one DAG step into zero or more child [`QueueJobSpec`]s.
///
/// Registered by `step_type` in `StepManager`; the dispatcher calls
/// `create_jobs` once per step, in topological order, after all of the
/// step's `depends` have terminated.
#[async_trait]
pub trait StepWorker: Send + Sync {
    fn step_type(&self) -> &str;

    async fn create_jobs(&self, ctx: &StepContext) -> Result<Vec<QueueJobSpec>, EngineError>;
}

/// Executes one leaf [`crate::job::QueueJob`].
///
/// `validate` runs before the job is transitioned to `running`, so a
/// malformed config fails fast without ever touching the queue's lease
/// bookkeeping. `execute` does the actual work and reports a
/// [`WorkerOutcome`] that the `JobProcessor` uses to decide ack/nack.
#[async_trait]
pub trait JobWorker: Send + Sync {
    fn job_type(&self) -> &str;

    fn validate(&self, config: &HashMap<String, String>) -> Result<(), EngineError>;

    async fn execute(&self, job_id: JobId, config: &HashMap<String, String>) -> WorkerOutcome;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_job_spec_builder_starts_empty() {
        let spec = QueueJobSpec::new("child", "echo");
        assert_eq!(spec.name, "child");
        assert_eq!(spec.job_type, "echo");
        assert!(spec.config.is_empty());
    }
}
