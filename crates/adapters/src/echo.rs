// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The `echo` worker pair: a `StepWorker` that fans a step's `n` config
//! value out into `n` leaf jobs, and the `JobWorker` that completes each
//! one instantly. Used by the end-to-end scenario where a two-step
//! definition (`a` with `n=3`, `b` depending on `a` with `n=2`) produces a
//! tree whose parent `result_count` sums to 5.

use async_trait::async_trait;
use jw_core::{EngineError, JobId, QueueJobSpec, StepContext, StepWorker, WorkerOutcome};
use std::collections::HashMap;

pub struct EchoStepWorker;

#[async_trait]
impl StepWorker for EchoStepWorker {
    fn step_type(&self) -> &str {
        "echo"
    }

    async fn create_jobs(&self, ctx: &StepContext) -> Result<Vec<QueueJobSpec>, EngineError> {
        let n: usize = ctx
            .config
            .get("n")
            .map(|s| s.parse())
            .transpose()
            .map_err(|_| EngineError::InvalidType(format!("echo step '{}': 'n' is not an integer", ctx.step_name)))?
            .unwrap_or(1);

        Ok((0..n)
            .map(|i| QueueJobSpec::new(format!("{}-{i}", ctx.step_name), "echo").with_config(ctx.config.clone()))
            .collect())
    }
}

pub struct EchoJobWorker;

#[async_trait]
impl jw_core::JobWorker for EchoJobWorker {
    fn job_type(&self) -> &str {
        "echo"
    }

    fn validate(&self, _config: &HashMap<String, String>) -> Result<(), EngineError> {
        Ok(())
    }

    async fn execute(&self, _job_id: JobId, _config: &HashMap<String, String>) -> WorkerOutcome {
        WorkerOutcome::Ok(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(n: &str) -> StepContext {
        let mut config = HashMap::new();
        config.insert("n".to_string(), n.to_string());
        StepContext {
            parent_id: JobId::new(),
            definition_id: "d1".to_string(),
            step_name: "fetch".to_string(),
            config,
            depth: 1,
        }
    }

    #[tokio::test]
    async fn materializes_n_leaf_jobs_named_after_the_step() {
        let worker = EchoStepWorker;
        let specs = worker.create_jobs(&ctx("3")).await.unwrap();
        assert_eq!(specs.len(), 3);
        assert_eq!(specs[0].name, "fetch-0");
        assert!(specs.iter().all(|s| s.job_type == "echo"));
    }

    #[tokio::test]
    async fn an_absent_n_defaults_to_a_single_job() {
        let worker = EchoStepWorker;
        let ctx = StepContext {
            parent_id: JobId::new(),
            definition_id: "d1".to_string(),
            step_name: "solo".to_string(),
            config: HashMap::new(),
            depth: 1,
        };
        let specs = worker.create_jobs(&ctx).await.unwrap();
        assert_eq!(specs.len(), 1);
    }

    #[tokio::test]
    async fn a_non_integer_n_is_a_dispatch_error() {
        let worker = EchoStepWorker;
        let err = worker.create_jobs(&ctx("not-a-number")).await.unwrap_err();
        assert!(matches!(err, EngineError::InvalidType(_)));
    }

    #[tokio::test]
    async fn each_leaf_completes_instantly_with_one_result() {
        let worker = EchoJobWorker;
        let outcome = worker.execute(JobId::new(), &HashMap::new()).await;
        assert!(matches!(outcome, WorkerOutcome::Ok(1)));
    }
}
