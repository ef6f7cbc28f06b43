// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use async_trait::async_trait;
use jw_core::{JobId, QueueJobSpec, StepContext, WorkerOutcome};
use std::collections::HashMap;

struct EchoStepWorker;

#[async_trait]
impl StepWorker for EchoStepWorker {
    fn step_type(&self) -> &str {
        "echo"
    }

    async fn create_jobs(&self, _ctx: &StepContext) -> Result<Vec<QueueJobSpec>, EngineError> {
        Ok(vec![QueueJobSpec::new("child", "echo")])
    }
}

struct EchoJobWorker;

#[async_trait]
impl JobWorker for EchoJobWorker {
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

#[test]
fn unregistered_step_type_is_an_error() {
    let manager = StepManager::new();
    let err = manager.step_worker("missing").unwrap_err();
    assert!(matches!(err, EngineError::NoWorkerRegistered(_)));
}

#[test]
fn registered_step_worker_is_resolved_by_exact_type() {
    let manager = StepManager::new();
    manager.register_step_worker(Arc::new(EchoStepWorker));

    let worker = manager.step_worker("echo").unwrap();
    assert_eq!(worker.step_type(), "echo");
}

#[tokio::test]
async fn job_worker_executes_through_the_registry() {
    let manager = StepManager::new();
    manager.register_job_worker(Arc::new(EchoJobWorker));

    let worker = manager.job_worker("echo").unwrap();
    let outcome = worker.execute(JobId::new(), &HashMap::new()).await;
    assert!(outcome.is_ok());
}

#[test]
fn alias_routes_to_the_canonical_registration() {
    let manager = StepManager::new();
    manager.register_step_worker(Arc::new(EchoStepWorker));
    manager.alias("noop", "echo").unwrap();

    let worker = manager.step_worker("noop").unwrap();
    assert_eq!(worker.step_type(), "echo");
}

#[test]
fn alias_colliding_with_a_primary_step_type_is_rejected() {
    let manager = StepManager::new();
    manager.register_step_worker(Arc::new(EchoStepWorker));

    let err = manager.alias("echo", "echo").unwrap_err();
    assert!(matches!(err, EngineError::InvalidType(_)));
}
