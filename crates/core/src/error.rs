// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error codes shared across the engine crates.

use crate::job::JobId;

/// Every failure mode the engine can surface, across dispatch, transition,
/// and worker execution.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("job '{0}' not found")]
    NotFound(JobId),

    #[error("parent job '{0}' is not a valid parent for this job")]
    InvalidParent(JobId),

    #[error("job type '{0}' is not registered with any worker")]
    InvalidType(String),

    #[error("job '{0}' is not pending")]
    NotPending(JobId),

    #[error("job '{0}' is already terminal and cannot be transitioned again")]
    Terminal(JobId),

    #[error("invariant violated on job '{0}': {1}")]
    InvariantViolation(JobId, String),

    #[error("invalid definition '{0}': {1}")]
    InvalidDefinition(String, #[source] crate::definition::DefinitionError),

    #[error("definition '{0}' is not known")]
    DefinitionNotFound(String),

    #[error("no worker registered for step type '{0}'")]
    NoWorkerRegistered(String),

    #[error("dependency cycle detected: {0:?}")]
    Cycle(Vec<String>),

    #[error("job '{0}' was cancelled")]
    Cancelled(JobId),

    #[error("job '{0}' timed out after {1:?}")]
    Timeout(JobId, std::time::Duration),

    #[error("unresolved placeholder '{0}'")]
    PlaceholderUnresolved(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("queue is closed")]
    QueueClosed,
}

/// Outcome a [`crate::worker::JobWorker`] reports after executing a leaf job.
///
/// `Retriable` re-enqueues through the durable queue's lease/redelivery path;
/// `Permanent` transitions the job straight to `failed` with no further
/// receive attempts.
#[derive(Debug, Clone)]
pub enum WorkerOutcome {
    /// Carries the number of result units this job produced, persisted as
    /// `QueueJob::result_count` (spec §4.3 `CompleteJob`).
    Ok(u64),
    Retriable(String),
    Permanent(String),
}

impl WorkerOutcome {
    pub fn is_ok(&self) -> bool {
        matches!(self, WorkerOutcome::Ok(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn worker_outcome_ok_reports_ok() {
        assert!(WorkerOutcome::Ok(1).is_ok());
        assert!(!WorkerOutcome::Retriable("boom".into()).is_ok());
        assert!(!WorkerOutcome::Permanent("boom".into()).is_ok());
    }

    #[test]
    fn not_found_error_message_includes_id() {
        let id = JobId::new();
        let err = EngineError::NotFound(id);
        assert!(err.to_string().contains(&id.to_string()));
    }
}
