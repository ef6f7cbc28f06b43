// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `JobProcessor` drains the durable queue with a pool of concurrent worker
//! tasks, each running a single leased job to completion: validate, execute
//! with a heartbeat companion and a cancellation watch, then ack/nack.

use crate::event_bus::EventBus;
use crate::job_manager::JobManager;
use crate::queue::{DurableQueue, Lease};
use crate::step_manager::StepManager;
use jw_core::{Clock, Event, JobId, JobStatus, WorkerOutcome};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

const DEFAULT_CONCURRENCY: usize = 8;
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);
const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30 * 60);
const RETRY_BACKOFF_BASE: Duration = Duration::from_secs(5);
const RETRY_BACKOFF_CAP: Duration = Duration::from_secs(5 * 60);

/// Exponential backoff for a `Nack`, per spec §9 open-question defaults
/// (base 5s, cap 5m).
fn retry_backoff(receive_count: u32) -> Duration {
    let exponent = receive_count.min(6);
    let secs = RETRY_BACKOFF_BASE.as_secs().saturating_mul(1u64 << exponent);
    Duration::from_secs(secs.min(RETRY_BACKOFF_CAP.as_secs()))
}

#[derive(Clone)]
pub struct JobProcessor<C: Clock> {
    manager: Arc<JobManager<C>>,
    queue: Arc<DurableQueue<C>>,
    steps: Arc<StepManager>,
    events: EventBus,
    concurrency: usize,
    poll_interval: Duration,
    heartbeat_interval: Duration,
    default_timeout: Duration,
}

impl<C: Clock> JobProcessor<C> {
    pub fn new(
        manager: Arc<JobManager<C>>,
        queue: Arc<DurableQueue<C>>,
        steps: Arc<StepManager>,
        events: EventBus,
    ) -> Self {
        Self {
            manager,
            queue,
            steps,
            events,
            concurrency: DEFAULT_CONCURRENCY,
            poll_interval: DEFAULT_POLL_INTERVAL,
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            default_timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// Run `concurrency` worker tasks until `shutdown` is cancelled. Each
    /// in-flight job is allowed to finish (or be nacked on shutdown) before
    /// its task exits.
    pub async fn run(self, shutdown: CancellationToken) {
        let mut handles = Vec::with_capacity(self.concurrency);
        for worker_id in 0..self.concurrency {
            let this = self.clone();
            let shutdown = shutdown.clone();
            handles.push(tokio::spawn(this.worker_loop(worker_id, shutdown)));
        }
        for handle in handles {
            let _ = handle.await;
        }
    }

    async fn worker_loop(self, worker_id: usize, shutdown: CancellationToken) {
        loop {
            if shutdown.is_cancelled() {
                return;
            }
            match self.queue.receive() {
                Ok(Some(lease)) => {
                    self.fail_dead_lettered();
                    self.process_one(lease, &shutdown).await;
                }
                Ok(None) => {
                    self.fail_dead_lettered();
                    tokio::select! {
                        _ = shutdown.cancelled() => return,
                        _ = tokio::time::sleep(self.poll_interval) => {}
                    }
                }
                Err(e) => {
                    warn!(worker_id, error = %e, "queue receive failed");
                    tokio::time::sleep(self.poll_interval).await;
                }
            }
        }
    }

    /// Fail every job the queue dead-lettered since the last drain (spec
    /// §4.2, §8): the message is already gone, so there is nothing to ack,
    /// only the job record to transition.
    fn fail_dead_lettered(&self) {
        for job_id in self.queue.take_dead_lettered() {
            let _ = self.manager.finish(
                job_id,
                JobStatus::Failed,
                0,
                1,
                Some("Timeout: exhausted retries after max receive count".to_string()),
            );
        }
    }

    async fn process_one(&self, lease: Lease, shutdown: &CancellationToken) {
        let job_id = lease.job_id;

        let job = match self.manager.get(&job_id) {
            Some(job) => job,
            None => {
                let _ = self.queue.ack(job_id);
                return;
            }
        };
        if job.status.is_terminal() {
            // Stale message: already reached a terminal status some other way.
            let _ = self.queue.ack(job_id);
            return;
        }

        if job.status == JobStatus::Pending {
            if let Err(e) = self.manager.start(job_id) {
                warn!(%job_id, error = %e, "failed to start leased job");
            }
        }

        let worker = match self.steps.job_worker(&job.job_type) {
            Ok(worker) => worker,
            Err(e) => {
                let _ = self
                    .manager
                    .finish(job_id, JobStatus::Failed, 0, 1, Some(format!("NoWorkerRegistered: {e}")));
                let _ = self.queue.ack(job_id);
                return;
            }
        };

        if let Err(e) = worker.validate(&job.config) {
            let _ = self.manager.finish(job_id, JobStatus::Failed, 0, 1, Some(format!("Validation: {e}")));
            let _ = self.queue.ack(job_id);
            return;
        }

        let cancel = CancellationToken::new();
        let cancel_watch = self.spawn_cancel_watch(job_id, cancel.clone());
        let heartbeat_task = self.spawn_heartbeat(job_id, cancel.clone());

        let timeout = job_timeout(&job.metadata, self.default_timeout);
        let outcome = tokio::select! {
            biased;
            _ = shutdown.cancelled() => None,
            _ = cancel.cancelled() => None,
            result = tokio::time::timeout(timeout, worker.execute(job_id, &job.config)) => {
                Some(result.unwrap_or_else(|_| WorkerOutcome::Permanent(format!("Timeout: execution exceeded {timeout:?}"))))
            }
        };

        cancel.cancel();
        cancel_watch.abort();
        heartbeat_task.abort();

        match outcome {
            None => {
                // Shutdown or cascade-cancel: return the message for another
                // worker (or the reaper) to pick up; never ack here.
                let _ = self.queue.nack(job_id, Duration::ZERO);
            }
            Some(WorkerOutcome::Ok(result_count)) => {
                let _ = self.manager.finish(job_id, JobStatus::Completed, result_count, 0, None);
                let _ = self.queue.ack(job_id);
            }
            Some(WorkerOutcome::Retriable(message)) => {
                debug!(%job_id, %message, "retriable failure, nacking");
                let _ = self.queue.nack(job_id, retry_backoff(lease.receive_count));
            }
            Some(WorkerOutcome::Permanent(message)) => {
                let _ = self.manager.finish(job_id, JobStatus::Failed, 0, 1, Some(message));
                let _ = self.queue.ack(job_id);
            }
        }
    }

    /// Watches the event bus for a cancellation of this job (direct cascade
    /// cancel) and trips `cancel` so the select! in `process_one` races the
    /// worker future against it.
    fn spawn_cancel_watch(&self, job_id: JobId, cancel: CancellationToken) -> tokio::task::JoinHandle<()> {
        let mut subscription = self.events.subscribe(Some(format!("job:{job_id}")));
        tokio::spawn(async move {
            while let Some(event) = subscription.recv().await {
                if matches!(event, Event::JobCancelled { .. }) {
                    cancel.cancel();
                    return;
                }
            }
        })
    }

    fn spawn_heartbeat(&self, job_id: JobId, cancel: CancellationToken) -> tokio::task::JoinHandle<()> {
        let manager = Arc::clone(&self.manager);
        let interval = self.heartbeat_interval;
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => return,
                    _ = tokio::time::sleep(interval) => {
                        let _ = manager.heartbeat(job_id);
                    }
                }
            }
        })
    }
}

fn job_timeout(metadata: &std::collections::HashMap<String, String>, default: Duration) -> Duration {
    metadata
        .get("timeout_secs")
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or(default)
}

#[cfg(test)]
#[path = "processor_tests.rs"]
mod tests;
