// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `StaleReaper` periodically fails any `running` job whose heartbeat has
//! gone quiet for longer than `threshold`, so a worker that died mid-job
//! doesn't leave the tree stuck (spec §4.9, invariant 5).

use crate::job_manager::JobManager;
use jw_core::{Clock, JobStatus};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::warn;

const DEFAULT_THRESHOLD: Duration = Duration::from_secs(15 * 60);
const DEFAULT_REAP_INTERVAL: Duration = Duration::from_secs(5 * 60);

pub struct StaleReaper<C: Clock> {
    manager: Arc<JobManager<C>>,
    threshold: Duration,
    reap_interval: Duration,
}

impl<C: Clock> StaleReaper<C> {
    pub fn new(manager: Arc<JobManager<C>>) -> Self {
        Self { manager, threshold: DEFAULT_THRESHOLD, reap_interval: DEFAULT_REAP_INTERVAL }
    }

    pub fn with_threshold(mut self, threshold: Duration) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_reap_interval(mut self, reap_interval: Duration) -> Self {
        self.reap_interval = reap_interval;
        self
    }

    /// Fail every job stale by `threshold`. Returns the ids reaped, for
    /// tests and logging.
    pub fn sweep(&self) -> Vec<jw_core::JobId> {
        let stale = self.manager.stale_jobs(self.threshold.as_millis() as u64);
        let mut reaped = Vec::with_capacity(stale.len());
        for job in stale {
            let message = format!("Timeout: no heartbeat for at least {:?}", self.threshold);
            if let Err(e) = self.manager.finish(job.id, JobStatus::Failed, 0, 1, Some(message)) {
                warn!(job_id = %job.id, error = %e, "failed to reap stale job");
                continue;
            }
            reaped.push(job.id);
        }
        reaped
    }

    /// Run the sweep loop until `shutdown` is cancelled.
    pub async fn run(self, shutdown: CancellationToken) {
        let mut interval = tokio::time::interval(self.reap_interval);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => return,
                _ = interval.tick() => {
                    self.sweep();
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "stale_reaper_tests.rs"]
mod tests;
