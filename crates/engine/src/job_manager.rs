// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `JobManager` is the exclusive writer of [`QueueJob`]/[`LogEntry`]
//! records: every status transition, progress update, and cascade
//! cancel/delete passes through here so the WAL and in-memory state never
//! diverge.

use crate::event_bus::EventBus;
use jw_core::{
    Clock, EngineError, Event, JobDefinition, JobId, JobStatus, KvEntry, LogEntry, Progress,
    QueueJob,
};
use jw_storage::{JobRecord, MaterializedState, Wal, WalError};
use parking_lot::Mutex;
use std::path::Path;

/// Cascade operations stop recursing past this depth; anything deeper is
/// logged and left in place rather than risking unbounded recursion on a
/// malformed tree.
pub const MAX_CASCADE_DEPTH: u32 = 10;

pub struct JobManager<C: Clock> {
    wal: Mutex<Wal<JobRecord>>,
    state: Mutex<MaterializedState>,
    events: EventBus,
    clock: C,
}

impl<C: Clock> JobManager<C> {
    pub fn open(path: &Path, events: EventBus, clock: C) -> Result<Self, WalError> {
        let mut wal: Wal<JobRecord> = Wal::open(path, 0)?;
        let mut state = MaterializedState::default();
        for entry in wal.entries_after(0)? {
            state.apply(&entry.record);
        }
        Ok(Self {
            wal: Mutex::new(wal),
            state: Mutex::new(state),
            events,
            clock,
        })
    }

    pub fn epoch_ms(&self) -> u64 {
        self.clock.epoch_ms()
    }

    pub fn get(&self, job_id: &JobId) -> Option<QueueJob> {
        self.state.lock().get_job(job_id).cloned()
    }

    /// Every job (parent or leaf) created from `definition_id`, most recent
    /// first. Used by the scheduler to detect an already-running instance.
    pub fn jobs_by_definition(&self, definition_id: &str) -> Vec<QueueJob> {
        let mut jobs: Vec<QueueJob> = self
            .state
            .lock()
            .jobs
            .values()
            .filter(|job| job.definition_id.as_deref() == Some(definition_id))
            .cloned()
            .collect();
        jobs.sort_by_key(|job| std::cmp::Reverse(job.created_at_ms));
        jobs
    }

    /// Every `running` job whose heartbeat is older than `threshold_ms`
    /// (spec §4.9, invariant 5). Used by the `StaleReaper` sweep.
    pub fn stale_jobs(&self, threshold_ms: u64) -> Vec<QueueJob> {
        let now = self.clock.epoch_ms();
        self.state
            .lock()
            .jobs
            .values()
            .filter(|job| {
                job.status == JobStatus::Running
                    && job
                        .last_heartbeat_ms
                        .map(|hb| now.saturating_sub(hb) > threshold_ms)
                        .unwrap_or(true)
            })
            .cloned()
            .collect()
    }

    /// All jobs currently tracked, unordered. Used by `ListJobs` callers
    /// that apply their own filter/sort/paginate.
    pub fn all_jobs(&self) -> Vec<QueueJob> {
        self.state.lock().jobs.values().cloned().collect()
    }

    pub fn children_of(&self, parent_id: &JobId) -> Vec<QueueJob> {
        let state = self.state.lock();
        state
            .children_of(parent_id)
            .iter()
            .filter_map(|id| state.get_job(id).cloned())
            .collect()
    }

    /// Insert a freshly expanded job (from the dispatcher or a worker
    /// emitting dynamic children). Rejects a parent reference that does
    /// not exist.
    pub fn create(&self, job: QueueJob) -> Result<(), EngineError> {
        if let Some(parent_id) = job.parent_id {
            if self.state.lock().get_job(&parent_id).is_none() {
                return Err(EngineError::InvalidParent(parent_id));
            }
        }
        let epoch_ms = self.clock.epoch_ms();
        self.write(&JobRecord::JobUpserted { job: job.clone() })
            .map_err(|e| EngineError::Storage(e.to_string()))?;
        self.events.publish(Event::JobCreated {
            job_id: job.id.to_string(),
            parent_id: job.parent_id.map(|p| p.to_string()),
            definition_id: job.definition_id.clone(),
            job_type: job.job_type.clone(),
            epoch_ms,
        });
        Ok(())
    }

    /// Transition `job_id` to `running`, recording `started_at_ms` the
    /// first time only. No-op (not an error) if already running.
    pub fn start(&self, job_id: JobId) -> Result<(), EngineError> {
        let epoch_ms = self.clock.epoch_ms();
        let job = self.update(job_id, |job| {
            if job.status.is_terminal() {
                return Err(EngineError::Terminal(job_id));
            }
            if job.status == JobStatus::Running {
                return Ok(());
            }
            if job.status != JobStatus::Pending {
                return Err(EngineError::NotPending(job_id));
            }
            job.status = JobStatus::Running;
            job.started_at_ms.get_or_insert(epoch_ms);
            job.last_heartbeat_ms = Some(epoch_ms);
            Ok(())
        })?;
        self.events.publish(Event::JobStarted {
            job_id: job.id.to_string(),
            epoch_ms,
        });
        Ok(())
    }

    pub fn heartbeat(&self, job_id: JobId) -> Result<(), EngineError> {
        let epoch_ms = self.clock.epoch_ms();
        self.update(job_id, |job| {
            if job.status.is_terminal() {
                return Err(EngineError::Terminal(job_id));
            }
            job.last_heartbeat_ms = Some(epoch_ms);
            Ok(())
        })?;
        self.events.publish(Event::JobHeartbeat { job_id: job_id.to_string(), epoch_ms });
        Ok(())
    }

    pub fn update_progress(&self, job_id: JobId, progress: Progress) -> Result<(), EngineError> {
        let epoch_ms = self.clock.epoch_ms();
        self.update(job_id, |job| {
            job.progress = progress.clone();
            Ok(())
        })?;
        self.events.publish(Event::JobProgress {
            job_id: job_id.to_string(),
            progress,
            epoch_ms,
        });
        Ok(())
    }

    /// Apply the one allowed terminal transition for `job_id`.
    ///
    /// The first transition into a terminal status wins; once terminal, a
    /// second call is an idempotent no-op rather than an error, so a
    /// retried monitor tick or a racing worker ack can never corrupt state.
    pub fn finish(
        &self,
        job_id: JobId,
        status: JobStatus,
        result_count: u64,
        failed_count: u64,
        error: Option<String>,
    ) -> Result<(), EngineError> {
        debug_assert!(status.is_terminal(), "finish() requires a terminal status");
        let epoch_ms = self.clock.epoch_ms();

        let already_terminal = self
            .state
            .lock()
            .get_job(&job_id)
            .map(|job| job.status.is_terminal())
            .ok_or(EngineError::NotFound(job_id))?;
        if already_terminal {
            return Ok(());
        }

        self.update(job_id, |job| {
            job.status = status;
            job.result_count = result_count;
            job.failed_count = failed_count;
            job.error = error.clone();
            job.finished_at_ms = Some(epoch_ms);
            if status == JobStatus::Completed {
                job.completed_at_ms = Some(epoch_ms);
            }
            Ok(())
        })?;

        let event = match status {
            JobStatus::Completed => Event::JobCompleted { job_id: job_id.to_string(), result_count, epoch_ms },
            JobStatus::Failed => Event::JobFailed {
                job_id: job_id.to_string(),
                error: error.unwrap_or_default(),
                epoch_ms,
            },
            JobStatus::Cancelled => Event::JobCancelled { job_id: job_id.to_string(), epoch_ms },
            JobStatus::Pending | JobStatus::Running => unreachable!("debug_assert above"),
        };
        self.events.publish(event);
        Ok(())
    }

    /// Cancel `job_id` and every descendant, depth-first, best-effort.
    ///
    /// Each failed cancellation is logged and does not stop the sweep —
    /// losing one subtree's cancellation must never block cancelling the
    /// rest of the tree.
    pub fn cascade_cancel(&self, job_id: JobId) -> Result<(), EngineError> {
        self.cascade_cancel_at_depth(job_id, 0)
    }

    fn cascade_cancel_at_depth(&self, job_id: JobId, depth: u32) -> Result<(), EngineError> {
        if depth > MAX_CASCADE_DEPTH {
            self.log(job_id, jw_core::LogLevel::Warn, "cascade cancel stopped: max depth exceeded");
            return Ok(());
        }
        for child in self.children_of(&job_id) {
            if let Err(e) = self.cascade_cancel_at_depth(child.id, depth + 1) {
                self.log(child.id, jw_core::LogLevel::Error, &format!("cascade cancel failed: {e}"));
            }
        }
        self.finish(job_id, JobStatus::Cancelled, 0, 0, None)
    }

    /// Delete `job_id` and every descendant, depth-first, best-effort.
    pub fn cascade_delete(&self, job_id: JobId) -> Result<(), EngineError> {
        self.cascade_delete_at_depth(job_id, 0)
    }

    fn cascade_delete_at_depth(&self, job_id: JobId, depth: u32) -> Result<(), EngineError> {
        if depth > MAX_CASCADE_DEPTH {
            self.log(job_id, jw_core::LogLevel::Warn, "cascade delete stopped: max depth exceeded");
            return Ok(());
        }
        for child in self.children_of(&job_id) {
            if let Err(e) = self.cascade_delete_at_depth(child.id, depth + 1) {
                self.log(child.id, jw_core::LogLevel::Error, &format!("cascade delete failed: {e}"));
            }
        }
        let epoch_ms = self.clock.epoch_ms();
        self.write(&JobRecord::JobDeleted { job_id })
            .map_err(|e| EngineError::Storage(e.to_string()))?;
        self.events.publish(Event::JobDeleted { job_id: job_id.to_string(), epoch_ms });
        Ok(())
    }

    pub fn definition(&self, definition_id: &str) -> Option<JobDefinition> {
        self.state.lock().definitions.get(definition_id).cloned()
    }

    pub fn definitions(&self) -> Vec<JobDefinition> {
        self.state.lock().definitions.values().cloned().collect()
    }

    pub fn upsert_definition(&self, definition: JobDefinition) -> Result<(), EngineError> {
        let epoch_ms = self.clock.epoch_ms();
        let definition_id = definition.id.clone();
        self.write(&JobRecord::DefinitionUpserted { definition })
            .map_err(|e| EngineError::Storage(e.to_string()))?;
        self.events.publish(Event::DefinitionLoaded { definition_id, epoch_ms });
        Ok(())
    }

    pub fn delete_definition(&self, definition_id: &str) -> Result<(), EngineError> {
        self.write(&JobRecord::DefinitionDeleted { definition_id: definition_id.to_string() })
            .map_err(|e| EngineError::Storage(e.to_string()))
    }

    pub fn kv_get(&self, key: &str) -> Option<KvEntry> {
        self.state.lock().kv.get(key).cloned()
    }

    pub fn kv_all(&self) -> std::collections::HashMap<String, String> {
        self.state
            .lock()
            .kv
            .iter()
            .map(|(k, v)| (k.clone(), v.value.clone()))
            .collect()
    }

    pub fn kv_set(&self, entry: KvEntry) -> Result<(), EngineError> {
        let epoch_ms = self.clock.epoch_ms();
        let key = entry.key.clone();
        self.write(&JobRecord::KvSet { entry })
            .map_err(|e| EngineError::Storage(e.to_string()))?;
        self.events.publish(Event::KvChanged { key, epoch_ms });
        Ok(())
    }

    pub fn kv_delete(&self, key: &str) -> Result<(), EngineError> {
        let epoch_ms = self.clock.epoch_ms();
        self.write(&JobRecord::KvDeleted { key: key.to_string() })
            .map_err(|e| EngineError::Storage(e.to_string()))?;
        self.events.publish(Event::KvChanged { key: key.to_string(), epoch_ms });
        Ok(())
    }

    pub fn append_log(&self, entry: LogEntry) -> Result<(), EngineError> {
        self.write(&JobRecord::LogAppended { entry })
            .map_err(|e| EngineError::Storage(e.to_string()))
    }

    /// Set a key in `job_id`'s metadata map (spec §4.7: `mark_warning`
    /// records a warning flag on the parent rather than failing it
    /// outright). Silently a no-op on a terminal job, same as `heartbeat`.
    pub fn set_metadata(&self, job_id: JobId, key: &str, value: &str) -> Result<(), EngineError> {
        let (key, value) = (key.to_string(), value.to_string());
        self.update(job_id, |job| {
            if job.status.is_terminal() {
                return Err(EngineError::Terminal(job_id));
            }
            job.metadata.insert(key.clone(), value.clone());
            Ok(())
        })?;
        Ok(())
    }

    /// Record that `key` had no KV entry at dispatch time. Left unchanged
    /// in the job's config (spec §4.5) but logged and published so the
    /// submitter can notice.
    pub fn warn_unresolved_placeholder(&self, job_id: JobId, key: &str) {
        let epoch_ms = self.clock.epoch_ms();
        self.log(
            job_id,
            jw_core::LogLevel::Warn,
            &format!("unresolved placeholder '{{{key}}}'"),
        );
        self.events.publish(Event::PlaceholderUnresolved {
            job_id: job_id.to_string(),
            key: key.to_string(),
            epoch_ms,
        });
    }

    pub fn logs_of(&self, job_id: &JobId) -> Vec<LogEntry> {
        self.state.lock().logs.get(job_id).cloned().unwrap_or_default()
    }

    fn log(&self, job_id: JobId, level: jw_core::LogLevel, message: &str) {
        let entry = LogEntry {
            job_id,
            ts_ms: self.clock.epoch_ms(),
            level,
            message: message.to_string(),
            fields: Default::default(),
        };
        let _ = self.write(&JobRecord::LogAppended { entry });
    }

    fn update(
        &self,
        job_id: JobId,
        mutate: impl FnOnce(&mut QueueJob) -> Result<(), EngineError>,
    ) -> Result<QueueJob, EngineError> {
        let mut job = self
            .state
            .lock()
            .get_job(&job_id)
            .cloned()
            .ok_or(EngineError::NotFound(job_id))?;
        mutate(&mut job)?;
        if !job.invariants_hold() {
            return Err(EngineError::InvariantViolation(
                job_id,
                "mutation would leave the job in an invalid state".to_string(),
            ));
        }
        self.write(&JobRecord::JobUpserted { job: job.clone() })
            .map_err(|e| EngineError::Storage(e.to_string()))?;
        Ok(job)
    }

    fn write(&self, record: &JobRecord) -> Result<(), WalError> {
        {
            let mut wal = self.wal.lock();
            wal.append(record)?;
            wal.flush()?;
        }
        self.state.lock().apply(record);
        Ok(())
    }
}

#[cfg(test)]
#[path = "job_manager_tests.rs"]
mod tests;
