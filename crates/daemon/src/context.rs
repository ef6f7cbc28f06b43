// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wires the engine's pieces together from a [`DaemonConfig`]: opens the
//! WALs, registers the built-in workers, loads definitions from disk, and
//! runs the `delete_on_startup` cleanup. The daemon binary owns the
//! listener/processor/scheduler/reaper tasks; this module only builds what
//! they're spawned from.

use crate::config::{DaemonConfig, DeleteCategory};
use fs2::FileExt;
use jw_adapters::{EchoJobWorker, EchoStepWorker, ShellJobWorker};
use jw_core::{EngineError, JobId, SystemClock};
use jw_engine::{DurableQueue, EventBus, JobDispatcher, JobManager, JobMonitor, StepManager};
use jw_storage::WalError;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("creating state directory {0}: {1}")]
    CreateDir(std::path::PathBuf, #[source] std::io::Error),
    #[error("another daemon already holds the lock at {0}")]
    LockHeld(std::path::PathBuf),
    #[error("opening lock file {0}: {1}")]
    LockOpen(std::path::PathBuf, #[source] std::io::Error),
    #[error("opening job log: {0}")]
    JobWal(#[from] WalError),
    #[error("loading definitions from {0}: {1}")]
    Definitions(std::path::PathBuf, #[source] std::io::Error),
}

/// Holds the lock file open for the life of the daemon; dropping it
/// releases the advisory lock so a future startup can acquire it.
pub struct LockGuard {
    file: File,
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}

fn acquire_lock(path: &Path) -> Result<LockGuard, StartupError> {
    let file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)
        .map_err(|e| StartupError::LockOpen(path.to_path_buf(), e))?;
    file.try_lock_exclusive()
        .map_err(|_| StartupError::LockHeld(path.to_path_buf()))?;
    let mut file = file;
    file.set_len(0).map_err(|e| StartupError::LockOpen(path.to_path_buf(), e))?;
    writeln!(file, "{}", std::process::id()).map_err(|e| StartupError::LockOpen(path.to_path_buf(), e))?;
    Ok(LockGuard { file })
}

/// Every engine component assembled from a [`DaemonConfig`], ready for the
/// binary to spawn its background tasks against.
pub struct DaemonContext {
    pub config: DaemonConfig,
    pub manager: Arc<JobManager<SystemClock>>,
    pub queue: Arc<DurableQueue<SystemClock>>,
    pub steps: Arc<StepManager>,
    pub dispatcher: Arc<JobDispatcher<SystemClock>>,
    pub events: EventBus,
    _lock: LockGuard,
}

impl DaemonContext {
    pub fn start(config: DaemonConfig) -> Result<Self, StartupError> {
        std::fs::create_dir_all(&config.state_dir)
            .map_err(|e| StartupError::CreateDir(config.state_dir.clone(), e))?;

        let lock = acquire_lock(&config.lock_path())?;

        let events = EventBus::with_buffer_size(config.eventbus_subscriber_buffer);
        let manager = Arc::new(JobManager::open(&config.jobs_wal_path(), events.clone(), SystemClock)?);
        let queue = Arc::new(DurableQueue::open_with(
            &config.queue_wal_path(),
            SystemClock,
            config.queue_visibility_timeout,
            config.queue_max_receive,
        )?);

        let steps = Arc::new(StepManager::new());
        steps.register_step_worker(Arc::new(EchoStepWorker));
        steps.register_job_worker(Arc::new(EchoJobWorker));
        steps.register_job_worker(Arc::new(ShellJobWorker));

        run_delete_on_startup(&config, &manager, &queue);
        load_definitions(&config, &manager)?;

        let dispatcher = Arc::new(JobDispatcher::new(manager.clone(), queue.clone(), steps.clone(), SystemClock));

        Ok(Self { config, manager, queue, steps, dispatcher, events, _lock: lock })
    }

    /// Expand `definition_id` into a running job tree and spawn the monitor
    /// that rolls its children up to a terminal parent status. Shared by the
    /// `SubmitDefinition` request handler and the scheduler's cron fires.
    pub async fn submit(
        &self,
        definition_id: &str,
        overrides: std::collections::HashMap<String, String>,
    ) -> Result<JobId, EngineError> {
        let def = self
            .manager
            .definition(definition_id)
            .ok_or_else(|| EngineError::DefinitionNotFound(definition_id.to_string()))?;
        let parent_id = self.dispatcher.execute_definition(&def, overrides).await?;
        tokio::spawn(JobMonitor::new(self.manager.clone(), parent_id, def.error_tolerance).run(self.events.clone()));
        Ok(parent_id)
    }
}

/// Process `delete_on_startup` categories in order; each category's
/// failure is logged and does not block the others.
fn run_delete_on_startup(config: &DaemonConfig, manager: &JobManager<SystemClock>, queue: &DurableQueue<SystemClock>) {
    for category in &config.delete_on_startup {
        let result = match category {
            DeleteCategory::Settings => std::fs::remove_dir_all(&config.variables_dir)
                .or_else(|e| if e.kind() == std::io::ErrorKind::NotFound { Ok(()) } else { Err(e) })
                .map_err(|e| e.to_string()),
            DeleteCategory::Jobs => {
                let mut err = None;
                for job in manager.all_jobs() {
                    if job.parent_id.is_none() {
                        if let Err(e) = manager.cascade_delete(job.id) {
                            err = Some(e.to_string());
                        }
                    }
                }
                err.map(Err).unwrap_or(Ok(()))
            }
            DeleteCategory::Queue => {
                let mut err = None;
                while let Ok(Some(lease)) = queue.receive() {
                    if let Err(e) = queue.ack(lease.job_id) {
                        err = Some(e.to_string());
                        break;
                    }
                }
                err.map(Err).unwrap_or(Ok(()))
            }
            DeleteCategory::Documents => std::fs::remove_dir_all(&config.definitions_dir)
                .or_else(|e| if e.kind() == std::io::ErrorKind::NotFound { Ok(()) } else { Err(e) })
                .map_err(|e| e.to_string()),
        };
        if let Err(e) = result {
            warn!(category = ?category, error = %e, "delete_on_startup category failed, continuing");
        } else {
            info!(category = ?category, "delete_on_startup category cleared");
        }
    }
}

/// Parse and upsert every `*.toml`/`*.hcl` definition file under
/// `config.definitions_dir`. A single bad file is logged and skipped
/// rather than aborting startup.
fn load_definitions(config: &DaemonConfig, manager: &JobManager<SystemClock>) -> Result<(), StartupError> {
    if !config.definitions_dir.exists() {
        return Ok(());
    }
    let entries = std::fs::read_dir(&config.definitions_dir)
        .map_err(|e| StartupError::Definitions(config.definitions_dir.clone(), e))?;

    for entry in entries {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                warn!(error = %e, "failed to read definitions directory entry");
                continue;
            }
        };
        let path = entry.path();
        let format = match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => jw_definitions::Format::Toml,
            Some("hcl") => jw_definitions::Format::Hcl,
            _ => continue,
        };
        match std::fs::read_to_string(&path) {
            Ok(content) => match jw_definitions::parse_definition(&content, format) {
                Ok(def) => {
                    if let Err(e) = manager.upsert_definition(def) {
                        warn!(path = %path.display(), error = %e, "failed to load definition");
                    }
                }
                Err(e) => warn!(path = %path.display(), error = %e, "failed to parse definition"),
            },
            Err(e) => warn!(path = %path.display(), error = %e, "failed to read definition file"),
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "context_tests.rs"]
mod tests;
