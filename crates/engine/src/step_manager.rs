// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Registry mapping a step's `type` string to the [`StepWorker`] and
//! [`JobWorker`] that implement it, following the `Arc<dyn Adapter>`
//! registry pattern used throughout the adapters layer.

use jw_core::{EngineError, JobWorker, StepWorker};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Default)]
pub struct StepManager {
    step_workers: RwLock<HashMap<String, Arc<dyn StepWorker>>>,
    job_workers: RwLock<HashMap<String, Arc<dyn JobWorker>>>,
    /// Alternate names routed to an already-registered `step_type`/`job_type`.
    aliases: RwLock<HashMap<String, String>>,
}

impl StepManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_step_worker(&self, worker: Arc<dyn StepWorker>) {
        self.step_workers
            .write()
            .insert(worker.step_type().to_string(), worker);
    }

    pub fn register_job_worker(&self, worker: Arc<dyn JobWorker>) {
        self.job_workers
            .write()
            .insert(worker.job_type().to_string(), worker);
    }

    /// Route `alias` to the worker already registered under `canonical`.
    ///
    /// Fails if `alias` collides with an already-registered primary
    /// `step_type`/`job_type` key (spec §4.4: `StepType()` is unique across
    /// the registry).
    pub fn alias(&self, alias: impl Into<String>, canonical: impl Into<String>) -> Result<(), EngineError> {
        let alias = alias.into();
        if self.step_workers.read().contains_key(&alias) || self.job_workers.read().contains_key(&alias) {
            return Err(EngineError::InvalidType(alias));
        }
        self.aliases.write().insert(alias, canonical.into());
        Ok(())
    }

    fn resolve<'a>(&self, type_name: &'a str) -> String {
        self.aliases
            .read()
            .get(type_name)
            .cloned()
            .unwrap_or_else(|| type_name.to_string())
    }

    pub fn step_worker(&self, step_type: &str) -> Result<Arc<dyn StepWorker>, EngineError> {
        let resolved = self.resolve(step_type);
        self.step_workers
            .read()
            .get(&resolved)
            .cloned()
            .ok_or_else(|| EngineError::NoWorkerRegistered(step_type.to_string()))
    }

    pub fn job_worker(&self, job_type: &str) -> Result<Arc<dyn JobWorker>, EngineError> {
        let resolved = self.resolve(job_type);
        self.job_workers
            .read()
            .get(&resolved)
            .cloned()
            .ok_or_else(|| EngineError::NoWorkerRegistered(job_type.to_string()))
    }
}

#[cfg(test)]
#[path = "step_manager_tests.rs"]
mod tests;
