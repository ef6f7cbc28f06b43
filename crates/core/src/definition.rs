// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job definition types: the user-authored DAG template.
//!
//! Parsing the wire format (TOML/HCL) lives in the `jw-definitions` crate;
//! this module only defines the shape.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Policy for how many child failures a parent tolerates before acting,
/// and what to do once the threshold is crossed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureAction {
    StopAll,
    Continue,
    MarkWarning,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorTolerance {
    /// `0` means unlimited (spec §8 boundary behavior: "disabled").
    #[serde(default)]
    pub max_child_failures: u32,
    #[serde(default = "default_failure_action")]
    pub failure_action: FailureAction,
}

fn default_failure_action() -> FailureAction {
    FailureAction::Continue
}

impl Default for ErrorTolerance {
    fn default() -> Self {
        Self {
            max_child_failures: 0,
            failure_action: default_failure_action(),
        }
    }
}

impl ErrorTolerance {
    /// `max_child_failures == 0` disables the threshold entirely.
    pub fn exceeded_by(&self, failed_count: u64) -> bool {
        self.max_child_failures != 0 && failed_count >= self.max_child_failures as u64
    }
}

/// What a step does when one of its own actions (worker execution) errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnError {
    Fail,
    Continue,
}

impl Default for OnError {
    fn default() -> Self {
        OnError::Fail
    }
}

/// One node in the definition DAG.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepSpec {
    /// Unique within the owning definition.
    pub name: String,
    /// Worker registry key matched against `StepWorker::step_type()`.
    #[serde(rename = "type")]
    pub step_type: String,
    /// Names of steps that must fully terminate before this step's
    /// children are enqueued.
    #[serde(default)]
    pub depends: Vec<String>,
    #[serde(default)]
    pub config: HashMap<String, String>,
    #[serde(default)]
    pub on_error: OnError,
    /// Step-level timeout override (seconds); `None` uses the engine default.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

/// A user-authored DAG template, expanded at dispatch time into a tree of
/// [`crate::job::QueueJob`]s.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobDefinition {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Cron expression, e.g. `"*/1 * * * *"`. `None` disables scheduling.
    #[serde(default)]
    pub schedule: Option<String>,
    pub timeout_secs: Option<u64>,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub auto_start: bool,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub error_tolerance: ErrorTolerance,
    #[serde(default)]
    pub config: HashMap<String, String>,
    pub steps: Vec<StepSpec>,
}

fn default_true() -> bool {
    true
}

/// Errors in the DAG shape itself, distinct from parse errors (which live in
/// `jw-definitions`).
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DefinitionError {
    #[error("definition '{0}' has zero steps")]
    NoSteps(String),
    #[error("duplicate step name '{0}'")]
    DuplicateStep(String),
    #[error("step '{0}' depends on unknown step '{1}'")]
    UnknownDependency(String, String),
    #[error("dependency cycle detected among steps: {0:?}")]
    Cycle(Vec<String>),
}

impl JobDefinition {
    /// Topologically sort `steps` by `depends`, validating uniqueness and
    /// detecting cycles. Returns step names in an order where every step
    /// appears after all of its dependencies.
    pub fn topo_sorted_steps(&self) -> Result<Vec<&StepSpec>, DefinitionError> {
        if self.steps.is_empty() {
            return Err(DefinitionError::NoSteps(self.id.clone()));
        }

        let mut by_name = HashMap::with_capacity(self.steps.len());
        for step in &self.steps {
            if by_name.insert(step.name.as_str(), step).is_some() {
                return Err(DefinitionError::DuplicateStep(step.name.clone()));
            }
        }
        for step in &self.steps {
            for dep in &step.depends {
                if !by_name.contains_key(dep.as_str()) {
                    return Err(DefinitionError::UnknownDependency(
                        step.name.clone(),
                        dep.clone(),
                    ));
                }
            }
        }

        // Kahn's algorithm; ties broken by definition order for determinism.
        let mut in_degree: HashMap<&str, usize> = self
            .steps
            .iter()
            .map(|s| (s.name.as_str(), s.depends.len()))
            .collect();
        let mut ready: Vec<&str> = self
            .steps
            .iter()
            .filter(|s| s.depends.is_empty())
            .map(|s| s.name.as_str())
            .collect();
        let mut sorted = Vec::with_capacity(self.steps.len());

        while let Some(name) = ready.first().copied() {
            ready.remove(0);
            sorted.push(by_name[name]);
            for step in &self.steps {
                if step.depends.iter().any(|d| d == name) {
                    let degree = in_degree.get_mut(step.name.as_str()).unwrap();
                    *degree -= 1;
                    if *degree == 0 {
                        ready.push(step.name.as_str());
                    }
                }
            }
        }

        if sorted.len() != self.steps.len() {
            let remaining: Vec<String> = self
                .steps
                .iter()
                .map(|s| s.name.clone())
                .filter(|n| !sorted.iter().any(|s| &s.name == n))
                .collect();
            return Err(DefinitionError::Cycle(remaining));
        }

        Ok(sorted)
    }
}

#[cfg(test)]
#[path = "definition_tests.rs"]
mod tests;
