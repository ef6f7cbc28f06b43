// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Structural validation of a parsed [`JobDefinition`].
//!
//! DAG shape (duplicate names, unknown dependencies, cycles) is validated by
//! [`JobDefinition::topo_sorted_steps`] in `jw-core`; this module adds the
//! wire-level checks that make sense before a definition is registered.

use jw_core::JobDefinition;
use std::collections::HashSet;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("definition id must not be empty")]
    EmptyId,
    #[error("step '{0}' has an empty type")]
    EmptyStepType,
    #[error(transparent)]
    Definition(#[from] jw_core::DefinitionError),
}

/// Validate a definition's DAG shape and required fields.
///
/// Returns the topologically sorted step order on success, so callers that
/// need it (the dispatcher) don't have to sort twice.
pub fn validate_definition(def: &JobDefinition) -> Result<Vec<&jw_core::StepSpec>, ValidationError> {
    if def.id.trim().is_empty() {
        return Err(ValidationError::EmptyId);
    }
    for step in &def.steps {
        if step.step_type.trim().is_empty() {
            return Err(ValidationError::EmptyStepType);
        }
    }
    Ok(def.topo_sorted_steps()?)
}

/// Deterministically sorted names, for stable error messages.
pub fn sorted_names(names: &HashSet<&str>) -> String {
    let mut v: Vec<&str> = names.iter().copied().collect();
    v.sort_unstable();
    v.join(", ")
}

#[cfg(test)]
#[path = "validate_tests.rs"]
mod tests;
