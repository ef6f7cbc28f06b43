// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use jw_core::{ErrorTolerance, JobDefinition, OnError, StepSpec};
use std::collections::HashMap;

fn step(name: &str, step_type: &str, depends: &[&str]) -> StepSpec {
    StepSpec {
        name: name.to_string(),
        step_type: step_type.to_string(),
        depends: depends.iter().map(|s| s.to_string()).collect(),
        config: HashMap::new(),
        on_error: OnError::Fail,
        timeout_secs: None,
    }
}

fn definition(id: &str, steps: Vec<StepSpec>) -> JobDefinition {
    JobDefinition {
        id: id.to_string(),
        name: id.to_string(),
        description: String::new(),
        schedule: None,
        timeout_secs: None,
        enabled: true,
        auto_start: false,
        tags: Vec::new(),
        error_tolerance: ErrorTolerance::default(),
        config: HashMap::new(),
        steps,
    }
}

#[test]
fn valid_definition_returns_sorted_steps() {
    let def = definition("d1", vec![step("a", "echo", &[]), step("b", "echo", &["a"])]);
    let sorted = validate_definition(&def).unwrap();
    assert_eq!(sorted.iter().map(|s| s.name.as_str()).collect::<Vec<_>>(), vec!["a", "b"]);
}

#[test]
fn empty_id_is_rejected() {
    let def = definition("", vec![step("a", "echo", &[])]);
    assert_eq!(validate_definition(&def).unwrap_err(), ValidationError::EmptyId);
}

#[test]
fn empty_step_type_is_rejected() {
    let def = definition("d1", vec![step("a", "", &[])]);
    assert_eq!(
        validate_definition(&def).unwrap_err(),
        ValidationError::EmptyStepType
    );
}

#[test]
fn dag_errors_propagate_through() {
    let def = definition("d1", vec![step("a", "echo", &["b"])]);
    assert!(matches!(
        validate_definition(&def).unwrap_err(),
        ValidationError::Definition(_)
    ));
}
