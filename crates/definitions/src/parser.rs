// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wire-format parsing (TOML and HCL) into [`JobDefinition`].
//!
//! A definition file has one `[parent]` block and one or more
//! `[step.<name>]` blocks:
//!
//! ```toml
//! [parent]
//! id = "nightly-report"
//! name = "Nightly Report"
//! schedule = "0 2 * * *"
//!
//! [step.fetch]
//! type = "fetch"
//!
//! [step.render]
//! type = "render"
//! depends = "fetch"
//! ```

use indexmap::IndexMap;
use jw_core::{ErrorTolerance, FailureAction, JobDefinition, OnError, StepSpec};
use serde::de::{self, Deserializer, MapAccess, SeqAccess, Visitor};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::validate::{validate_definition, ValidationError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Toml,
    Hcl,
}

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("HCL parse error: {0}")]
    Hcl(#[from] hcl::Error),
    #[error("invalid definition: {0}")]
    Invalid(#[from] ValidationError),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct RawParent {
    id: String,
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    schedule: Option<String>,
    #[serde(default)]
    timeout_secs: Option<u64>,
    #[serde(default = "default_true")]
    enabled: bool,
    #[serde(default)]
    auto_start: bool,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    max_child_failures: u32,
    #[serde(default = "default_failure_action")]
    failure_action: FailureAction,
    #[serde(default)]
    config: HashMap<String, String>,
}

fn default_true() -> bool {
    true
}

fn default_failure_action() -> FailureAction {
    FailureAction::Continue
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct RawStep {
    #[serde(default)]
    name: String,
    #[serde(rename = "type")]
    step_type: String,
    /// Comma-separated predecessor names, e.g. `"a,b"`.
    #[serde(default)]
    depends: String,
    #[serde(default)]
    config: HashMap<String, String>,
    #[serde(default)]
    on_error: OnError,
    #[serde(default)]
    timeout_secs: Option<u64>,
}

impl RawStep {
    fn depends_list(&self) -> Vec<String> {
        self.depends
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }
}

#[derive(Debug, Clone, Deserialize)]
struct RawDefinitionFile {
    parent: RawParent,
    #[serde(default, alias = "steps", deserialize_with = "deserialize_steps")]
    step: Vec<RawStep>,
}

/// Deserialize steps from either a sequence (an array of tables) or a map
/// (`[step.<name>]` TOML tables, or HCL labeled blocks).
fn deserialize_steps<'de, D>(deserializer: D) -> Result<Vec<RawStep>, D::Error>
where
    D: Deserializer<'de>,
{
    struct StepsVisitor;

    impl<'de> Visitor<'de> for StepsVisitor {
        type Value = Vec<RawStep>;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a sequence of steps or a map of named step blocks")
        }

        fn visit_seq<S>(self, seq: S) -> Result<Vec<RawStep>, S::Error>
        where
            S: SeqAccess<'de>,
        {
            Vec::deserialize(de::value::SeqAccessDeserializer::new(seq))
        }

        fn visit_map<M>(self, map: M) -> Result<Vec<RawStep>, M::Error>
        where
            M: MapAccess<'de>,
        {
            let index_map: IndexMap<String, RawStep> =
                IndexMap::deserialize(de::value::MapAccessDeserializer::new(map))?;
            Ok(index_map
                .into_iter()
                .map(|(key, mut step)| {
                    if step.name.is_empty() {
                        step.name = key;
                    }
                    step
                })
                .collect())
        }
    }

    deserializer.deserialize_any(StepsVisitor)
}

/// Parse a definition from `content` in the given wire `format`, validating
/// its DAG shape before returning it.
pub fn parse_definition(content: &str, format: Format) -> Result<JobDefinition, ParseError> {
    let raw: RawDefinitionFile = match format {
        Format::Toml => toml::from_str(content)?,
        Format::Hcl => hcl::from_str(content)?,
    };

    let def = JobDefinition {
        id: raw.parent.id,
        name: raw.parent.name,
        description: raw.parent.description,
        schedule: raw.parent.schedule,
        timeout_secs: raw.parent.timeout_secs,
        enabled: raw.parent.enabled,
        auto_start: raw.parent.auto_start,
        tags: raw.parent.tags,
        error_tolerance: ErrorTolerance {
            max_child_failures: raw.parent.max_child_failures,
            failure_action: raw.parent.failure_action,
        },
        config: raw.parent.config,
        steps: raw
            .step
            .iter()
            .map(|s| StepSpec {
                name: s.name.clone(),
                step_type: s.step_type.clone(),
                depends: s.depends_list(),
                config: s.config.clone(),
                on_error: s.on_error,
                timeout_secs: s.timeout_secs,
            })
            .collect(),
    };

    validate_definition(&def)?;
    Ok(def)
}

#[cfg(test)]
#[path = "parser_tests.rs"]
mod tests;
