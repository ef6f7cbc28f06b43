// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `{key}` placeholder interpolation against KV storage.

use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;

/// Matches `{key}` and `{namespace.key}`; does not match `{{literal}}` style
/// escaping since the wire format has no such convention.
#[allow(clippy::expect_used)]
static PLACEHOLDER_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{([a-zA-Z_][a-zA-Z0-9_]*(?:\.[a-zA-Z_][a-zA-Z0-9_-]*)*)\}")
        .expect("constant regex pattern is valid")
});

/// Result of interpolating a single string: the substituted text plus the
/// keys that had no entry in `vars` (left unchanged in `text`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interpolated {
    pub text: String,
    pub unresolved: Vec<String>,
}

/// Substitute `{key}` occurrences in `template` with values from `vars`.
/// Unknown keys are left unchanged and collected into `unresolved`.
pub fn interpolate(template: &str, vars: &HashMap<String, String>) -> Interpolated {
    let mut unresolved = Vec::new();
    let text = PLACEHOLDER_PATTERN
        .replace_all(template, |caps: &regex::Captures| {
            let name = &caps[1];
            match vars.get(name) {
                Some(val) => val.clone(),
                None => {
                    unresolved.push(name.to_string());
                    caps[0].to_string()
                }
            }
        })
        .to_string();
    Interpolated { text, unresolved }
}

/// Interpolate every value in `config` against `vars`, returning the
/// resolved map plus the union of unresolved keys across all entries.
pub fn interpolate_config(
    config: &HashMap<String, String>,
    vars: &HashMap<String, String>,
) -> (HashMap<String, String>, Vec<String>) {
    let mut resolved = HashMap::with_capacity(config.len());
    let mut unresolved = Vec::new();
    for (k, v) in config {
        let result = interpolate(v, vars);
        unresolved.extend(result.unresolved);
        resolved.insert(k.clone(), result.text);
    }
    (resolved, unresolved)
}

#[cfg(test)]
#[path = "template_tests.rs"]
mod tests;
