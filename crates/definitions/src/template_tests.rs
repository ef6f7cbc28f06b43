// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[test]
fn resolves_a_known_key() {
    let result = interpolate("hello {name}", &vars(&[("name", "world")]));
    assert_eq!(result.text, "hello world");
    assert!(result.unresolved.is_empty());
}

#[test]
fn leaves_unknown_keys_unchanged_and_records_them() {
    let result = interpolate("hello {missing}", &vars(&[]));
    assert_eq!(result.text, "hello {missing}");
    assert_eq!(result.unresolved, vec!["missing".to_string()]);
}

#[test]
fn resolves_namespaced_keys() {
    let result = interpolate("{parent.region}", &vars(&[("parent.region", "us-east")]));
    assert_eq!(result.text, "us-east");
    assert!(result.unresolved.is_empty());
}

#[test]
fn resolves_multiple_placeholders_in_one_string() {
    let result = interpolate(
        "{greeting}, {name}!",
        &vars(&[("greeting", "hi"), ("name", "ada")]),
    );
    assert_eq!(result.text, "hi, ada!");
}

#[test]
fn dollar_brace_is_not_a_placeholder() {
    let result = interpolate("${not_a_placeholder}", &vars(&[("not_a_placeholder", "x")]));
    assert_eq!(result.text, "${not_a_placeholder}");
}

#[test]
fn interpolate_config_merges_unresolved_across_entries() {
    let config = HashMap::from([
        ("a".to_string(), "{known}".to_string()),
        ("b".to_string(), "{unknown}".to_string()),
    ]);
    let (resolved, unresolved) = interpolate_config(&config, &vars(&[("known", "v")]));
    assert_eq!(resolved.get("a"), Some(&"v".to_string()));
    assert_eq!(resolved.get("b"), Some(&"{unknown}".to_string()));
    assert_eq!(unresolved, vec!["unknown".to_string()]);
}
