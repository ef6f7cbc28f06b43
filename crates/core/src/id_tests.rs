// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::str::FromStr;

crate::define_id! {
    /// Test-only id type.
    pub struct TestId;
}

#[test]
fn round_trips_through_display_and_parse() {
    let id = TestId::new();
    let parsed = TestId::from_str(&id.to_string()).unwrap();
    assert_eq!(id, parsed);
}

#[test]
fn serializes_as_plain_string() {
    let id = TestId::new();
    let json = serde_json::to_string(&id).unwrap();
    assert_eq!(json, format!("\"{}\"", id));
    let back: TestId = serde_json::from_str(&json).unwrap();
    assert_eq!(id, back);
}

#[test]
fn distinct_calls_generate_distinct_ids() {
    assert_ne!(TestId::new(), TestId::new());
}

#[test]
fn short_truncates_on_char_boundary() {
    assert_eq!(crate::id::short("hello world", 5), "hello");
    assert_eq!(crate::id::short("hi", 5), "hi");
}
