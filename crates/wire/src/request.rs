// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use crate::query::Query;
use jw_core::LogLevel;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Every message a client can send to the daemon over `jw_wire`, matching
/// spec §6's Submit/Query/Control/Subscribe contract.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum Request {
    Ping,

    /// Submit a definition for immediate execution, expanding it into a
    /// root job plus its step tree. `overrides` are merged over the
    /// definition's own `config` before placeholder resolution.
    SubmitDefinition {
        definition_id: String,
        #[serde(default)]
        overrides: HashMap<String, String>,
    },

    Query { query: Query },

    CancelJob { id: String },
    DeleteJob { id: String },

    /// Open a long-lived event stream, filtered server-side by `job_id`,
    /// `root_id`, event type, and level (spec §6). `None` on a filter means
    /// "no restriction" for that dimension.
    Subscribe {
        #[serde(default)]
        job_id: Option<String>,
        #[serde(default)]
        root_id: Option<String>,
        #[serde(default)]
        event_type: Option<String>,
        #[serde(default)]
        min_level: Option<LogLevel>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn submit_definition_tags_its_json_with_type() {
        let request = Request::SubmitDefinition {
            definition_id: "d1".to_string(),
            overrides: HashMap::new(),
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["type"], "SubmitDefinition");
        assert_eq!(json["definition_id"], "d1");
    }

    #[test]
    fn a_query_request_nests_the_query_under_its_own_key() {
        let request = Request::Query { query: Query::GetJob { id: "j1".to_string() } };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["type"], "Query");
        assert_eq!(json["query"]["type"], "GetJob");
        assert_eq!(json["query"]["id"], "j1");
    }

    #[test]
    fn omitted_overrides_default_to_empty() {
        let json = serde_json::json!({
            "type": "SubmitDefinition",
            "definition_id": "d1",
        });
        let request: Request = serde_json::from_value(json).unwrap();
        match request {
            Request::SubmitDefinition { overrides, .. } => assert!(overrides.is_empty()),
            other => panic!("unexpected request: {other:?}"),
        }
    }

    #[test]
    fn a_subscribe_request_round_trips() {
        let request = Request::Subscribe {
            job_id: None,
            root_id: Some("root-1".to_string()),
            event_type: None,
            min_level: Some(LogLevel::Warn),
        };
        let json = serde_json::to_string(&request).unwrap();
        let decoded: Request = serde_json::from_str(&json).unwrap();
        assert_eq!(request, decoded);
    }
}
