// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use jw_core::{Event, LogEntry, Progress, QueueJob};
use serde::{Deserialize, Serialize};

/// Every message the daemon can send back over `jw_wire`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Response {
    Pong,

    Submitted { parent_job_id: String },
    Cancelled { id: String },
    Deleted { id: String },

    Job { job: Option<QueueJob> },
    Jobs { jobs: Vec<QueueJob> },
    Progress { progress: Option<Progress> },
    Logs { entries: Vec<LogEntry> },
    /// Flattened job tree rooted at the requested job, parents before
    /// children in breadth-first order.
    Tree { nodes: Vec<QueueJob> },

    /// One frame of a `Subscribe` stream. The connection stays open and
    /// keeps emitting these until the client disconnects.
    Event { event: Event },

    Error { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn a_job_response_with_no_match_serializes_a_null_job() {
        let response = Response::Job { job: None };
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["type"], "Job");
        assert!(json["job"].is_null());
    }

    #[test]
    fn an_event_frame_carries_its_inner_event_tag() {
        let response = Response::Event {
            event: Event::JobCompleted { job_id: "j1".to_string(), result_count: 3, epoch_ms: 1 },
        };
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["type"], "Event");
        assert_eq!(json["event"]["type"], "job_completed");
    }

    #[test]
    fn an_error_response_round_trips() {
        let response = Response::Error { message: "no such job".to_string() };
        let json = serde_json::to_string(&response).unwrap();
        let decoded: Response = serde_json::from_str(&json).unwrap();
        match decoded {
            Response::Error { message } => assert_eq!(message, "no such job"),
            other => panic!("unexpected response: {other:?}"),
        }
    }
}
