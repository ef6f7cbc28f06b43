// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Notifications published on the [`EventBus`](crate::event::Event) — ephemeral,
//! at-most-once, non-blocking. Distinct from durable records in storage:
//! losing an event under back-pressure never loses state, only a progress
//! notification.

use crate::job::{JobStatus, Progress};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Topic-keyed event delivered to subscribers.
///
/// `#[serde(tag = "type")]` keeps the wire representation self-describing
/// for the `Subscribe` transport (spec §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    JobCreated {
        job_id: String,
        parent_id: Option<String>,
        definition_id: Option<String>,
        job_type: String,
        epoch_ms: u64,
    },
    JobStarted {
        job_id: String,
        epoch_ms: u64,
    },
    JobHeartbeat {
        job_id: String,
        epoch_ms: u64,
    },
    JobProgress {
        job_id: String,
        progress: Progress,
        epoch_ms: u64,
    },
    JobStatusChanged {
        job_id: String,
        status: JobStatus,
        epoch_ms: u64,
    },
    JobCompleted {
        job_id: String,
        result_count: u64,
        epoch_ms: u64,
    },
    JobFailed {
        job_id: String,
        error: String,
        epoch_ms: u64,
    },
    JobCancelled {
        job_id: String,
        epoch_ms: u64,
    },
    JobDeleted {
        job_id: String,
        epoch_ms: u64,
    },
    DefinitionLoaded {
        definition_id: String,
        epoch_ms: u64,
    },
    KvChanged {
        key: String,
        epoch_ms: u64,
    },
    PlaceholderUnresolved {
        job_id: String,
        key: String,
        epoch_ms: u64,
    },
    ScheduleFired {
        definition_id: String,
        epoch_ms: u64,
    },
    JobStale {
        job_id: String,
        last_heartbeat_ms: Option<u64>,
        epoch_ms: u64,
    },
}

impl Event {
    /// Topic a subscriber filters on: `"job:<id>"` for a specific job tree,
    /// or `"definition:<id>"` for schedule/definition-scoped events.
    pub fn topic(&self) -> String {
        match self {
            Event::JobCreated { job_id, .. }
            | Event::JobStarted { job_id, .. }
            | Event::JobHeartbeat { job_id, .. }
            | Event::JobProgress { job_id, .. }
            | Event::JobStatusChanged { job_id, .. }
            | Event::JobCompleted { job_id, .. }
            | Event::JobFailed { job_id, .. }
            | Event::JobCancelled { job_id, .. }
            | Event::JobDeleted { job_id, .. }
            | Event::PlaceholderUnresolved { job_id, .. }
            | Event::JobStale { job_id, .. } => format!("job:{job_id}"),
            Event::DefinitionLoaded { definition_id, .. }
            | Event::ScheduleFired { definition_id, .. } => format!("definition:{definition_id}"),
            Event::KvChanged { key, .. } => format!("kv:{key}"),
        }
    }

    /// Structured key-value fields for log correlation in `tracing` spans.
    pub fn fields(&self) -> HashMap<&'static str, String> {
        let mut fields = HashMap::new();
        fields.insert("topic", self.topic());
        fields
    }

    /// Severity used by `Subscribe`'s `min_level` filter. Events have no
    /// independent level of their own; this assigns one by what happened.
    pub fn level(&self) -> crate::log::LogLevel {
        use crate::log::LogLevel;
        match self {
            Event::JobFailed { .. } | Event::JobStale { .. } => LogLevel::Error,
            Event::PlaceholderUnresolved { .. } => LogLevel::Warn,
            _ => LogLevel::Info,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_events_topic_by_job_id() {
        let event = Event::JobStarted {
            job_id: "abc".to_string(),
            epoch_ms: 1,
        };
        assert_eq!(event.topic(), "job:abc");
    }

    #[test]
    fn definition_events_topic_by_definition_id() {
        let event = Event::ScheduleFired {
            definition_id: "def-1".to_string(),
            epoch_ms: 1,
        };
        assert_eq!(event.topic(), "definition:def-1");
    }

    #[test]
    fn serializes_with_type_tag() {
        let event = Event::JobCompleted {
            job_id: "abc".to_string(),
            result_count: 3,
            epoch_ms: 1,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "job_completed");
    }
}
