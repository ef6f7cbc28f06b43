// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Durable per-job log lines, distinct from process-wide `tracing` output.

use crate::job::JobId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

crate::simple_display! {
    LogLevel {
        Debug => "debug",
        Info => "info",
        Warn => "warn",
        Error => "error",
    }
}

/// A single log line attached to a job, written by a worker or the engine
/// itself (transition/monitor bookkeeping).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub job_id: JobId,
    pub ts_ms: u64,
    pub level: LogLevel,
    pub message: String,
    #[serde(default)]
    pub fields: HashMap<String, String>,
}

crate::builder! {
    pub struct LogEntryBuilder => LogEntry {
        into {
            message: String = "test log line",
        }
        set {
            level: LogLevel = LogLevel::Info,
            fields: HashMap<String, String> = HashMap::new(),
        }
        option {}
        computed {
            job_id: JobId = JobId::new(),
            ts_ms: u64 = 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_display_matches_serde_rename() {
        assert_eq!(LogLevel::Warn.to_string(), "warn");
    }

    #[test]
    fn builder_produces_info_level_by_default() {
        let entry = LogEntry::builder().build();
        assert_eq!(entry.level, LogLevel::Info);
        assert_eq!(entry.message, "test log line");
    }
}
