// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use jw_core::{JobStatus, LogLevel};
use serde::{Deserialize, Serialize};

/// Filter for `Query::ListJobs`, matching spec §6's `ListJobs(filter{...})`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct JobFilter {
    #[serde(default)]
    pub status: Option<JobStatus>,
    #[serde(default)]
    pub job_type: Option<String>,
    #[serde(default)]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub since_ms: Option<u64>,
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub offset: Option<usize>,
}

/// Read-only queries against engine state, carried inside `Request::Query`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum Query {
    GetJob { id: String },
    ListJobs { filter: JobFilter },
    GetProgress { id: String },
    GetLogs {
        id: String,
        #[serde(default)]
        since_ms: Option<u64>,
        #[serde(default)]
        level: Option<LogLevel>,
        #[serde(default)]
        limit: Option<usize>,
    },
    GetTree { root_id: String },
}
