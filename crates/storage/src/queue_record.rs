// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! WAL record types for the durable queue, kept in a separate WAL instance
//! from [`crate::record::JobRecord`] — the queue is its own durability
//! boundary, independent of job-tree state.

use jw_core::JobId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueItemStatus {
    Pending,
    Leased,
    Completed,
    Failed,
    Dead,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueItem {
    pub job_id: JobId,
    pub status: QueueItemStatus,
    pub receive_count: u32,
    pub pushed_at_ms: u64,
    pub visible_at_ms: u64,
    pub lease_until_ms: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum QueueRecord {
    Enqueued {
        job_id: JobId,
        visible_at_ms: u64,
        pushed_at_ms: u64,
    },
    Leased {
        job_id: JobId,
        lease_until_ms: u64,
        receive_count: u32,
    },
    Acked {
        job_id: JobId,
    },
    Nacked {
        job_id: JobId,
        visible_at_ms: u64,
    },
    DeadLettered {
        job_id: JobId,
    },
}
