// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! WAL record types for [`crate::state::MaterializedState`].
//!
//! These are durable facts about job-tree and definition mutations, written
//! exclusively by `JobManager`. They are distinct from [`jw_core::Event`]:
//! an `Event` is an ephemeral notification that may be dropped under
//! back-pressure, a `JobRecord` is never dropped once flushed.

use jw_core::{JobDefinition, JobId, KvEntry, LogEntry, QueueJob};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum JobRecord {
    JobUpserted { job: QueueJob },
    JobDeleted { job_id: JobId },
    LogAppended { entry: LogEntry },
    DefinitionUpserted { definition: JobDefinition },
    DefinitionDeleted { definition_id: String },
    KvSet { entry: KvEntry },
    KvDeleted { key: String },
}
