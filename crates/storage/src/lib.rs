// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Durable storage: write-ahead logs, materialized state, and snapshots
//! for both the job tree (`JobManager`) and the durable queue.

pub mod queue_record;
pub mod queue_state;
pub mod record;
pub mod snapshot;
pub mod state;
pub mod wal;

pub use queue_record::{QueueItem, QueueItemStatus, QueueRecord};
pub use queue_state::QueueState;
pub use record::JobRecord;
pub use snapshot::{Snapshot, SnapshotError};
pub use state::MaterializedState;
pub use wal::{Wal, WalEntry, WalError};
