// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Materialized state for the durable queue, replayed from
//! [`crate::queue_record::QueueRecord`].

use crate::queue_record::{QueueItem, QueueItemStatus, QueueRecord};
use jw_core::JobId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct QueueState {
    pub items: HashMap<JobId, QueueItem>,
}

impl QueueState {
    pub fn apply(&mut self, record: &QueueRecord) {
        match record {
            QueueRecord::Enqueued {
                job_id,
                visible_at_ms,
                pushed_at_ms,
            } => {
                self.items.entry(*job_id).or_insert_with(|| QueueItem {
                    job_id: *job_id,
                    status: QueueItemStatus::Pending,
                    receive_count: 0,
                    pushed_at_ms: *pushed_at_ms,
                    visible_at_ms: *visible_at_ms,
                    lease_until_ms: None,
                });
            }
            QueueRecord::Leased {
                job_id,
                lease_until_ms,
                receive_count,
            } => {
                if let Some(item) = self.items.get_mut(job_id) {
                    item.status = QueueItemStatus::Leased;
                    item.lease_until_ms = Some(*lease_until_ms);
                    item.receive_count = *receive_count;
                }
            }
            QueueRecord::Acked { job_id } => {
                if let Some(item) = self.items.get_mut(job_id) {
                    item.status = QueueItemStatus::Completed;
                }
            }
            QueueRecord::Nacked { job_id, visible_at_ms } => {
                if let Some(item) = self.items.get_mut(job_id) {
                    item.status = QueueItemStatus::Pending;
                    item.visible_at_ms = *visible_at_ms;
                    item.lease_until_ms = None;
                }
            }
            QueueRecord::DeadLettered { job_id } => {
                if let Some(item) = self.items.get_mut(job_id) {
                    item.status = QueueItemStatus::Dead;
                }
            }
        }
    }

    /// Jobs eligible for delivery: `pending` status whose visibility
    /// window has elapsed, oldest first.
    pub fn ready_at(&self, now_ms: u64) -> Vec<JobId> {
        let mut ready: Vec<&QueueItem> = self
            .items
            .values()
            .filter(|item| item.status == QueueItemStatus::Pending && item.visible_at_ms <= now_ms)
            .collect();
        ready.sort_by_key(|item| item.pushed_at_ms);
        ready.into_iter().map(|item| item.job_id).collect()
    }
}
