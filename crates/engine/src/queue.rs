// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Durable FIFO queue with visibility-timeout leases and dead-lettering.

use jw_core::{Clock, JobId};
use jw_storage::queue_record::QueueItemStatus;
use jw_storage::{QueueRecord, QueueState, Wal, WalError};
use parking_lot::Mutex;
use std::path::Path;
use std::time::Duration;

const DEFAULT_VISIBILITY_TIMEOUT: Duration = Duration::from_secs(5 * 60);
const DEFAULT_MAX_RECEIVE: u32 = 5;

/// A job handed back by [`DurableQueue::receive`], with the lease
/// information the processor needs to ack/nack it.
#[derive(Debug, Clone, Copy)]
pub struct Lease {
    pub job_id: JobId,
    pub receive_count: u32,
}

pub struct DurableQueue<C: Clock> {
    wal: Mutex<Wal<QueueRecord>>,
    state: Mutex<QueueState>,
    clock: C,
    visibility_timeout: Duration,
    max_receive: u32,
    /// Jobs dead-lettered by a `receive()` call that the caller (the
    /// processor) has not yet drained and failed through `JobManager`.
    /// The queue owns `QueueMessage` records exclusively (spec §3) and has
    /// no handle to the job manager, so it cannot fail the job itself.
    dead_lettered: Mutex<Vec<JobId>>,
}

impl<C: Clock> DurableQueue<C> {
    pub fn open(path: &Path, clock: C) -> Result<Self, WalError> {
        Self::open_with(path, clock, DEFAULT_VISIBILITY_TIMEOUT, DEFAULT_MAX_RECEIVE)
    }

    pub fn open_with(
        path: &Path,
        clock: C,
        visibility_timeout: Duration,
        max_receive: u32,
    ) -> Result<Self, WalError> {
        let mut wal: Wal<QueueRecord> = Wal::open(path, 0)?;
        let mut state = QueueState::default();
        for entry in wal.entries_after(0)? {
            state.apply(&entry.record);
        }
        Ok(Self {
            wal: Mutex::new(wal),
            state: Mutex::new(state),
            clock,
            visibility_timeout,
            max_receive,
            dead_lettered: Mutex::new(Vec::new()),
        })
    }

    /// Enqueue `job_id`, visible immediately.
    pub fn enqueue(&self, job_id: JobId) -> Result<(), WalError> {
        let now = self.clock.epoch_ms();
        let record = QueueRecord::Enqueued {
            job_id,
            visible_at_ms: now,
            pushed_at_ms: now,
        };
        self.write(&record)
    }

    /// Lease the oldest ready job, extending its visibility window so no
    /// other receiver can take it until the lease expires.
    pub fn receive(&self) -> Result<Option<Lease>, WalError> {
        self.reap_expired_leases()?;

        let now = self.clock.epoch_ms();
        let job_id = {
            let state = self.state.lock();
            match state.ready_at(now).first().copied() {
                Some(id) => id,
                None => return Ok(None),
            }
        };

        let receive_count = {
            let state = self.state.lock();
            state.items.get(&job_id).map(|i| i.receive_count).unwrap_or(0) + 1
        };

        if receive_count > self.max_receive {
            self.write(&QueueRecord::DeadLettered { job_id })?;
            self.dead_lettered.lock().push(job_id);
            return self.receive();
        }

        let lease_until_ms = now + self.visibility_timeout.as_millis() as u64;
        self.write(&QueueRecord::Leased {
            job_id,
            lease_until_ms,
            receive_count,
        })?;

        Ok(Some(Lease { job_id, receive_count }))
    }

    /// Acknowledge successful processing; the item is marked completed and
    /// never redelivered.
    pub fn ack(&self, job_id: JobId) -> Result<(), WalError> {
        self.write(&QueueRecord::Acked { job_id })
    }

    /// Return a job to the pending pool immediately (or after `delay`),
    /// for retry after a transient failure.
    pub fn nack(&self, job_id: JobId, delay: Duration) -> Result<(), WalError> {
        let visible_at_ms = self.clock.epoch_ms() + delay.as_millis() as u64;
        self.write(&QueueRecord::Nacked { job_id, visible_at_ms })
    }

    /// Sweep leases whose visibility timeout has elapsed back to pending.
    fn reap_expired_leases(&self) -> Result<(), WalError> {
        let now = self.clock.epoch_ms();
        let expired: Vec<JobId> = {
            let state = self.state.lock();
            state
                .items
                .values()
                .filter(|item| {
                    item.status == QueueItemStatus::Leased
                        && item.lease_until_ms.map(|until| until <= now).unwrap_or(false)
                })
                .map(|item| item.job_id)
                .collect()
        };
        for job_id in expired {
            self.write(&QueueRecord::Nacked { job_id, visible_at_ms: now })?;
        }
        Ok(())
    }

    /// Drain the set of jobs dead-lettered since the last drain, so the
    /// processor can fail each one through `JobManager` (spec §4.2: a
    /// dead-lettered message is surfaced via a `job_failed` event with a
    /// reason distinguishing exhausted retries).
    pub fn take_dead_lettered(&self) -> Vec<JobId> {
        std::mem::take(&mut self.dead_lettered.lock())
    }

    pub fn status_of(&self, job_id: JobId) -> Option<QueueItemStatus> {
        self.state.lock().items.get(&job_id).map(|item| item.status)
    }

    fn write(&self, record: &QueueRecord) -> Result<(), WalError> {
        {
            let mut wal = self.wal.lock();
            wal.append(record)?;
            wal.flush()?;
        }
        self.state.lock().apply(record);
        Ok(())
    }
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;
