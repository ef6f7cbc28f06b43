// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-process event bus for progress fan-out.
//!
//! Unlike [`jw_storage::state::MaterializedState`], which is durable and
//! exclusively owned by `JobManager`, the event bus is ephemeral: a
//! subscriber that's slow or gone simply misses events. Delivery is
//! non-blocking and at-most-once per subscriber; each subscriber owns a
//! bounded ring buffer rather than an mpsc channel, so a publish against a
//! full buffer can genuinely evict the oldest pending event in favor of the
//! new one (spec §9: "choose the one that keeps the most recent terminal
//! events (typically drop-oldest)").

use jw_core::Event;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use tracing::trace;

const DEFAULT_SUBSCRIBER_BUFFER: usize = 256;

/// Bounded ring buffer shared between a [`Subscriber`]'s publish side and
/// its [`Subscription`]'s receive side, so `publish` can pop the oldest
/// pending event itself rather than needing the receiver's cooperation.
struct Inbox {
    queue: Mutex<VecDeque<Event>>,
    notify: Notify,
    capacity: usize,
}

struct Subscriber {
    topic: Option<String>,
    inbox: Arc<Inbox>,
}

/// Publishes [`Event`]s to any number of topic-filtered subscribers.
#[derive(Clone)]
pub struct EventBus {
    subscribers: Arc<Mutex<HashMap<u64, Subscriber>>>,
    next_id: Arc<AtomicU64>,
    buffer_size: usize,
}

/// Handle returned by [`EventBus::subscribe`]; dropping it unsubscribes.
pub struct Subscription {
    bus: EventBus,
    id: u64,
    inbox: Arc<Inbox>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_buffer_size(DEFAULT_SUBSCRIBER_BUFFER)
    }

    pub fn with_buffer_size(buffer_size: usize) -> Self {
        Self {
            subscribers: Arc::new(Mutex::new(HashMap::new())),
            next_id: Arc::new(AtomicU64::new(0)),
            buffer_size,
        }
    }

    /// Subscribe to every event, or only events whose `topic()` matches
    /// `topic` exactly (spec's `job:<id>` / `definition:<id>` scoping).
    pub fn subscribe(&self, topic: Option<String>) -> Subscription {
        let inbox = Arc::new(Inbox {
            queue: Mutex::new(VecDeque::with_capacity(self.buffer_size.min(64))),
            notify: Notify::new(),
            capacity: self.buffer_size.max(1),
        });
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.subscribers.lock().insert(id, Subscriber { topic, inbox: inbox.clone() });
        Subscription { bus: self.clone(), id, inbox }
    }

    /// Publish an event to every matching subscriber.
    ///
    /// Never blocks: a subscriber whose buffer is already at capacity has
    /// its oldest pending event evicted to make room for this one, so a
    /// terminal event can never be dropped in favor of an older, lower
    /// priority one sitting ahead of it in a full buffer.
    pub fn publish(&self, event: Event) {
        let topic = event.topic();
        let subscribers = self.subscribers.lock();
        for subscriber in subscribers.values() {
            if let Some(filter) = &subscriber.topic {
                if filter != &topic {
                    continue;
                }
            }
            let mut queue = subscriber.inbox.queue.lock();
            if queue.len() >= subscriber.inbox.capacity {
                queue.pop_front();
                trace!(topic = %topic, "subscriber buffer full, dropping oldest pending event");
            }
            queue.push_back(event.clone());
            drop(queue);
            subscriber.inbox.notify.notify_one();
        }
    }

    fn unsubscribe(&self, id: u64) {
        self.subscribers.lock().remove(&id);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl Subscription {
    pub async fn recv(&mut self) -> Option<Event> {
        loop {
            if let Some(event) = self.inbox.queue.lock().pop_front() {
                return Some(event);
            }
            self.inbox.notify.notified().await;
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.bus.unsubscribe(self.id);
    }
}

#[cfg(test)]
#[path = "event_bus_tests.rs"]
mod tests;
