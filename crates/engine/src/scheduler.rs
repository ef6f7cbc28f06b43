// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cron-driven recurring dispatch: evaluates every enabled definition's
//! `schedule` on a fixed tick and fires `JobDispatcher::execute_definition`
//! for the ones that are due, deduping near-simultaneous fires with a
//! per-definition cooldown.

use crate::dispatcher::JobDispatcher;
use crate::event_bus::EventBus;
use crate::job_manager::JobManager;
use crate::monitor::JobMonitor;
use cron::Schedule;
use jw_core::{Clock, Event};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::warn;

const DEFAULT_TICK: Duration = Duration::from_secs(60);
/// Minimum time between two fires of the same definition, so a tick that
/// lands on the same minute as a slow previous tick can't double-fire.
const DEFAULT_COOLDOWN: Duration = Duration::from_secs(60);

/// Tracks, per definition, the last fire time and the parsed cron schedule
/// so it isn't re-parsed on every tick.
#[derive(Default)]
struct ScheduleState {
    parsed: HashMap<String, Schedule>,
    last_fired_ms: HashMap<String, u64>,
}

pub struct Scheduler<C: Clock> {
    manager: Arc<JobManager<C>>,
    dispatcher: Arc<JobDispatcher<C>>,
    events: EventBus,
    clock: C,
    state: Mutex<ScheduleState>,
    tick_interval: Duration,
    cooldown_ms: u64,
}

impl<C: Clock> Scheduler<C> {
    pub fn new(
        manager: Arc<JobManager<C>>,
        dispatcher: Arc<JobDispatcher<C>>,
        events: EventBus,
        clock: C,
    ) -> Self {
        Self {
            manager,
            dispatcher,
            events,
            clock,
            state: Mutex::new(ScheduleState::default()),
            tick_interval: DEFAULT_TICK,
            cooldown_ms: DEFAULT_COOLDOWN.as_millis() as u64,
        }
    }

    pub fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval;
        self
    }

    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown_ms = cooldown.as_millis() as u64;
        self
    }

    /// Evaluate every enabled, scheduled definition against `now` and fire
    /// the ones that are due. Returns the ids actually fired, for tests.
    pub fn tick(&self, now_ms: u64) -> Vec<String> {
        let mut fired = Vec::new();
        for def in self.manager.definitions() {
            let Some(expr) = def.schedule.as_deref() else { continue };
            if !def.enabled {
                continue;
            }

            let mut state = self.state.lock();
            let schedule = match state.parsed.get(&def.id) {
                Some(s) => s.clone(),
                None => match Schedule::from_str(&normalize_cron_expr(expr)) {
                    Ok(s) => {
                        state.parsed.insert(def.id.clone(), s.clone());
                        s
                    }
                    Err(e) => {
                        warn!(definition_id = %def.id, error = %e, "invalid cron expression, skipping");
                        continue;
                    }
                },
            };

            let last_fired = state.last_fired_ms.get(&def.id).copied();
            if let Some(last) = last_fired {
                if now_ms.saturating_sub(last) < self.cooldown_ms {
                    continue;
                }
            }

            if !self.is_due(&schedule, last_fired, now_ms) {
                continue;
            }

            state.last_fired_ms.insert(def.id.clone(), now_ms);
            drop(state);

            fired.push(def.id.clone());
            self.events.publish(Event::ScheduleFired { definition_id: def.id.clone(), epoch_ms: now_ms });

            let dispatcher = self.dispatcher.clone();
            let manager = self.manager.clone();
            let events = self.events.clone();
            let definition_id = def.id.clone();
            let error_tolerance = def.error_tolerance.clone();
            tokio::spawn(async move {
                match dispatcher.execute_definition(&def, HashMap::new()).await {
                    Ok(parent_id) => {
                        tokio::spawn(JobMonitor::new(manager, parent_id, error_tolerance).run(events));
                    }
                    Err(e) => {
                        warn!(definition_id = %definition_id, error = %e, "scheduled dispatch failed");
                    }
                }
            });
        }
        fired
    }

    /// A schedule is due once `now` has crossed at least one occurrence
    /// since it was last fired (or since a minute ago, on first fire).
    fn is_due(&self, schedule: &Schedule, last_fired_ms: Option<u64>, now_ms: u64) -> bool {
        let since_ms = last_fired_ms.unwrap_or_else(|| now_ms.saturating_sub(self.tick_interval.as_millis() as u64));
        let since = chrono::DateTime::<chrono::Utc>::from_timestamp_millis(since_ms as i64)
            .unwrap_or_else(chrono::Utc::now);
        let now = chrono::DateTime::<chrono::Utc>::from_timestamp_millis(now_ms as i64).unwrap_or_else(chrono::Utc::now);
        schedule.after(&since).take_while(|t| *t <= now).next().is_some()
    }

    /// Run the tick loop until `shutdown` is cancelled.
    pub async fn run(self: Arc<Self>, shutdown: CancellationToken) {
        let mut interval = tokio::time::interval(self.tick_interval);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => return,
                _ = interval.tick() => {
                    self.tick(self.clock.epoch_ms());
                }
            }
        }
    }
}

/// The `cron` crate parses 6- or 7-field (seconds-first) expressions, but
/// spec §8 scenario 4's canonical `schedule` strings (and anything authored
/// against the usual 5-field POSIX dialect) omit the seconds field.
/// Prepend a literal `"0"` field so a bare 5-field expression still parses.
fn normalize_cron_expr(expr: &str) -> String {
    match expr.split_whitespace().count() {
        5 => format!("0 {expr}"),
        _ => expr.to_string(),
    }
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;
