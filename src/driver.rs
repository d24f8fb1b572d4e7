//! Runs workspace effects against an analysis store.
//!
//! The workspace only describes remote calls and timers. [`Driver`] is the
//! host side: it executes requests on an [`AnalysisStore`], feeds the replies
//! back, and keeps a queue of timers ordered by deadline.

use std::time::Duration;
use web_time::Instant;

use crate::remote::AnalysisStore;
use crate::sync::{Effect, TimerId, TimerKind, Workspace};

/// A timer waiting for its deadline.
#[derive(Debug, Clone)]
struct PendingTimer {
    due: Instant,
    id: TimerId,
    kind: TimerKind,
}

/// Synchronous effect executor.
#[derive(Debug)]
pub struct Driver<S> {
    store: S,
    timers: Vec<PendingTimer>,
    /// Requests executed so far.
    executed: usize,
}

impl<S: AnalysisStore> Driver<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            timers: Vec::new(),
            executed: 0,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    /// Number of requests executed since creation.
    pub fn executed(&self) -> usize {
        self.executed
    }

    pub fn pending_timers(&self) -> usize {
        self.timers.len()
    }

    /// Deadline of the earliest pending timer.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.timers.iter().map(|t| t.due).min()
    }

    /// Execute queued requests until the workspace stops issuing new ones.
    ///
    /// Timers are queued, not run. Returns the number of requests executed.
    pub fn pump(&mut self, ws: &mut Workspace) -> usize {
        let mut executed = 0;
        loop {
            let effects = ws.drain_effects();
            if effects.is_empty() {
                break;
            }
            for effect in effects {
                match effect {
                    Effect::Request { id, call } => {
                        log::debug!("Executing {} ({:?})", id, call.filename());
                        let result = self.store.execute(&call);
                        if let Err(e) = &result {
                            log::debug!("{} failed: {}", id, e);
                        }
                        ws.handle_response(id, result);
                        executed += 1;
                    }
                    Effect::Schedule { id, delay, timer } => {
                        log::trace!("Scheduling {} in {:?}", id, delay);
                        self.timers.push(PendingTimer {
                            due: Instant::now() + delay,
                            id,
                            kind: timer,
                        });
                    }
                }
            }
        }
        self.executed += executed;
        executed
    }

    /// Run every timer due at `now`, earliest first, then pump.
    ///
    /// Returns the number of timers fired.
    pub fn fire_due_timers(&mut self, ws: &mut Workspace, now: Instant) -> usize {
        let mut due: Vec<PendingTimer> = Vec::new();
        self.timers.retain(|timer| {
            if timer.due <= now {
                due.push(timer.clone());
                false
            } else {
                true
            }
        });
        due.sort_by_key(|timer| timer.due);

        for timer in &due {
            log::trace!("Firing {} ({:?})", timer.id, timer.kind);
            ws.handle_timer(timer.id);
        }
        self.pump(ws);
        due.len()
    }

    /// Drop timers without running them.
    pub fn cancel_timers(&mut self) {
        self.timers.clear();
    }

    /// Pump and keep firing timers, sleeping until each is due, until
    /// neither requests nor timers remain.
    pub fn run_until_idle(&mut self, ws: &mut Workspace) {
        self.pump(ws);
        while let Some(deadline) = self.next_deadline() {
            let now = Instant::now();
            if deadline > now {
                std::thread::sleep(deadline - now);
            }
            self.fire_due_timers(ws, Instant::now());
        }
    }

    /// Like [`Driver::run_until_idle`] but gives up waiting after `limit`.
    ///
    /// Returns false if timers were still pending at the limit.
    pub fn run_for(&mut self, ws: &mut Workspace, limit: Duration) -> bool {
        let end = Instant::now() + limit;
        self.pump(ws);
        while let Some(deadline) = self.next_deadline() {
            if deadline > end {
                return false;
            }
            let now = Instant::now();
            if deadline > now {
                std::thread::sleep(deadline - now);
            }
            self.fire_due_timers(ws, Instant::now());
        }
        true
    }
}
