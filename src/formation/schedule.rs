//! Deferred actions keyed to the tick clock
//!
//! Entries become due once the accumulated tick time reaches their due
//! time. Nothing waits: the owner advances the clock and handles whatever
//! comes back.

use serde::{Deserialize, Serialize};

/// Handle for cancelling a scheduled entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScheduledId(pub u64);

#[derive(Debug, Clone)]
struct ScheduledEntry<A> {
    id: ScheduledId,
    due: f32,
    action: A,
}

/// Cancelable timer queue
#[derive(Debug, Clone)]
pub struct Scheduler<A> {
    clock: f32,
    next_id: u64,
    entries: Vec<ScheduledEntry<A>>,
}

impl<A> Default for Scheduler<A> {
    fn default() -> Self {
        Self {
            clock: 0.0,
            next_id: 0,
            entries: Vec::new(),
        }
    }
}

impl<A> Scheduler<A> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Elapsed tick time
    pub fn clock(&self) -> f32 {
        self.clock
    }

    pub fn schedule(&mut self, delay: f32, action: A) -> ScheduledId {
        let id = ScheduledId(self.next_id);
        self.next_id += 1;
        self.entries.push(ScheduledEntry {
            id,
            due: self.clock + delay.max(0.0),
            action,
        });
        id
    }

    /// Remove a pending entry. False if it already fired or never existed.
    pub fn cancel(&mut self, id: ScheduledId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|entry| entry.id != id);
        self.entries.len() != before
    }

    pub fn cancel_all(&mut self) {
        self.entries.clear();
    }

    pub fn is_pending(&self, id: ScheduledId) -> bool {
        self.entries.iter().any(|entry| entry.id == id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Advance the clock and take every due entry, earliest first. Ties keep
    /// scheduling order.
    pub fn advance(&mut self, dt: f32) -> Vec<(ScheduledId, A)> {
        self.clock += dt;

        let clock = self.clock;
        let (mut due, pending): (Vec<_>, Vec<_>) = std::mem::take(&mut self.entries)
            .into_iter()
            .partition(|entry| entry.due <= clock);
        self.entries = pending;

        due.sort_by(|a, b| a.due.total_cmp(&b.due).then(a.id.0.cmp(&b.id.0)));
        due.into_iter().map(|entry| (entry.id, entry.action)).collect()
    }
}
