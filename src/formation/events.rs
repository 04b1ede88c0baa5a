//! Formation event log
//!
//! The log keeps at most `EVENT_LOG_CAPACITY` entries; older ones are
//! dropped first. Hosts that want a full history drain it every tick.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::core::error::ErrorKind;
use crate::core::types::{Tick, UnitId};
use crate::formation::constants::EVENT_LOG_CAPACITY;
use crate::formation::grid::FormationState;
use crate::formation::shape::ShapeId;

/// Log entry for formation events
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormationEvent {
    pub tick: Tick,
    pub event_type: FormationEventType,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FormationEventType {
    AnchorBound,
    StateChanged {
        from: FormationState,
        to: FormationState,
    },
    ShapeChanged {
        from: ShapeId,
        to: ShapeId,
        slots: usize,
    },
    UnitsAssigned {
        assigned: usize,
        unassigned: usize,
    },
    UnitUnassigned {
        unit_id: UnitId,
    },
    PositionsRecomputed,
    AnchorArrived,
    DisbandCompleted,
    ErrorReported {
        kind: ErrorKind,
    },
}

/// Events accumulated since the last drain, oldest first
#[derive(Debug, Clone, Default)]
pub struct FormationEventLog {
    pub events: VecDeque<FormationEvent>,
    dropped: usize,
}

impl FormationEventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event_type: FormationEventType, description: String, tick: Tick) {
        if self.events.len() >= EVENT_LOG_CAPACITY {
            self.events.pop_front();
            self.dropped += 1;
        }
        self.events.push_back(FormationEvent {
            tick,
            event_type,
            description,
        });
    }

    /// Entries discarded because the log was full
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn drain(&mut self) -> Vec<FormationEvent> {
        self.events.drain(..).collect()
    }

    /// Count events matching a predicate
    pub fn count(&self, predicate: impl Fn(&FormationEventType) -> bool) -> usize {
        self.events.iter().filter(|e| predicate(&e.event_type)).count()
    }
}
