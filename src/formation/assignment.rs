//! Unit-to-slot assignment
//!
//! Assignment is positional: the unit at list index i goes to slot i.
//! Reassignment after a shape change feeds the previously bound units, in
//! ascending slot order, back through the same path.

use ahash::AHashSet;

use crate::core::error::FormationError;
use crate::core::types::UnitId;
use crate::formation::slot::{Slot, SlotBinding, SlotId};
use crate::formation::unit::{Capability, UnitRef};

/// Outcome of an assignment batch
#[derive(Debug, Default)]
pub struct AssignmentReport {
    /// Slots that received a unit, in slot order
    pub assigned: Vec<(SlotId, UnitId)>,
    /// Units supplied but left without a slot
    pub unassigned: Vec<UnitId>,
    pub errors: Vec<FormationError>,
}

impl AssignmentReport {
    /// True when every supplied unit was bound
    pub fn success(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn capacity_exceeded(&self) -> bool {
        self.errors
            .iter()
            .any(|e| matches!(e, FormationError::Capacity { .. }))
    }

    pub fn assigned_ids(&self) -> Vec<UnitId> {
        self.assigned.iter().map(|(_, id)| *id).collect()
    }
}

/// Binds units to slots, checking they can be driven by the movement mode
#[derive(Debug, Clone, Copy)]
pub struct UnitAssignmentManager {
    required: Capability,
}

impl UnitAssignmentManager {
    pub fn new(required: Capability) -> Self {
        Self { required }
    }

    pub fn required_capability(&self) -> Capability {
        self.required
    }

    /// Replace all bindings with `units`, bound by index.
    ///
    /// Units past the last slot are reported as a capacity error; the
    /// fitting prefix is still bound. A unit missing the required capability
    /// or listed twice is skipped and leaves its slot empty.
    pub fn assign(&self, slots: &mut [Slot], units: Vec<UnitRef>) -> AssignmentReport {
        let mut report = AssignmentReport::default();
        Self::release_all(slots);

        if units.len() > slots.len() {
            report.errors.push(FormationError::Capacity {
                supplied: units.len(),
                capacity: slots.len(),
            });
        }

        let mut seen = AHashSet::new();
        for (index, unit) in units.into_iter().enumerate() {
            let Some(slot) = slots.get_mut(index) else {
                report.unassigned.push(unit.borrow().id());
                continue;
            };

            let (unit_id, has_animation, has_navigator, clearance) = {
                let mut handle = unit.borrow_mut();
                let unit_id = handle.id();

                if !seen.insert(unit_id) {
                    report.errors.push(FormationError::DuplicateUnit(unit_id));
                    report.unassigned.push(unit_id);
                    continue;
                }

                if !self.required.is_present(&mut *handle) {
                    report.errors.push(FormationError::MissingCapability {
                        unit: unit_id,
                        capability: self.required,
                    });
                    report.unassigned.push(unit_id);
                    continue;
                }

                (
                    unit_id,
                    handle.animation().is_some(),
                    handle.navigator().is_some(),
                    handle.ground_clearance(),
                )
            };

            if !has_animation {
                tracing::debug!(unit = %unit_id, "bound unit has no animation driver");
            }

            slot.bind(
                SlotBinding {
                    unit,
                    unit_id,
                    has_animation,
                    has_navigator,
                },
                clearance,
            );
            report.assigned.push((index, unit_id));
        }

        report
    }

    /// Currently bound units in ascending slot order, skipping empty slots
    pub fn collect_assigned(slots: &[Slot]) -> Vec<UnitRef> {
        slots
            .iter()
            .filter_map(|slot| slot.unit().cloned())
            .collect()
    }

    pub fn release_all(slots: &mut [Slot]) -> Vec<SlotBinding> {
        slots.iter_mut().filter_map(|slot| slot.release()).collect()
    }

    /// Unbind one unit, wherever it sits. Returns the slot it left.
    pub fn unassign(slots: &mut [Slot], unit_id: UnitId) -> Option<SlotId> {
        let slot = slots
            .iter_mut()
            .find(|slot| slot.unit_id() == Some(unit_id))?;
        slot.release();
        Some(slot.id())
    }
}
