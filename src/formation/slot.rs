//! Formation slots
//!
//! One slot per shape point. A slot carries its local offset, jitter blend,
//! resolved world position and the unit bound to it. Only the owning
//! formation mutates slots; everything else reads through the accessors.

use std::fmt;

use glam::{Vec2, Vec3};

use crate::core::types::UnitId;
use crate::formation::constants::JITTER_RAMP_DURATION;
use crate::formation::unit::UnitRef;

/// Stable slot index within the current shape
pub type SlotId = usize;

/// Randomized offset blended in over a fixed ramp
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Jitter {
    radius: f32,
    previous: Vec2,
    target: Vec2,
    /// Blend phase in [0, 1]
    phase: f32,
}

impl Jitter {
    pub fn new(radius: f32) -> Self {
        Self {
            radius,
            previous: Vec2::ZERO,
            target: Vec2::ZERO,
            phase: 0.0,
        }
    }

    pub fn radius(&self) -> f32 {
        self.radius
    }

    pub fn phase(&self) -> f32 {
        self.phase
    }

    pub fn target(&self) -> Vec2 {
        self.target
    }

    /// Offset currently applied on top of the table offset
    pub fn current(&self) -> Vec2 {
        self.previous.lerp(self.target, self.phase)
    }

    pub(crate) fn advance(&mut self, dt: f32) {
        self.phase = (self.phase + dt / JITTER_RAMP_DURATION).min(1.0);
    }

    /// Start blending toward a new target. `unit_disk_sample` must lie in
    /// the unit disk; it is scaled by the jitter radius.
    pub(crate) fn retarget(&mut self, unit_disk_sample: Vec2) {
        if self.radius > 0.0 {
            self.previous = self.current();
            self.target = unit_disk_sample * self.radius;
            self.phase = 0.0;
        } else {
            self.previous = Vec2::ZERO;
            self.target = Vec2::ZERO;
        }
    }
}

/// Marker state for slot visualization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Occupancy {
    #[default]
    Vacant,
    Occupied,
}

/// A unit bound to a slot
#[derive(Clone)]
pub struct SlotBinding {
    pub unit: UnitRef,
    pub unit_id: UnitId,
    pub has_animation: bool,
    pub has_navigator: bool,
}

impl fmt::Debug for SlotBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SlotBinding")
            .field("unit_id", &self.unit_id)
            .field("has_animation", &self.has_animation)
            .field("has_navigator", &self.has_navigator)
            .finish()
    }
}

/// A single position in the formation layout
#[derive(Debug, Clone)]
pub struct Slot {
    id: SlotId,
    offset: Vec2,
    jitter: Jitter,
    position: Vec3,
    clearance: f32,
    binding: Option<SlotBinding>,
    assigned_velocity: Vec3,
    vertical_speed: f32,
    disband_destination: Option<Vec3>,
    occupancy: Occupancy,
    visible: bool,
}

impl Slot {
    pub fn new(id: SlotId, offset: Vec2, jitter_radius: f32) -> Self {
        Self {
            id,
            offset,
            jitter: Jitter::new(jitter_radius),
            position: Vec3::ZERO,
            clearance: 0.0,
            binding: None,
            assigned_velocity: Vec3::ZERO,
            vertical_speed: 0.0,
            disband_destination: None,
            occupancy: Occupancy::Vacant,
            visible: false,
        }
    }

    pub fn id(&self) -> SlotId {
        self.id
    }

    pub fn offset(&self) -> Vec2 {
        self.offset
    }

    pub fn jitter(&self) -> &Jitter {
        &self.jitter
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn clearance(&self) -> f32 {
        self.clearance
    }

    pub fn binding(&self) -> Option<&SlotBinding> {
        self.binding.as_ref()
    }

    pub fn unit(&self) -> Option<&UnitRef> {
        self.binding.as_ref().map(|b| &b.unit)
    }

    pub fn unit_id(&self) -> Option<UnitId> {
        self.binding.as_ref().map(|b| b.unit_id)
    }

    pub fn is_occupied(&self) -> bool {
        self.binding.is_some()
    }

    pub fn assigned_velocity(&self) -> Vec3 {
        self.assigned_velocity
    }

    pub fn vertical_speed(&self) -> f32 {
        self.vertical_speed
    }

    pub fn disband_destination(&self) -> Option<Vec3> {
        self.disband_destination
    }

    pub fn occupancy(&self) -> Occupancy {
        self.occupancy
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// Straight-line distance from the bound unit to this slot
    pub fn distance_to_unit(&self) -> Option<f32> {
        self.binding
            .as_ref()
            .map(|b| b.unit.borrow().position().distance(self.position))
    }

    pub(crate) fn set_position(&mut self, position: Vec3) {
        self.position = position;
    }

    pub(crate) fn jitter_mut(&mut self) -> &mut Jitter {
        &mut self.jitter
    }

    pub(crate) fn set_assigned_velocity(&mut self, velocity: Vec3) {
        self.assigned_velocity = velocity;
    }

    pub(crate) fn set_vertical_speed(&mut self, speed: f32) {
        self.vertical_speed = speed;
    }

    pub(crate) fn set_disband_destination(&mut self, destination: Vec3) {
        self.disband_destination = Some(destination);
    }

    pub(crate) fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    pub(crate) fn bind(&mut self, binding: SlotBinding, clearance: f32) {
        self.binding = Some(binding);
        self.clearance = clearance;
        self.occupancy = Occupancy::Occupied;
    }

    /// Clear the binding and reset per-unit kinematics. The unit itself is
    /// left untouched.
    pub(crate) fn release(&mut self) -> Option<SlotBinding> {
        self.occupancy = Occupancy::Vacant;
        self.assigned_velocity = Vec3::ZERO;
        self.vertical_speed = 0.0;
        self.clearance = 0.0;
        self.binding.take()
    }
}
