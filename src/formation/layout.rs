//! Grid layout computation
//!
//! Resolves slot world positions from the formation pose: scale the local
//! offset (plus jitter), rotate by the formation's yaw, translate, then snap
//! to the ground under the point.

use glam::{Vec2, Vec3};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::core::types::Pose;
use crate::formation::constants::GROUND_PROBE_LIFT;
use crate::formation::slot::Slot;

/// Layer mask for ground probes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CollisionMask(pub u32);

impl CollisionMask {
    pub const ALL: CollisionMask = CollisionMask(u32::MAX);
    pub const NONE: CollisionMask = CollisionMask(0);

    pub fn layer(index: u32) -> Self {
        Self(1 << index)
    }

    pub fn intersects(&self, other: CollisionMask) -> bool {
        self.0 & other.0 != 0
    }
}

impl Default for CollisionMask {
    fn default() -> Self {
        Self::ALL
    }
}

/// Ground-height query service
pub trait GroundQuery {
    /// Cast straight down from `from_height` at the horizontal point (x, z)
    /// and return the height of the first surface on a layer in `mask`.
    fn probe_ground(&self, horizontal: Vec2, from_height: f32, mask: CollisionMask)
        -> Option<f32>;
}

/// Resolves slot positions for one formation
#[derive(Debug, Clone, Copy)]
pub struct GridLayoutEngine {
    pub scale: f32,
    pub mask: CollisionMask,
}

impl GridLayoutEngine {
    pub fn new(scale: f32, mask: CollisionMask) -> Self {
        Self { scale, mask }
    }

    /// World position for a slot under the given formation pose
    pub fn resolve(&self, slot: &Slot, transform: &Pose, ground: &dyn GroundQuery) -> Vec3 {
        let local = (slot.offset() + slot.jitter().current()) * self.scale;
        let rotated = transform.heading() * Vec3::new(local.x, slot.clearance(), local.y);
        self.snap_to_ground(rotated + transform.position, slot.clearance(), ground)
    }

    /// Recompute every slot. Pure in the slot state: repeated calls with the
    /// same pose and jitter phase give identical positions.
    pub fn recompute_all(&self, slots: &mut [Slot], transform: &Pose, ground: &dyn GroundQuery) {
        for slot in slots.iter_mut() {
            let position = self.resolve(slot, transform, ground);
            slot.set_position(position);
        }
    }

    /// Put `candidate` at `clearance` above the ground. A miss keeps the
    /// candidate's own height.
    pub fn snap_to_ground(&self, candidate: Vec3, clearance: f32, ground: &dyn GroundQuery) -> Vec3 {
        let horizontal = Vec2::new(candidate.x, candidate.z);
        match ground.probe_ground(horizontal, candidate.y + GROUND_PROBE_LIFT, self.mask) {
            Some(height) => Vec3::new(candidate.x, height + clearance, candidate.z),
            None => candidate,
        }
    }

    /// Random ground-snapped point inside a sphere around `origin`
    pub fn disband_destination<R: Rng + ?Sized>(
        &self,
        origin: Vec3,
        radius: f32,
        clearance: f32,
        ground: &dyn GroundQuery,
        rng: &mut R,
    ) -> Vec3 {
        let scattered = origin + random_in_unit_ball(rng) * radius;
        self.snap_to_ground(scattered, clearance, ground)
    }
}

/// Times jitter re-draws at random intervals in [min, max]. The first
/// draw happens on the first advance.
#[derive(Debug, Clone, Copy)]
pub struct JitterSchedule {
    elapsed: f32,
    next_interval: f32,
    min_interval: f32,
    max_interval: f32,
}

impl JitterSchedule {
    pub fn new(min_interval: f32, max_interval: f32) -> Self {
        Self {
            elapsed: 0.0,
            next_interval: 0.0,
            min_interval,
            max_interval,
        }
    }

    pub fn next_interval(&self) -> f32 {
        self.next_interval
    }

    /// Advance the clock; true when slots should draw new jitter targets
    pub fn advance<R: Rng + ?Sized>(&mut self, dt: f32, rng: &mut R) -> bool {
        self.elapsed += dt;
        if self.elapsed <= self.next_interval {
            return false;
        }

        self.elapsed = 0.0;
        self.next_interval =
            self.min_interval + (self.max_interval - self.min_interval) * rng.gen::<f32>();
        true
    }
}

/// Uniform sample from the unit disk
pub fn random_in_unit_disk<R: Rng + ?Sized>(rng: &mut R) -> Vec2 {
    loop {
        let candidate = Vec2::new(rng.gen_range(-1.0..=1.0), rng.gen_range(-1.0..=1.0));
        if candidate.length_squared() <= 1.0 {
            return candidate;
        }
    }
}

/// Uniform sample from the unit ball
pub fn random_in_unit_ball<R: Rng + ?Sized>(rng: &mut R) -> Vec3 {
    loop {
        let candidate = Vec3::new(
            rng.gen_range(-1.0..=1.0),
            rng.gen_range(-1.0..=1.0),
            rng.gen_range(-1.0..=1.0),
        );
        if candidate.length_squared() <= 1.0 {
            return candidate;
        }
    }
}
