//! Unit movement toward slots
//!
//! Two integration strategies, picked once per formation:
//! - ControllerIntegration: variable-rate; moves a kinematic controller by a
//!   distance-scaled velocity with a deceleration band near the slot.
//! - VelocityIntegration: fixed-rate; accelerates a physics body toward the
//!   slot and caps its speed.
//!
//! Each strategy only implements the step of its own tick domain. The other
//! step is the trait's no-op default.

use std::fmt;

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::core::config::FormationConfig;
use crate::formation::constants::DECELERATION_BAND;
use crate::formation::slot::Slot;
use crate::formation::unit::Capability;

/// Which integrator drives the bound units
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MovementMode {
    #[default]
    ControllerIntegration,
    VelocityIntegration,
}

impl MovementMode {
    pub fn required_capability(&self) -> Capability {
        match self {
            MovementMode::ControllerIntegration => Capability::KinematicMover,
            MovementMode::VelocityIntegration => Capability::PhysicsBody,
        }
    }

    /// Build the strategy object for this mode
    pub fn strategy(&self, params: &MovementParams) -> Box<dyn MovementStrategy> {
        match self {
            MovementMode::ControllerIntegration => Box::new(ControllerIntegration {
                straggler_boost: params.straggler_boost,
                gravity: params.use_gravity.then_some(params.gravity),
            }),
            MovementMode::VelocityIntegration => Box::new(VelocityIntegration {
                maximum_acceleration: params.maximum_acceleration,
                maximum_velocity: params.maximum_velocity,
            }),
        }
    }
}

/// Movement tunables pulled from the formation config
#[derive(Debug, Clone, Copy)]
pub struct MovementParams {
    pub maximum_velocity: f32,
    pub maximum_acceleration: f32,
    pub gravity: f32,
    pub use_gravity: bool,
    pub straggler_boost: f32,
}

impl From<&FormationConfig> for MovementParams {
    fn from(config: &FormationConfig) -> Self {
        Self {
            maximum_velocity: config.maximum_velocity,
            maximum_acceleration: config.maximum_acceleration,
            gravity: config.gravity,
            use_gravity: config.use_gravity,
            straggler_boost: config.straggler_boost,
        }
    }
}

/// Per-tick inputs shared by every slot
#[derive(Debug, Clone, Copy)]
pub struct StepContext {
    pub dt: f32,
    /// Anchor's arrival tolerance (d0)
    pub end_reached_distance: f32,
}

/// Integrates one slot's unit toward the slot position
pub trait MovementStrategy: fmt::Debug {
    fn mode(&self) -> MovementMode;

    /// Variable-rate step
    fn variable_step(&self, _slot: &mut Slot, _ctx: &StepContext) {}

    /// Fixed-rate step
    fn fixed_step(&self, _slot: &mut Slot, _ctx: &StepContext) {}
}

/// Acceleration multiplier as a function of distance to the slot.
///
/// 0 within `end_reached`, linear from 0 to 1 across
/// (`end_reached`, 5 * `end_reached`], `straggler_boost` beyond.
pub fn deceleration_multiplier(distance: f32, end_reached: f32, straggler_boost: f32) -> f32 {
    let band = end_reached * DECELERATION_BAND;
    if distance > band {
        straggler_boost
    } else if distance <= end_reached {
        0.0
    } else {
        let slope = 1.0 / ((DECELERATION_BAND - 1.0) * end_reached);
        let intercept = -slope * end_reached;
        slope * distance + intercept
    }
}

/// Kinematic-controller integration (variable-rate domain)
#[derive(Debug, Clone, Copy)]
pub struct ControllerIntegration {
    pub straggler_boost: f32,
    /// Downward acceleration, or `None` when gravity is off
    pub gravity: Option<f32>,
}

impl MovementStrategy for ControllerIntegration {
    fn mode(&self) -> MovementMode {
        MovementMode::ControllerIntegration
    }

    fn variable_step(&self, slot: &mut Slot, ctx: &StepContext) {
        let Some(unit) = slot.unit().cloned() else {
            return;
        };
        let mut unit = unit.borrow_mut();
        let unit_id = unit.id();

        let target = slot.position();
        let from = unit.position();
        let multiplier =
            deceleration_multiplier(from.distance(target), ctx.end_reached_distance, self.straggler_boost);
        let mut velocity = (target - from) * multiplier;

        let Some(mover) = unit.kinematic_mover() else {
            tracing::error!(unit = %unit_id, "kinematic mover missing on bound unit");
            return;
        };

        if let Some(gravity) = self.gravity {
            let vertical_speed = if mover.is_grounded() {
                0.0
            } else {
                slot.vertical_speed() - gravity * ctx.dt
            };
            slot.set_vertical_speed(vertical_speed);
            velocity.y = vertical_speed;
        }

        mover.move_by(velocity * ctx.dt);
        slot.set_assigned_velocity(velocity);
    }
}

/// Physics-body integration (fixed-rate domain)
#[derive(Debug, Clone, Copy)]
pub struct VelocityIntegration {
    pub maximum_acceleration: f32,
    pub maximum_velocity: f32,
}

impl MovementStrategy for VelocityIntegration {
    fn mode(&self) -> MovementMode {
        MovementMode::VelocityIntegration
    }

    fn fixed_step(&self, slot: &mut Slot, ctx: &StepContext) {
        let Some(unit) = slot.unit().cloned() else {
            return;
        };
        let mut unit = unit.borrow_mut();
        let unit_id = unit.id();

        let mut direction = slot.position() - unit.position();
        direction.y = 0.0;
        let acceleration = direction.normalize_or_zero() * self.maximum_acceleration;

        let Some(body) = unit.physics_body() else {
            tracing::error!(unit = %unit_id, "physics body missing on bound unit");
            return;
        };

        let velocity = (body.velocity() + acceleration * ctx.dt).clamp_length_max(self.maximum_velocity);
        body.set_velocity(velocity);
        slot.set_assigned_velocity(velocity);
    }
}
