//! Unit capability seams
//!
//! Units are owned by the host. A formation only holds shared references and
//! reaches each capability through the `FormationUnit` accessors.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use glam::{Quat, Vec3};

use crate::core::types::UnitId;

/// Kinematic controller that resolves collisions while moving
pub trait KinematicMover {
    fn move_by(&mut self, delta: Vec3);
    fn is_grounded(&self) -> bool;
}

/// Rigid body driven through its velocity
pub trait PhysicsBody {
    fn velocity(&self) -> Vec3;
    fn set_velocity(&mut self, velocity: Vec3);
}

/// Per-unit animation parameter driver
pub trait AnimationDriver {
    /// Velocity to animate this tick
    fn set_velocity(&mut self, velocity: Vec3);
    fn start_animations(&mut self);
    fn stop_animations(&mut self);
}

/// Unit's own navigation agent, used while the formation is forming up
/// or disbanding
pub trait UnitNavigator {
    fn set_destination(&mut self, destination: Vec3);
    fn resume(&mut self);
    fn stop(&mut self);
    fn velocity(&self) -> Vec3;
}

/// A unit that can be bound to a formation slot
pub trait FormationUnit {
    fn id(&self) -> UnitId;
    fn position(&self) -> Vec3;
    fn rotation(&self) -> Quat;
    fn set_rotation(&mut self, rotation: Quat);

    /// Height the unit keeps above the ground
    fn ground_clearance(&self) -> f32 {
        0.0
    }

    fn kinematic_mover(&mut self) -> Option<&mut dyn KinematicMover> {
        None
    }

    fn physics_body(&mut self) -> Option<&mut dyn PhysicsBody> {
        None
    }

    fn animation(&mut self) -> Option<&mut dyn AnimationDriver> {
        None
    }

    fn navigator(&mut self) -> Option<&mut dyn UnitNavigator> {
        None
    }
}

/// Shared handle to a host-owned unit
pub type UnitRef = Rc<RefCell<dyn FormationUnit>>;

/// Wrap a concrete unit in a shared handle
pub fn share<U: FormationUnit + 'static>(unit: U) -> Rc<RefCell<U>> {
    Rc::new(RefCell::new(unit))
}

/// Capability a movement mode requires from every bound unit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    KinematicMover,
    PhysicsBody,
}

impl Capability {
    /// Does this unit expose the capability?
    pub fn is_present(&self, unit: &mut dyn FormationUnit) -> bool {
        match self {
            Capability::KinematicMover => unit.kinematic_mover().is_some(),
            Capability::PhysicsBody => unit.physics_body().is_some(),
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capability::KinematicMover => write!(f, "kinematic mover"),
            Capability::PhysicsBody => write!(f, "physics body"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Marker {
        id: UnitId,
        body_velocity: Option<Vec3>,
    }

    impl PhysicsBody for Marker {
        fn velocity(&self) -> Vec3 {
            self.body_velocity.unwrap_or(Vec3::ZERO)
        }

        fn set_velocity(&mut self, velocity: Vec3) {
            self.body_velocity = Some(velocity);
        }
    }

    impl FormationUnit for Marker {
        fn id(&self) -> UnitId {
            self.id
        }

        fn position(&self) -> Vec3 {
            Vec3::ZERO
        }

        fn rotation(&self) -> Quat {
            Quat::IDENTITY
        }

        fn set_rotation(&mut self, _rotation: Quat) {}

        fn physics_body(&mut self) -> Option<&mut dyn PhysicsBody> {
            if self.body_velocity.is_some() {
                Some(self)
            } else {
                None
            }
        }
    }

    #[test]
    fn test_capability_detection() {
        let mut with_body = Marker {
            id: UnitId::new(),
            body_velocity: Some(Vec3::ZERO),
        };
        let mut without_body = Marker {
            id: UnitId::new(),
            body_velocity: None,
        };

        assert!(Capability::PhysicsBody.is_present(&mut with_body));
        assert!(!Capability::PhysicsBody.is_present(&mut without_body));
        assert!(!Capability::KinematicMover.is_present(&mut with_body));
    }

    #[test]
    fn test_shared_handle_coerces() {
        let unit = share(Marker {
            id: UnitId::new(),
            body_velocity: None,
        });
        let handle: UnitRef = unit.clone();
        assert_eq!(handle.borrow().id(), unit.borrow().id);
    }
}
