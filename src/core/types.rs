//! Core type definitions used throughout the codebase

use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for units that can be bound to a formation slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UnitId(pub Uuid);

impl UnitId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for UnitId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for UnitId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for formations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FormationId(pub Uuid);

impl FormationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for FormationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for FormationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Variable-rate tick counter (simulation time unit)
pub type Tick = u64;

/// World-space position and orientation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    pub position: Vec3,
    pub rotation: Quat,
}

impl Pose {
    pub fn new(position: Vec3, rotation: Quat) -> Self {
        Self { position, rotation }
    }

    /// Rotation about the vertical axis, in radians
    pub fn yaw(&self) -> f32 {
        yaw_of(self.rotation)
    }

    /// Yaw-only rotation, discarding pitch and roll
    pub fn heading(&self) -> Quat {
        Quat::from_rotation_y(self.yaw())
    }
}

impl Default for Pose {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
        }
    }
}

/// Extract the rotation about the vertical (Y) axis
pub fn yaw_of(rotation: Quat) -> f32 {
    let (yaw, _, _) = rotation.to_euler(glam::EulerRot::YXZ);
    yaw
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_PI_2;

    #[test]
    fn test_unit_id_uniqueness() {
        let a = UnitId::new();
        let b = UnitId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn test_unit_id_hash() {
        use ahash::AHashSet;
        let id = UnitId::new();
        let mut set = AHashSet::new();
        set.insert(id);
        assert!(set.contains(&id));
    }

    #[test]
    fn test_yaw_extraction() {
        let pose = Pose::new(Vec3::ZERO, Quat::from_rotation_y(FRAC_PI_2));
        assert!((pose.yaw() - FRAC_PI_2).abs() < 1e-5);
    }

    #[test]
    fn test_heading_drops_pitch() {
        let rotation = Quat::from_rotation_y(0.5) * Quat::from_rotation_x(0.3);
        let pose = Pose::new(Vec3::ZERO, rotation);
        let heading = pose.heading();
        assert!((yaw_of(heading) - 0.5).abs() < 1e-4);
        // Forward vector of a pure heading stays horizontal
        assert!((heading * Vec3::Z).y.abs() < 1e-5);
    }
}
