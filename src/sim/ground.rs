//! Ground query stand-ins

use glam::Vec2;

use crate::formation::layout::{CollisionMask, GroundQuery};

/// Infinite horizontal plane
#[derive(Debug, Clone, Copy)]
pub struct FlatGround {
    pub height: f32,
    pub layer: CollisionMask,
}

impl FlatGround {
    pub fn new(height: f32) -> Self {
        Self {
            height,
            layer: CollisionMask::ALL,
        }
    }

    pub fn on_layer(mut self, layer: CollisionMask) -> Self {
        self.layer = layer;
        self
    }
}

impl GroundQuery for FlatGround {
    fn probe_ground(&self, _horizontal: Vec2, from_height: f32, mask: CollisionMask) -> Option<f32> {
        if !mask.intersects(self.layer) || self.height > from_height {
            return None;
        }
        Some(self.height)
    }
}

/// Nothing to hit anywhere
#[derive(Debug, Clone, Copy, Default)]
pub struct NoGround;

impl GroundQuery for NoGround {
    fn probe_ground(&self, _horizontal: Vec2, _from_height: f32, _mask: CollisionMask) -> Option<f32> {
        None
    }
}

/// Terrain given by a height function over (x, z). Returning `None` from
/// the function leaves a hole.
pub struct HeightField<F> {
    height: F,
    pub layer: CollisionMask,
}

impl<F> HeightField<F>
where
    F: Fn(Vec2) -> Option<f32>,
{
    pub fn new(height: F) -> Self {
        Self {
            height,
            layer: CollisionMask::ALL,
        }
    }
}

impl<F> GroundQuery for HeightField<F>
where
    F: Fn(Vec2) -> Option<f32>,
{
    fn probe_ground(&self, horizontal: Vec2, from_height: f32, mask: CollisionMask) -> Option<f32> {
        if !mask.intersects(self.layer) {
            return None;
        }
        (self.height)(horizontal).filter(|h| *h <= from_height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flat_ground_hit() {
        let ground = FlatGround::new(2.0);
        assert_eq!(ground.probe_ground(Vec2::ZERO, 100.0, CollisionMask::ALL), Some(2.0));
    }

    #[test]
    fn test_probe_below_surface_misses() {
        let ground = FlatGround::new(2.0);
        assert_eq!(ground.probe_ground(Vec2::ZERO, 1.0, CollisionMask::ALL), None);
    }

    #[test]
    fn test_height_field_with_hole() {
        let ground = HeightField::new(|p: Vec2| if p.x < 0.0 { None } else { Some(p.x * 0.5) });
        assert_eq!(ground.probe_ground(Vec2::new(4.0, 0.0), 100.0, CollisionMask::ALL), Some(2.0));
        assert_eq!(ground.probe_ground(Vec2::new(-1.0, 0.0), 100.0, CollisionMask::ALL), None);
    }
}
