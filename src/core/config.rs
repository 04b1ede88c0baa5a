//! Formation configuration with documented defaults
//!
//! Every tunable used by the layout, movement and disband systems lives here.
//! Configs load from TOML; missing keys fall back to the defaults below.

use std::fs;
use std::path::Path;

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::core::error::{FormationError, Result};
use crate::formation::layout::CollisionMask;
use crate::formation::mover::MovementMode;
use crate::formation::shape::ShapeId;

/// Configuration for a single formation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FormationConfig {
    // === GRID ===
    /// Shape selected when the formation is created
    pub shape: ShapeId,

    /// Uniform stretch applied to every local offset (world units per table unit)
    pub scale: f32,

    /// Show slot markers
    pub visualize: bool,

    /// Layers the ground probe may hit
    pub collision_mask: CollisionMask,

    /// World position the formation starts at
    pub origin: [f32; 3],

    // === MOVEMENT ===
    /// Integration strategy, fixed for the formation's lifetime
    pub movement_mode: MovementMode,

    /// Speed cap for velocity integration
    ///
    /// Keep this a little above the anchor's own top speed so units can
    /// close gaps while the anchor is cruising.
    pub maximum_velocity: f32,

    /// Acceleration magnitude for velocity integration
    pub maximum_acceleration: f32,

    /// Downward acceleration for controller integration
    pub gravity: f32,

    pub use_gravity: bool,

    /// Acceleration multiplier for units further than 5x the anchor's
    /// end-reached distance from their slot. Must exceed 1.
    pub straggler_boost: f32,

    /// Rate for slerping formation and unit rotation toward the anchor
    pub rotation_smoothing: f32,

    // === JITTER ===
    /// Radius of the random offset disk (0 disables jitter)
    pub jitter_radius: f32,

    /// Shortest time between jitter re-draws
    pub jitter_interval_min: f32,

    /// Longest time between jitter re-draws
    pub jitter_interval_max: f32,

    // === DISBAND ===
    /// Time units spent scattering before movement stops
    pub disband_duration: f32,

    /// Radius of the scatter sphere around each slot
    pub disband_radius: f32,

    // === AUDIO ===
    pub has_sound: bool,

    /// Seed for jitter and disband randomness
    pub seed: u64,
}

impl Default for FormationConfig {
    fn default() -> Self {
        Self {
            shape: ShapeId::None,
            scale: 2.0,
            visualize: true,
            collision_mask: CollisionMask::ALL,
            origin: [0.0, 0.0, 0.0],

            movement_mode: MovementMode::ControllerIntegration,
            maximum_velocity: 4.0,
            maximum_acceleration: 10.0,
            gravity: 9.8,
            use_gravity: true,
            straggler_boost: 1.2,
            rotation_smoothing: 2.0,

            jitter_radius: 0.2,
            jitter_interval_min: 2.0,
            jitter_interval_max: 4.0,

            disband_duration: 3.0,
            disband_radius: 3.0,

            has_sound: true,
            seed: 0,
        }
    }
}

impl FormationConfig {
    /// Create a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_shape(mut self, shape: ShapeId) -> Self {
        self.shape = shape;
        self
    }

    pub fn with_movement_mode(mut self, mode: MovementMode) -> Self {
        self.movement_mode = mode;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Disable jitter so layouts are exactly the scaled shape table
    pub fn without_jitter(mut self) -> Self {
        self.jitter_radius = 0.0;
        self
    }

    pub fn origin(&self) -> Vec3 {
        Vec3::from_array(self.origin)
    }

    /// Parse a config from TOML text and validate it
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: FormationConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a config from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Validate configuration for internal consistency
    pub fn validate(&self) -> Result<()> {
        if self.scale <= 0.0 {
            return Err(FormationError::InvalidConfig(format!(
                "scale ({}) must be positive",
                self.scale
            )));
        }

        if self.jitter_interval_min > self.jitter_interval_max {
            return Err(FormationError::InvalidConfig(format!(
                "jitter_interval_min ({}) should be <= jitter_interval_max ({})",
                self.jitter_interval_min, self.jitter_interval_max
            )));
        }

        if self.straggler_boost <= 1.0 {
            return Err(FormationError::InvalidConfig(format!(
                "straggler_boost ({}) must be greater than 1",
                self.straggler_boost
            )));
        }

        if self.disband_duration <= 0.0 {
            return Err(FormationError::InvalidConfig(
                "disband_duration must be positive".into(),
            ));
        }

        if self.jitter_radius < 0.0
            || self.disband_radius < 0.0
            || self.rotation_smoothing < 0.0
            || self.maximum_velocity < 0.0
            || self.maximum_acceleration < 0.0
        {
            return Err(FormationError::InvalidConfig(
                "radii, rates and movement limits must not be negative".into(),
            ));
        }

        Ok(())
    }
}
