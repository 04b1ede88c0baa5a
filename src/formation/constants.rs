//! Formation tuning constants
//!
//! Epsilons and fixed ramps that are not worth exposing in the config.

/// Anchor displacement (world units) below which the grid is not recomputed
pub const POSITION_EPSILON: f32 = 0.001;

/// Anchor rotation delta (radians, ~0.01 degrees) below which the grid is not recomputed
pub const ROTATION_EPSILON: f32 = 0.000_174_5;

/// Height above a candidate point the ground probe starts from.
/// Assumed to cover the terrain relief inside the formation's footprint.
pub const GROUND_PROBE_LIFT: f32 = 100.0;

/// Time units a slot takes to blend from its old jitter offset to the new one
pub const JITTER_RAMP_DURATION: f32 = 1.0;

/// Deceleration band, as a multiple of the anchor's end-reached distance.
/// Beyond it a unit counts as a straggler.
pub const DECELERATION_BAND: f32 = 5.0;

/// End-reached distance used when the anchor does not override it
pub const DEFAULT_END_REACHED_DISTANCE: f32 = 0.2;

/// Entries a formation's event log holds before dropping the oldest
pub const EVENT_LOG_CAPACITY: usize = 1024;

/// Smallest tick length used when deriving a velocity from a displacement
pub const MIN_VELOCITY_DT: f32 = 1e-5;
