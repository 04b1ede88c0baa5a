//! Formation system - units travelling together behind a moving anchor
//!
//! A formation resolves one slot per shape point around its anchor, binds
//! units to slots by index and integrates each unit toward its slot.
//!
//! Tick order (variable rate):
//! - Deferred state changes
//! - Anchor sample and arrival
//! - Dirty detection, rotation smoothing, jitter, slot recompute
//! - Controller integration and animation push
//!
//! Velocity integration runs on the fixed-rate tick only.

pub mod anchor;
pub mod assignment;
pub mod constants;
pub mod events;
pub mod grid;
pub mod layout;
pub mod mover;
pub mod registry;
pub mod schedule;
pub mod shape;
pub mod slot;
pub mod triggers;
pub mod unit;

// Re-exports for convenient access
pub use anchor::{AnchorAdapter, NavigationProvider, SharedNavigator};
pub use assignment::{AssignmentReport, UnitAssignmentManager};
pub use constants::*;
pub use events::{FormationEvent, FormationEventLog, FormationEventType};
pub use grid::{AudioCueDriver, Formation, FormationState, TickReport};
pub use layout::{CollisionMask, GridLayoutEngine, GroundQuery, JitterSchedule};
pub use mover::{
    deceleration_multiplier, ControllerIntegration, MovementMode, MovementParams,
    MovementStrategy, StepContext, VelocityIntegration,
};
pub use registry::{FormationRegistry, SharedFormation};
pub use schedule::{ScheduledId, Scheduler};
pub use shape::{CustomShape, ShapeId, ShapeTable};
pub use slot::{Jitter, Occupancy, Slot, SlotBinding, SlotId};
pub use triggers::{AnimationTrigger, ParameterSink, ShapeTrigger};
pub use unit::{
    share, AnimationDriver, Capability, FormationUnit, KinematicMover, PhysicsBody, UnitNavigator,
    UnitRef,
};
