//! In-process collaborators for headless runs and tests
//!
//! Stand-ins for the host services a formation talks to: ground queries,
//! anchor navigation back-ends, units exposing every capability and an
//! audio driver that records its cues.

pub mod ground;
pub mod navigation;
pub mod unit;

pub use ground::{FlatGround, HeightField, NoGround};
pub use navigation::{DirectNavigator, WaypointNavigator};
pub use unit::{AgentNavigator, AnimationRecorder, RecordingAudio, SimUnit};
