//! Simulated unit and per-unit collaborators

use std::cell::RefCell;
use std::rc::Rc;

use glam::{Quat, Vec3};

use crate::core::types::UnitId;
use crate::formation::grid::AudioCueDriver;
use crate::formation::unit::{
    AnimationDriver, FormationUnit, KinematicMover, PhysicsBody, UnitNavigator,
};

/// Records animation calls
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnimationRecorder {
    pub playing: bool,
    pub starts: u32,
    pub stops: u32,
    pub last_velocity: Vec3,
}

impl AnimationDriver for AnimationRecorder {
    fn set_velocity(&mut self, velocity: Vec3) {
        self.last_velocity = velocity;
    }

    fn start_animations(&mut self) {
        self.playing = true;
        self.starts += 1;
    }

    fn stop_animations(&mut self) {
        self.playing = false;
        self.stops += 1;
    }
}

/// Unit-level agent that walks straight to its destination when active
#[derive(Debug, Clone, PartialEq)]
pub struct AgentNavigator {
    pub destination: Option<Vec3>,
    pub active: bool,
    pub speed: f32,
    pub velocity: Vec3,
}

impl AgentNavigator {
    pub fn new(speed: f32) -> Self {
        Self {
            destination: None,
            active: false,
            speed,
            velocity: Vec3::ZERO,
        }
    }

    /// Displacement for this step
    fn step(&mut self, from: Vec3, dt: f32) -> Vec3 {
        let Some(destination) = self.destination.filter(|_| self.active) else {
            self.velocity = Vec3::ZERO;
            return Vec3::ZERO;
        };

        let to_target = destination - from;
        let distance = to_target.length();
        if distance <= self.speed * dt {
            self.velocity = Vec3::ZERO;
            return to_target;
        }
        self.velocity = to_target / distance * self.speed;
        self.velocity * dt
    }
}

impl UnitNavigator for AgentNavigator {
    fn set_destination(&mut self, destination: Vec3) {
        self.destination = Some(destination);
    }

    fn resume(&mut self) {
        self.active = true;
    }

    fn stop(&mut self) {
        self.active = false;
        self.velocity = Vec3::ZERO;
    }

    fn velocity(&self) -> Vec3 {
        self.velocity
    }
}

/// Unit exposing every capability a formation can use
#[derive(Debug, Clone)]
pub struct SimUnit {
    pub id: UnitId,
    pub position: Vec3,
    pub rotation: Quat,
    /// Rigid-body velocity
    pub velocity: Vec3,
    pub grounded: bool,
    /// Lowest height a kinematic move may reach
    pub floor: Option<f32>,
    pub clearance: f32,
    kinematic: bool,
    body: bool,
    pub animation: Option<AnimationRecorder>,
    pub navigator: Option<AgentNavigator>,
}

impl SimUnit {
    fn base(position: Vec3) -> Self {
        Self {
            id: UnitId::new(),
            position,
            rotation: Quat::IDENTITY,
            velocity: Vec3::ZERO,
            grounded: true,
            floor: Some(position.y),
            clearance: 0.0,
            kinematic: false,
            body: false,
            animation: Some(AnimationRecorder::default()),
            navigator: Some(AgentNavigator::new(3.5)),
        }
    }

    /// Unit moved through a kinematic controller
    pub fn kinematic(position: Vec3) -> Self {
        Self {
            kinematic: true,
            ..Self::base(position)
        }
    }

    /// Unit moved through its rigid-body velocity
    pub fn rigid_body(position: Vec3) -> Self {
        Self {
            body: true,
            ..Self::base(position)
        }
    }

    pub fn with_clearance(mut self, clearance: f32) -> Self {
        self.clearance = clearance;
        self
    }

    /// Not touching the ground and nothing to land on
    pub fn airborne(mut self) -> Self {
        self.grounded = false;
        self.floor = None;
        self
    }

    pub fn without_animation(mut self) -> Self {
        self.animation = None;
        self
    }

    pub fn without_navigator(mut self) -> Self {
        self.navigator = None;
        self
    }

    /// Advance the unit's own motion: rigid-body drift and the agent walk
    pub fn step(&mut self, dt: f32) {
        if self.body {
            self.position += self.velocity * dt;
        }
        if let Some(navigator) = self.navigator.as_mut() {
            let delta = navigator.step(self.position, dt);
            self.position += delta;
        }
    }
}

impl KinematicMover for SimUnit {
    fn move_by(&mut self, delta: Vec3) {
        self.position += delta;
        if let Some(floor) = self.floor {
            if self.position.y <= floor {
                self.position.y = floor;
                self.grounded = true;
            } else {
                self.grounded = false;
            }
        }
    }

    fn is_grounded(&self) -> bool {
        self.grounded
    }
}

impl PhysicsBody for SimUnit {
    fn velocity(&self) -> Vec3 {
        self.velocity
    }

    fn set_velocity(&mut self, velocity: Vec3) {
        self.velocity = velocity;
    }
}

impl FormationUnit for SimUnit {
    fn id(&self) -> UnitId {
        self.id
    }

    fn position(&self) -> Vec3 {
        self.position
    }

    fn rotation(&self) -> Quat {
        self.rotation
    }

    fn set_rotation(&mut self, rotation: Quat) {
        self.rotation = rotation;
    }

    fn ground_clearance(&self) -> f32 {
        self.clearance
    }

    fn kinematic_mover(&mut self) -> Option<&mut dyn KinematicMover> {
        if self.kinematic {
            Some(self)
        } else {
            None
        }
    }

    fn physics_body(&mut self) -> Option<&mut dyn PhysicsBody> {
        if self.body {
            Some(self)
        } else {
            None
        }
    }

    fn animation(&mut self) -> Option<&mut dyn AnimationDriver> {
        self.animation
            .as_mut()
            .map(|animation| animation as &mut dyn AnimationDriver)
    }

    fn navigator(&mut self) -> Option<&mut dyn UnitNavigator> {
        self.navigator
            .as_mut()
            .map(|navigator| navigator as &mut dyn UnitNavigator)
    }
}

/// Audio driver that keeps every mute cue it receives
#[derive(Debug, Clone, Default)]
pub struct RecordingAudio {
    cues: Rc<RefCell<Vec<bool>>>,
}

impl RecordingAudio {
    /// Shared view of the recorded cues (true = muted)
    pub fn cues(&self) -> Rc<RefCell<Vec<bool>>> {
        self.cues.clone()
    }
}

impl AudioCueDriver for RecordingAudio {
    fn set_muted(&mut self, muted: bool) {
        self.cues.borrow_mut().push(muted);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capabilities_by_constructor() {
        let mut kinematic = SimUnit::kinematic(Vec3::ZERO);
        let mut body = SimUnit::rigid_body(Vec3::ZERO);

        assert!(kinematic.kinematic_mover().is_some());
        assert!(kinematic.physics_body().is_none());
        assert!(body.physics_body().is_some());
        assert!(body.kinematic_mover().is_none());
    }

    #[test]
    fn test_move_by_clamps_to_floor() {
        let mut unit = SimUnit::kinematic(Vec3::new(0.0, 1.0, 0.0));
        unit.move_by(Vec3::new(1.0, -5.0, 0.0));

        assert_eq!(unit.position, Vec3::new(1.0, 1.0, 0.0));
        assert!(unit.is_grounded());
    }

    #[test]
    fn test_agent_walks_when_active() {
        let mut unit = SimUnit::kinematic(Vec3::ZERO);
        let agent = unit.navigator.as_mut().unwrap();
        agent.set_destination(Vec3::new(10.0, 0.0, 0.0));
        unit.step(1.0);
        assert_eq!(unit.position, Vec3::ZERO);

        unit.navigator.as_mut().unwrap().resume();
        unit.step(1.0);
        assert!((unit.position.x - 3.5).abs() < 1e-5);
        assert!((unit.navigator.as_ref().unwrap().velocity().x - 3.5).abs() < 1e-5);
    }

    #[test]
    fn test_rigid_body_drifts() {
        let mut unit = SimUnit::rigid_body(Vec3::ZERO).without_navigator();
        unit.velocity = Vec3::new(0.0, 0.0, 2.0);
        unit.step(0.5);
        assert_eq!(unit.position, Vec3::new(0.0, 0.0, 1.0));
    }

    #[test]
    fn test_recording_audio_shares_cues() {
        let mut audio = RecordingAudio::default();
        let cues = audio.cues();
        audio.set_muted(true);
        audio.set_muted(false);
        assert_eq!(*cues.borrow(), vec![true, false]);
    }
}
