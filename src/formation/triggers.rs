//! Proximity triggers
//!
//! Triggers sit at a fixed point, poll the registry every `period` and act
//! on formations closer than `range`.

use glam::Vec3;

use crate::core::types::FormationId;
use crate::formation::grid::FormationState;
use crate::formation::registry::FormationRegistry;
use crate::formation::shape::ShapeId;

/// External named-parameter target, e.g. an animator
pub trait ParameterSink {
    fn set_bool(&mut self, name: &str, value: bool);
}

#[derive(Debug, Clone, Copy)]
struct PollClock {
    period: f32,
    elapsed: f32,
}

impl PollClock {
    fn new(period: f32) -> Self {
        Self {
            period,
            elapsed: 0.0,
        }
    }

    fn advance(&mut self, dt: f32) -> bool {
        self.elapsed += dt;
        if self.elapsed < self.period {
            return false;
        }
        self.elapsed = 0.0;
        true
    }
}

/// Reshapes formations that come within range
#[derive(Debug, Clone)]
pub struct ShapeTrigger {
    pub position: Vec3,
    pub shape: ShapeId,
    pub range: f32,
    /// Delay between re-forming and moving on
    pub wait_for_move: f32,
    /// Restore the previous shape once a formation leaves range
    pub revert_on_exit: bool,
    clock: PollClock,
    /// Formations reshaped by this trigger, with their previous shape
    affected: Vec<(FormationId, ShapeId)>,
}

impl ShapeTrigger {
    pub fn new(position: Vec3, shape: ShapeId) -> Self {
        Self {
            position,
            shape,
            range: 5.0,
            wait_for_move: 3.0,
            revert_on_exit: true,
            clock: PollClock::new(0.8),
            affected: Vec::new(),
        }
    }

    pub fn with_range(mut self, range: f32) -> Self {
        self.range = range;
        self
    }

    pub fn with_wait_for_move(mut self, wait: f32) -> Self {
        self.wait_for_move = wait;
        self
    }

    pub fn with_period(mut self, period: f32) -> Self {
        self.clock = PollClock::new(period);
        self
    }

    pub fn with_revert_on_exit(mut self, revert: bool) -> Self {
        self.revert_on_exit = revert;
        self
    }

    pub fn affected(&self) -> &[(FormationId, ShapeId)] {
        &self.affected
    }

    /// Poll the registry. Returns how many formations were reshaped.
    pub fn update(&mut self, dt: f32, registry: &FormationRegistry) -> usize {
        if !self.clock.advance(dt) {
            return 0;
        }

        let mut changed = 0;
        for shared in registry.within_range(self.position, self.range) {
            let mut formation = shared.borrow_mut();
            if formation.shape() == self.shape {
                continue;
            }

            let id = formation.id();
            if !self.affected.iter().any(|(fid, _)| *fid == id) {
                self.affected.push((id, formation.shape()));
            }
            tracing::debug!(formation = %id, shape = ?self.shape, "formation entered shape trigger");
            formation.set_shape(self.shape);
            formation.change_state(FormationState::Forming);
            formation.schedule_state_change(FormationState::Moving, self.wait_for_move);
            changed += 1;
        }

        if self.revert_on_exit {
            let (position, range, wait) = (self.position, self.range, self.wait_for_move);
            self.affected.retain(|(id, previous)| {
                let Some(shared) = registry.get(*id) else {
                    return false;
                };
                let mut formation = shared.borrow_mut();
                if formation.pose().position.distance(position) <= range {
                    return true;
                }
                tracing::debug!(formation = %id, shape = ?previous, "formation left shape trigger");
                formation.set_shape(*previous);
                formation.change_state(FormationState::Forming);
                formation.schedule_state_change(FormationState::Moving, wait);
                changed += 1;
                false
            });
        }

        changed
    }
}

/// Sets a named boolean when any formation is within range
#[derive(Debug, Clone)]
pub struct AnimationTrigger {
    pub position: Vec3,
    pub range: f32,
    pub parameter: String,
    pub value: bool,
    clock: PollClock,
}

impl AnimationTrigger {
    pub fn new(position: Vec3, parameter: impl Into<String>, value: bool) -> Self {
        Self {
            position,
            range: 5.0,
            parameter: parameter.into(),
            value,
            clock: PollClock::new(0.8),
        }
    }

    pub fn with_range(mut self, range: f32) -> Self {
        self.range = range;
        self
    }

    pub fn with_period(mut self, period: f32) -> Self {
        self.clock = PollClock::new(period);
        self
    }

    /// Poll the registry; true when the parameter was set this call
    pub fn update(&mut self, dt: f32, registry: &FormationRegistry, sink: &mut dyn ParameterSink) -> bool {
        if !self.clock.advance(dt) {
            return false;
        }
        if registry.within_range(self.position, self.range).is_empty() {
            return false;
        }
        sink.set_bool(&self.parameter, self.value);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::FormationConfig;
    use crate::formation::anchor::{AnchorAdapter, NavigationProvider};
    use crate::formation::grid::Formation;
    use crate::formation::registry::SharedFormation;
    use crate::sim::{DirectNavigator, FlatGround};
    use ahash::AHashMap;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Default)]
    struct Params(AHashMap<String, bool>);

    impl ParameterSink for Params {
        fn set_bool(&mut self, name: &str, value: bool) {
            self.0.insert(name.to_string(), value);
        }
    }

    fn setup(x: f32) -> (FormationRegistry, SharedFormation, Rc<RefCell<DirectNavigator>>) {
        let mut config = FormationConfig::new().with_shape(ShapeId::Box9);
        config.origin = [x, 0.0, 0.0];
        let mut formation = Formation::new(config, Box::new(FlatGround::new(0.0))).unwrap();
        let nav = Rc::new(RefCell::new(DirectNavigator::new(Vec3::ZERO, 2.0)));
        formation.set_anchor(AnchorAdapter::new(nav.clone()).with_target(Vec3::new(50.0, 0.0, 0.0)));

        let mut registry = FormationRegistry::new();
        let shared = registry.insert(formation).unwrap();
        (registry, shared, nav)
    }

    #[test]
    fn test_poll_waits_for_period() {
        let (registry, shared, _nav) = setup(0.0);
        let mut trigger = ShapeTrigger::new(Vec3::ZERO, ShapeId::Column10).with_period(1.0);

        assert_eq!(trigger.update(0.5, &registry), 0);
        assert_eq!(shared.borrow().shape(), ShapeId::Box9);
        assert_eq!(trigger.update(0.5, &registry), 1);
        assert_eq!(shared.borrow().shape(), ShapeId::Column10);
    }

    #[test]
    fn test_reshape_forms_then_moves() {
        let (registry, shared, _nav) = setup(0.0);
        let mut trigger = ShapeTrigger::new(Vec3::ZERO, ShapeId::Column10)
            .with_period(0.1)
            .with_wait_for_move(0.5);

        trigger.update(0.1, &registry);
        assert_eq!(shared.borrow().state(), FormationState::Forming);
        assert!(shared.borrow().has_scheduled());

        for _ in 0..6 {
            shared.borrow_mut().tick(0.1);
        }
        assert_eq!(shared.borrow().state(), FormationState::Moving);
    }

    #[test]
    fn test_out_of_range_untouched() {
        let (registry, shared, _nav) = setup(20.0);
        let mut trigger = ShapeTrigger::new(Vec3::ZERO, ShapeId::Column10).with_period(0.1);

        assert_eq!(trigger.update(0.1, &registry), 0);
        assert_eq!(shared.borrow().shape(), ShapeId::Box9);
    }

    #[test]
    fn test_revert_on_exit() {
        let (registry, shared, nav) = setup(0.0);
        let mut trigger = ShapeTrigger::new(Vec3::ZERO, ShapeId::Line8).with_period(0.1);
        trigger.update(0.1, &registry);
        assert_eq!(trigger.affected().len(), 1);

        // Formation follows the anchor out of range
        shared.borrow_mut().change_state(FormationState::Moving);
        nav.borrow_mut().warp(Vec3::new(30.0, 0.0, 0.0));
        shared.borrow_mut().tick(0.1);

        trigger.update(0.1, &registry);
        assert_eq!(shared.borrow().shape(), ShapeId::Box9);
        assert!(trigger.affected().is_empty());
    }

    #[test]
    fn test_animation_trigger_sets_parameter() {
        let (registry, _shared, _nav) = setup(2.0);
        let mut trigger = AnimationTrigger::new(Vec3::ZERO, "open", true).with_period(0.1);
        let mut params = Params::default();

        assert!(trigger.update(0.1, &registry, &mut params));
        assert_eq!(params.0.get("open"), Some(&true));
    }

    #[test]
    fn test_animation_trigger_ignores_distant() {
        let (registry, _shared, _nav) = setup(40.0);
        let mut trigger = AnimationTrigger::new(Vec3::ZERO, "open", true).with_period(0.1);
        let mut params = Params::default();

        assert!(!trigger.update(0.1, &registry, &mut params));
        assert!(params.0.is_empty());
    }
}
