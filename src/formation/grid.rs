//! Formation orchestrator
//!
//! Owns the slot arena, the state machine and the per-formation movement
//! strategy. The host drives it through two entry points:
//! - `tick(dt)` in the variable-rate domain: deferred transitions, arrival,
//!   dirty detection, rotation smoothing, slot recompute, controller
//!   movement, animation push and the disband timer.
//! - `fixed_tick(dt)` in the fixed-rate domain: velocity integration only.
//!
//! Every reported problem is logged and the formation keeps ticking.

use std::f32::consts::{PI, TAU};

use glam::{Quat, Vec3};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::core::config::FormationConfig;
use crate::core::error::{FormationError, Result};
use crate::core::types::{yaw_of, FormationId, Pose, Tick, UnitId};
use crate::formation::anchor::AnchorAdapter;
use crate::formation::assignment::{AssignmentReport, UnitAssignmentManager};
use crate::formation::constants::{POSITION_EPSILON, ROTATION_EPSILON};
use crate::formation::events::{FormationEvent, FormationEventLog, FormationEventType};
use crate::formation::layout::{random_in_unit_disk, GridLayoutEngine, GroundQuery, JitterSchedule};
use crate::formation::mover::{MovementMode, MovementParams, MovementStrategy, StepContext};
use crate::formation::schedule::{ScheduledId, Scheduler};
use crate::formation::shape::{CustomShape, ShapeId, ShapeTable};
use crate::formation::slot::{Slot, SlotId};
use crate::formation::unit::UnitRef;

/// Formation lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum FormationState {
    /// Static; units walk to their own slots
    #[default]
    Forming,
    /// Anchor travels; the formation drives unit positions
    Moving,
    /// Anchor stopped at its target
    Arrived,
    /// Units scatter, then stop
    Disbanding,
}

/// Mute signal for the formation's sound source
pub trait AudioCueDriver {
    fn set_muted(&mut self, muted: bool);
}

/// What happened during one variable-rate tick
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TickReport {
    pub recomputed: bool,
    pub arrived: bool,
    pub disband_completed: bool,
    /// Deferred state changes applied at the start of the tick
    pub deferred_applied: usize,
}

pub struct Formation {
    id: FormationId,
    config: FormationConfig,
    state: FormationState,
    shape: ShapeId,
    custom_shape: Option<CustomShape>,
    slots: Vec<Slot>,

    layout: GridLayoutEngine,
    assignment: UnitAssignmentManager,
    mover: Box<dyn MovementStrategy>,
    anchor: Option<AnchorAdapter>,
    ground: Box<dyn GroundQuery>,
    audio: Option<Box<dyn AudioCueDriver>>,
    audio_muted: bool,

    rng: ChaCha8Rng,
    /// Pose at the last recompute; dirty detection compares the anchor to it
    pose: Pose,
    old_yaw: f32,
    jitter_schedule: JitterSchedule,

    disband_timer: f32,
    disbanded: bool,
    navigation_enabled: bool,
    animation_enabled: bool,

    tick: Tick,
    scheduler: Scheduler<FormationState>,
    events: FormationEventLog,
}

impl Formation {
    /// Build a formation from a validated config. Slots for the configured
    /// shape are created and positioned around the config origin.
    pub fn new(config: FormationConfig, ground: Box<dyn GroundQuery>) -> Result<Self> {
        config.validate()?;

        let mode = config.movement_mode;
        let pose = Pose::new(config.origin(), Quat::IDENTITY);
        let mut formation = Self {
            id: FormationId::new(),
            state: FormationState::Forming,
            shape: config.shape,
            custom_shape: None,
            slots: Vec::new(),
            layout: GridLayoutEngine::new(config.scale, config.collision_mask),
            assignment: UnitAssignmentManager::new(mode.required_capability()),
            mover: mode.strategy(&MovementParams::from(&config)),
            anchor: None,
            ground,
            audio: None,
            audio_muted: false,
            rng: ChaCha8Rng::seed_from_u64(config.seed),
            pose,
            old_yaw: 0.0,
            jitter_schedule: JitterSchedule::new(
                config.jitter_interval_min,
                config.jitter_interval_max,
            ),
            disband_timer: 0.0,
            disbanded: false,
            navigation_enabled: false,
            animation_enabled: false,
            tick: 0,
            scheduler: Scheduler::new(),
            events: FormationEventLog::new(),
            config,
        };

        formation.slots = formation.build_slots();
        formation.recompute_positions();
        tracing::debug!(
            formation = %formation.id,
            shape = ?formation.shape,
            slots = formation.slots.len(),
            "formation created"
        );
        Ok(formation)
    }

    /// Attach a sound source. Ignored when the config has sound disabled.
    pub fn with_audio(mut self, audio: Box<dyn AudioCueDriver>) -> Self {
        if self.config.has_sound {
            self.audio = Some(audio);
        } else {
            tracing::debug!(formation = %self.id, "sound disabled, audio driver dropped");
        }
        self
    }

    // === ACCESSORS ===

    pub fn id(&self) -> FormationId {
        self.id
    }

    pub fn config(&self) -> &FormationConfig {
        &self.config
    }

    pub fn state(&self) -> FormationState {
        self.state
    }

    pub fn shape(&self) -> ShapeId {
        self.shape
    }

    pub fn custom_shape(&self) -> Option<&CustomShape> {
        self.custom_shape.as_ref()
    }

    pub fn movement_mode(&self) -> MovementMode {
        self.mover.mode()
    }

    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    pub fn slot(&self, id: SlotId) -> Option<&Slot> {
        self.slots.get(id)
    }

    /// Formation's own position and rotation
    pub fn pose(&self) -> Pose {
        self.pose
    }

    pub fn anchor(&self) -> Option<&AnchorAdapter> {
        self.anchor.as_ref()
    }

    pub fn anchor_mut(&mut self) -> Option<&mut AnchorAdapter> {
        self.anchor.as_mut()
    }

    pub fn audio_muted(&self) -> bool {
        self.audio_muted
    }

    pub fn disband_timer(&self) -> f32 {
        self.disband_timer
    }

    /// Disband finished and units were stopped
    pub fn is_disbanded(&self) -> bool {
        self.disbanded
    }

    /// Per-unit navigation agents are steering toward slots
    pub fn navigation_enabled(&self) -> bool {
        self.navigation_enabled
    }

    pub fn animation_enabled(&self) -> bool {
        self.animation_enabled
    }

    /// Variable-rate ticks processed so far
    pub fn tick_count(&self) -> Tick {
        self.tick
    }

    pub fn assigned_units(&self) -> Vec<UnitId> {
        self.slots.iter().filter_map(|s| s.unit_id()).collect()
    }

    /// Events since the last drain. The log is bounded, so hosts that need
    /// every event call `drain_events` each tick.
    pub fn events(&self) -> &FormationEventLog {
        &self.events
    }

    pub fn drain_events(&mut self) -> Vec<FormationEvent> {
        self.events.drain()
    }

    // === COMMANDS ===

    /// Bind the anchor, align it with the formation and refresh the layout
    pub fn set_anchor(&mut self, mut anchor: AnchorAdapter) {
        anchor.warp(self.pose.position);
        let rotation = anchor.rotation();
        self.anchor = Some(anchor);

        self.recompute_positions();
        self.old_yaw = yaw_of(rotation);

        self.log_event(FormationEventType::AnchorBound, "anchor bound".to_string());
    }

    /// Select a predefined shape. Bound units are carried over by slot order.
    pub fn set_shape(&mut self, shape: ShapeId) {
        let from = self.shape;
        let units = UnitAssignmentManager::collect_assigned(&self.slots);

        self.shape = shape;
        let fresh = self.build_slots();
        let mut old = std::mem::replace(&mut self.slots, fresh);
        UnitAssignmentManager::release_all(&mut old);
        drop(old);

        self.log_event(
            FormationEventType::ShapeChanged {
                from,
                to: shape,
                slots: self.slots.len(),
            },
            format!("shape {:?} -> {:?}", from, shape),
        );

        if !units.is_empty() {
            self.assign_units_detailed(units);
        } else {
            self.recompute_positions();
        }
    }

    /// Install an externally supplied table and switch to it
    pub fn set_custom_shape(&mut self, shape: CustomShape) {
        self.custom_shape = Some(shape);
        self.set_shape(ShapeId::Custom);
    }

    /// Toggle slot markers
    pub fn set_visualize(&mut self, visible: bool) {
        self.config.visualize = visible;
        for slot in &mut self.slots {
            slot.set_visible(visible);
        }
    }

    /// Bind units to slots by index. False on any reported problem; the
    /// fitting units are bound regardless.
    pub fn assign_units(&mut self, units: Vec<UnitRef>) -> bool {
        self.assign_units_detailed(units).success()
    }

    pub fn assign_units_detailed(&mut self, units: Vec<UnitRef>) -> AssignmentReport {
        let report = self.assignment.assign(&mut self.slots, units);
        for error in &report.errors {
            self.report_error(error);
        }

        self.recompute_positions();
        for slot in &self.slots {
            let Some(unit) = slot.unit() else {
                continue;
            };
            let mut unit = unit.borrow_mut();
            if let Some(navigator) = unit.navigator() {
                navigator.set_destination(slot.position());
                if self.navigation_enabled {
                    navigator.resume();
                }
            }
        }

        tracing::info!(
            formation = %self.id,
            assigned = report.assigned.len(),
            unassigned = report.unassigned.len(),
            "units assigned"
        );
        self.log_event(
            FormationEventType::UnitsAssigned {
                assigned: report.assigned.len(),
                unassigned: report.unassigned.len(),
            },
            format!("{} units assigned", report.assigned.len()),
        );
        report
    }

    pub fn unassign_unit(&mut self, unit_id: UnitId) -> bool {
        match UnitAssignmentManager::unassign(&mut self.slots, unit_id) {
            Some(slot) => {
                self.log_event(
                    FormationEventType::UnitUnassigned { unit_id },
                    format!("unit {} left slot {}", unit_id, slot),
                );
                true
            }
            None => false,
        }
    }

    /// Run a state transition and its side effects
    pub fn change_state(&mut self, target: FormationState) {
        let from = self.state;
        if self.anchor.is_none() {
            self.report_error(&FormationError::MissingAnchor);
        }
        tracing::info!(formation = %self.id, from = ?from, to = ?target, "changing state");

        match target {
            FormationState::Forming => {
                if let Some(anchor) = self.anchor.as_mut() {
                    anchor.stop_move();
                }
                self.set_navigation(true);
                self.set_animation(true);
                self.set_muted(false);
            }
            FormationState::Moving => {
                if let Some(anchor) = self.anchor.as_mut() {
                    anchor.start_move();
                }
                self.set_navigation(false);
                self.set_animation(true);
                self.set_muted(false);
            }
            FormationState::Arrived => {
                if let Some(anchor) = self.anchor.as_mut() {
                    anchor.stop_move();
                }
                self.set_navigation(false);
                self.set_animation(false);
                self.set_muted(true);
            }
            FormationState::Disbanding => {
                self.disband_timer = 0.0;
                self.disbanded = false;
                self.set_navigation(false);
                self.set_animation(true);
                self.scatter_slots();
                self.set_navigation(true);
            }
        }

        self.state = target;
        self.log_event(
            FormationEventType::StateChanged { from, to: target },
            format!("{:?} -> {:?}", from, target),
        );
    }

    /// Queue a transition to run `delay` time units from now
    pub fn schedule_state_change(&mut self, target: FormationState, delay: f32) -> ScheduledId {
        let id = self.scheduler.schedule(delay, target);
        tracing::debug!(formation = %self.id, to = ?target, delay, "state change scheduled");
        id
    }

    pub fn cancel_scheduled(&mut self, id: ScheduledId) -> bool {
        self.scheduler.cancel(id)
    }

    pub fn has_scheduled(&self) -> bool {
        !self.scheduler.is_empty()
    }

    /// Re-resolve every slot from the current pose
    pub fn recompute_positions(&mut self) {
        self.layout
            .recompute_all(&mut self.slots, &self.pose, self.ground.as_ref());
    }

    // === TICKS ===

    /// Variable-rate tick
    pub fn tick(&mut self, dt: f32) -> TickReport {
        let mut report = TickReport::default();
        self.tick += 1;

        for (_, target) in self.scheduler.advance(dt) {
            self.change_state(target);
            report.deferred_applied += 1;
        }

        let Some(anchor) = self.anchor.as_mut() else {
            return report;
        };
        anchor.update(dt);

        match self.state {
            FormationState::Forming => self.push_navigator_velocities(),
            FormationState::Moving => self.tick_moving(dt, &mut report),
            FormationState::Arrived => {}
            FormationState::Disbanding => self.tick_disbanding(dt, &mut report),
        }

        report
    }

    /// Fixed-rate tick. Only velocity integration acts here.
    pub fn fixed_tick(&mut self, dt: f32) {
        if self.state != FormationState::Moving {
            return;
        }
        let Some(anchor) = self.anchor.as_ref() else {
            return;
        };

        let ctx = StepContext {
            dt,
            end_reached_distance: anchor.end_reached_distance(),
        };
        for slot in &mut self.slots {
            self.mover.fixed_step(slot, &ctx);
        }
    }

    fn tick_moving(&mut self, dt: f32, report: &mut TickReport) {
        let Some(anchor) = self.anchor.as_mut() else {
            return;
        };

        if anchor.check_arrival() {
            report.arrived = true;
            self.log_event(FormationEventType::AnchorArrived, "anchor arrived".to_string());
            self.change_state(FormationState::Arrived);
            return;
        }

        let anchor_position = anchor.position();
        let anchor_rotation = anchor.rotation();
        let ctx = StepContext {
            dt,
            end_reached_distance: anchor.end_reached_distance(),
        };

        let position_dirty =
            self.pose.position.distance_squared(anchor_position) > POSITION_EPSILON * POSITION_EPSILON;
        let rotation_dirty = yaw_delta(yaw_of(anchor_rotation), self.old_yaw) > ROTATION_EPSILON;

        let blend = (dt * self.config.rotation_smoothing).clamp(0.0, 1.0);
        if rotation_dirty {
            self.pose.rotation = self.pose.rotation.slerp(anchor_rotation, blend);
        }
        for slot in &self.slots {
            let Some(unit) = slot.unit() else {
                continue;
            };
            let mut unit = unit.borrow_mut();
            let current = unit.rotation();
            if current.angle_between(anchor_rotation) > ROTATION_EPSILON {
                unit.set_rotation(current.slerp(anchor_rotation, blend));
            }
        }

        if position_dirty || rotation_dirty {
            self.pose.position = anchor_position;
            self.advance_jitter(dt);
            self.recompute_positions();
            report.recomputed = true;
            self.log_event(
                FormationEventType::PositionsRecomputed,
                "slot positions recomputed".to_string(),
            );
        }

        for slot in &mut self.slots {
            self.mover.variable_step(slot, &ctx);
        }

        for slot in &self.slots {
            let Some(binding) = slot.binding() else {
                continue;
            };
            if !binding.has_animation {
                continue;
            }
            let mut unit = binding.unit.borrow_mut();
            if let Some(animation) = unit.animation() {
                animation.set_velocity(slot.assigned_velocity());
            }
        }

        self.old_yaw = self.pose.yaw();
    }

    fn tick_disbanding(&mut self, dt: f32, report: &mut TickReport) {
        self.disband_timer += dt;
        if self.disband_timer < self.config.disband_duration || self.disbanded {
            return;
        }

        self.set_navigation(false);
        self.set_animation(false);
        self.disbanded = true;
        report.disband_completed = true;
        tracing::info!(formation = %self.id, "disband complete");
        self.log_event(FormationEventType::DisbandCompleted, "units stopped".to_string());
    }

    /// While forming, animate with each unit's own agent velocity
    fn push_navigator_velocities(&mut self) {
        for slot in &self.slots {
            let Some(binding) = slot.binding() else {
                continue;
            };
            if !binding.has_animation {
                continue;
            }
            let mut unit = binding.unit.borrow_mut();
            let Some(velocity) = unit.navigator().map(|n| n.velocity()) else {
                continue;
            };
            if let Some(animation) = unit.animation() {
                animation.set_velocity(velocity);
            }
        }
    }

    // === SIDE EFFECTS ===

    fn build_slots(&mut self) -> Vec<Slot> {
        let (offsets, known) = ShapeTable::resolve(self.shape, self.custom_shape.as_ref());
        if !known {
            let error = match self.shape {
                ShapeId::Custom => FormationError::EmptyCustomShape,
                shape => FormationError::PlaceholderShape(shape),
            };
            self.report_error(&error);
        }

        offsets
            .into_iter()
            .enumerate()
            .map(|(id, offset)| {
                let mut slot = Slot::new(id, offset, self.config.jitter_radius);
                slot.set_visible(self.config.visualize);
                slot
            })
            .collect()
    }

    fn advance_jitter(&mut self, dt: f32) {
        if self.config.jitter_radius <= 0.0 {
            return;
        }
        if self.jitter_schedule.advance(dt, &mut self.rng) {
            for slot in &mut self.slots {
                let sample = random_in_unit_disk(&mut self.rng);
                slot.jitter_mut().retarget(sample);
            }
        }
        for slot in &mut self.slots {
            slot.jitter_mut().advance(dt);
        }
    }

    /// Send each occupied slot to a random point around its current
    /// position
    fn scatter_slots(&mut self) {
        for slot in &mut self.slots {
            if !slot.is_occupied() {
                continue;
            }
            let destination = self.layout.disband_destination(
                slot.position(),
                self.config.disband_radius,
                slot.clearance(),
                self.ground.as_ref(),
                &mut self.rng,
            );
            slot.set_disband_destination(destination);
            slot.set_position(destination);
        }
    }

    /// Enable or disable every bound unit's own navigation agent
    fn set_navigation(&mut self, enabled: bool) {
        self.navigation_enabled = enabled;
        let mut missing = Vec::new();

        for slot in &self.slots {
            let Some(binding) = slot.binding() else {
                continue;
            };
            let mut unit = binding.unit.borrow_mut();
            match unit.navigator() {
                Some(navigator) if enabled => {
                    navigator.set_destination(slot.position());
                    navigator.resume();
                }
                Some(navigator) => navigator.stop(),
                None if enabled => missing.push(binding.unit_id),
                None => {}
            }
            if !enabled {
                if let Some(body) = unit.physics_body() {
                    body.set_velocity(Vec3::ZERO);
                }
            }
        }

        for unit_id in missing {
            self.report_error(&FormationError::MissingNavigator(unit_id));
        }
    }

    fn set_animation(&mut self, enabled: bool) {
        self.animation_enabled = enabled;
        for slot in &self.slots {
            let Some(binding) = slot.binding() else {
                continue;
            };
            if !binding.has_animation {
                continue;
            }
            let mut unit = binding.unit.borrow_mut();
            if let Some(animation) = unit.animation() {
                if enabled {
                    animation.start_animations();
                } else {
                    animation.stop_animations();
                }
            }
        }
    }

    fn set_muted(&mut self, muted: bool) {
        self.audio_muted = muted;
        if let Some(audio) = self.audio.as_mut() {
            audio.set_muted(muted);
        }
    }

    fn report_error(&mut self, error: &FormationError) {
        tracing::warn!(formation = %self.id, error = %error, "formation error");
        self.log_event(
            FormationEventType::ErrorReported { kind: error.kind() },
            error.to_string(),
        );
    }

    fn log_event(&mut self, event_type: FormationEventType, description: String) {
        self.events.push(event_type, description, self.tick);
    }
}

/// Absolute yaw difference wrapped into [0, PI]
fn yaw_delta(a: f32, b: f32) -> f32 {
    let delta = (a - b).rem_euclid(TAU);
    if delta > PI {
        TAU - delta
    } else {
        delta
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formation::anchor::NavigationProvider;
    use crate::formation::unit::share;
    use crate::sim::{DirectNavigator, FlatGround, RecordingAudio, SimUnit};
    use std::cell::RefCell;
    use std::rc::Rc;

    fn formation(shape: ShapeId) -> Formation {
        let config = FormationConfig::new().with_shape(shape).without_jitter();
        Formation::new(config, Box::new(FlatGround::new(0.0))).unwrap()
    }

    fn anchored(shape: ShapeId) -> (Formation, Rc<RefCell<DirectNavigator>>) {
        let mut formation = formation(shape);
        let nav = Rc::new(RefCell::new(DirectNavigator::new(Vec3::ZERO, 2.0)));
        formation.set_anchor(AnchorAdapter::new(nav.clone()).with_target(Vec3::new(20.0, 0.0, 0.0)));
        (formation, nav)
    }

    fn units(count: usize) -> Vec<Rc<RefCell<SimUnit>>> {
        (0..count)
            .map(|i| share(SimUnit::kinematic(Vec3::new(i as f32, 0.0, -3.0))))
            .collect()
    }

    fn handles(units: &[Rc<RefCell<SimUnit>>]) -> Vec<UnitRef> {
        units.iter().map(|u| u.clone() as UnitRef).collect()
    }

    #[test]
    fn test_new_builds_configured_shape() {
        let formation = formation(ShapeId::Column10);
        assert_eq!(formation.slots().len(), 10);
        assert_eq!(formation.state(), FormationState::Forming);
    }

    #[test]
    fn test_placeholder_shape_degrades_to_single_point() {
        let mut formation = formation(ShapeId::Box9);
        formation.set_shape(ShapeId::Function);

        assert_eq!(formation.slots().len(), 1);
        assert_eq!(
            formation
                .events()
                .count(|e| matches!(e, FormationEventType::ErrorReported { .. })),
            1
        );
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = FormationConfig::new();
        config.scale = 0.0;
        assert!(Formation::new(config, Box::new(FlatGround::new(0.0))).is_err());
    }

    #[test]
    fn test_set_anchor_warps_provider() {
        let mut config = FormationConfig::new().with_shape(ShapeId::Box9);
        config.origin = [5.0, 0.0, 5.0];
        let mut formation = Formation::new(config, Box::new(FlatGround::new(0.0))).unwrap();
        let nav = Rc::new(RefCell::new(DirectNavigator::new(Vec3::ZERO, 2.0)));

        formation.set_anchor(AnchorAdapter::new(nav.clone()));

        assert_eq!(nav.borrow().position, Vec3::new(5.0, 0.0, 5.0));
    }

    #[test]
    fn test_change_state_without_anchor_reports() {
        let mut formation = formation(ShapeId::Box9);
        formation.change_state(FormationState::Moving);

        assert_eq!(formation.state(), FormationState::Moving);
        assert_eq!(
            formation
                .events()
                .count(|e| matches!(e, FormationEventType::ErrorReported { .. })),
            1
        );
        // Ticking without an anchor is a no-op
        let report = formation.tick(0.1);
        assert!(!report.recomputed);
    }

    #[test]
    fn test_audio_follows_state() {
        let (formation, _nav) = anchored(ShapeId::Box9);
        let audio = RecordingAudio::default();
        let cues = audio.cues();
        let mut formation = formation.with_audio(Box::new(audio));

        formation.change_state(FormationState::Moving);
        assert!(!formation.audio_muted());
        formation.change_state(FormationState::Arrived);
        assert!(formation.audio_muted());
        formation.change_state(FormationState::Disbanding);
        assert!(formation.audio_muted());

        assert_eq!(*cues.borrow(), vec![false, true]);
    }

    #[test]
    fn test_no_audio_when_sound_disabled() {
        let mut config = FormationConfig::new().with_shape(ShapeId::Box9);
        config.has_sound = false;
        let audio = RecordingAudio::default();
        let cues = audio.cues();
        let mut formation = Formation::new(config, Box::new(FlatGround::new(0.0)))
            .unwrap()
            .with_audio(Box::new(audio));

        formation.change_state(FormationState::Arrived);
        assert!(cues.borrow().is_empty());
        assert!(formation.audio_muted());
    }

    #[test]
    fn test_forming_enables_unit_navigation() {
        let (mut formation, _nav) = anchored(ShapeId::Box9);
        let units = units(3);
        formation.assign_units(handles(&units));

        formation.change_state(FormationState::Forming);

        let slot_position = formation.slots()[0].position();
        let unit = units[0].borrow();
        let agent = unit.navigator.as_ref().unwrap();
        assert!(agent.active);
        assert_eq!(agent.destination, Some(slot_position));
        assert!(unit.animation.as_ref().unwrap().playing);
    }

    #[test]
    fn test_moving_disables_unit_navigation() {
        let (mut formation, _nav) = anchored(ShapeId::Box9);
        let units = units(3);
        formation.assign_units(handles(&units));
        formation.change_state(FormationState::Forming);

        formation.change_state(FormationState::Moving);

        assert!(!formation.navigation_enabled());
        assert!(!units[1].borrow().navigator.as_ref().unwrap().active);
        assert!(formation.anchor().unwrap().is_moving());
    }

    #[test]
    fn test_arrived_stops_animation() {
        let (mut formation, _nav) = anchored(ShapeId::Box9);
        let units = units(2);
        formation.assign_units(handles(&units));
        formation.change_state(FormationState::Moving);

        formation.change_state(FormationState::Arrived);

        let unit = units[0].borrow();
        let animation = unit.animation.as_ref().unwrap();
        assert!(!animation.playing);
        assert_eq!(animation.stops, 1);
    }

    #[test]
    fn test_moving_recomputes_only_when_anchor_moves() {
        let (mut formation, nav) = anchored(ShapeId::Box9);
        formation.change_state(FormationState::Moving);
        nav.borrow_mut().stop_move();

        let report = formation.tick(0.1);
        assert!(!report.recomputed);

        nav.borrow_mut().warp(Vec3::new(1.0, 0.0, 0.0));
        let report = formation.tick(0.1);
        assert!(report.recomputed);
        assert_eq!(formation.pose().position, Vec3::new(1.0, 0.0, 0.0));
    }

    #[test]
    fn test_small_anchor_move_skips_recompute() {
        let (mut formation, nav) = anchored(ShapeId::Box9);
        formation.change_state(FormationState::Moving);
        let before: Vec<Vec3> = formation.slots().iter().map(|s| s.position()).collect();

        nav.borrow_mut().warp(Vec3::new(POSITION_EPSILON * 0.5, 0.0, 0.0));
        let report = formation.tick(0.1);

        assert!(!report.recomputed);
        assert_eq!(formation.pose().position, Vec3::ZERO);
        let after: Vec<Vec3> = formation.slots().iter().map(|s| s.position()).collect();
        assert_eq!(before, after);
    }

    #[test]
    fn test_creeping_anchor_is_followed() {
        let (mut formation, nav) = anchored(ShapeId::Box9);
        formation.change_state(FormationState::Moving);

        // Each step is below the epsilon, the sum is not
        let step = POSITION_EPSILON * 0.9;
        let mut recomputes = 0;
        for i in 1..=1000 {
            nav.borrow_mut().warp(Vec3::new(step * i as f32, 0.0, 0.0));
            if formation.tick(1.0 / 60.0).recomputed {
                recomputes += 1;
            }
        }

        let anchor = nav.borrow().position;
        assert!(recomputes >= 400);
        assert!(formation.pose().position.distance(anchor) <= POSITION_EPSILON);
    }

    #[test]
    fn test_small_anchor_turn_leaves_rotations_alone() {
        let (mut formation, nav) = anchored(ShapeId::Box9);
        let units = units(3);
        formation.assign_units(handles(&units));
        formation.change_state(FormationState::Moving);

        nav.borrow_mut().rotation = Quat::from_rotation_y(ROTATION_EPSILON * 0.5);
        let report = formation.tick(0.1);

        assert!(!report.recomputed);
        assert_eq!(formation.pose().rotation, Quat::IDENTITY);
        for unit in &units {
            assert_eq!(unit.borrow().rotation, Quat::IDENTITY);
        }
    }

    #[test]
    fn test_jitter_drawn_on_first_dirty_tick() {
        let config = FormationConfig::new().with_shape(ShapeId::Box9).with_seed(7);
        let mut formation = Formation::new(config, Box::new(FlatGround::new(0.0))).unwrap();
        let nav = Rc::new(RefCell::new(DirectNavigator::new(Vec3::ZERO, 2.0)));
        formation.set_anchor(AnchorAdapter::new(nav.clone()).with_target(Vec3::new(20.0, 0.0, 0.0)));
        formation.change_state(FormationState::Moving);

        nav.borrow_mut().warp(Vec3::new(1.0, 0.0, 0.0));
        assert!(formation.tick(0.1).recomputed);

        assert!(formation
            .slots()
            .iter()
            .any(|s| s.jitter().target().length_squared() > 0.0));
    }

    #[test]
    fn test_anchor_turn_in_place_recomputes() {
        let (mut formation, nav) = anchored(ShapeId::Box9);
        formation.change_state(FormationState::Moving);

        nav.borrow_mut().rotation = Quat::from_rotation_y(ROTATION_EPSILON * 10.0);
        let report = formation.tick(0.1);

        assert!(report.recomputed);
        assert_eq!(formation.pose().position, Vec3::ZERO);
        assert!(formation.pose().yaw() > 0.0);
    }

    #[test]
    fn test_anchor_arrival_transitions_to_arrived() {
        let mut formation = formation(ShapeId::Box9);
        let nav = Rc::new(RefCell::new(DirectNavigator::new(Vec3::ZERO, 4.0)));
        formation.set_anchor(AnchorAdapter::new(nav.clone()).with_target(Vec3::new(1.0, 0.0, 0.0)));
        formation.change_state(FormationState::Moving);

        let mut arrived = false;
        for _ in 0..20 {
            nav.borrow_mut().step(0.1);
            arrived |= formation.tick(0.1).arrived;
        }

        assert!(arrived);
        assert_eq!(formation.state(), FormationState::Arrived);
        assert_eq!(
            formation
                .events()
                .count(|e| matches!(e, FormationEventType::AnchorArrived)),
            1
        );
    }

    #[test]
    fn test_deferred_move_fires_on_tick() {
        let (mut formation, _nav) = anchored(ShapeId::Box9);
        formation.schedule_state_change(FormationState::Moving, 0.3);

        formation.tick(0.2);
        assert_eq!(formation.state(), FormationState::Forming);
        let report = formation.tick(0.2);
        assert_eq!(report.deferred_applied, 1);
        assert_eq!(formation.state(), FormationState::Moving);
    }

    #[test]
    fn test_cancelled_deferred_move_never_fires() {
        let (mut formation, _nav) = anchored(ShapeId::Box9);
        let id = formation.schedule_state_change(FormationState::Moving, 0.3);

        assert!(formation.cancel_scheduled(id));
        for _ in 0..5 {
            formation.tick(0.2);
        }
        assert_eq!(formation.state(), FormationState::Forming);
    }

    #[test]
    fn test_unit_rotation_slerps_toward_anchor() {
        let (mut formation, nav) = anchored(ShapeId::Box9);
        let units = units(1);
        formation.assign_units(handles(&units));
        formation.change_state(FormationState::Moving);
        nav.borrow_mut().rotation = Quat::from_rotation_y(1.0);

        formation.tick(0.1);

        let yaw = yaw_of(units[0].borrow().rotation);
        assert!(yaw > 0.0 && yaw < 1.0);
        assert!(formation.pose().yaw() > 0.0);
    }

    #[test]
    fn test_yaw_delta_wraps() {
        assert!((yaw_delta(PI - 0.1, -PI + 0.1) - 0.2).abs() < 1e-5);
        assert_eq!(yaw_delta(0.5, 0.5), 0.0);
    }

    #[test]
    fn test_unassign_unit() {
        let (mut formation, _nav) = anchored(ShapeId::Box9);
        let units = units(2);
        formation.assign_units(handles(&units));
        let id = units[0].borrow().id;

        assert!(formation.unassign_unit(id));
        assert!(!formation.unassign_unit(id));
        assert_eq!(formation.assigned_units().len(), 1);
    }

    #[test]
    fn test_visualize_toggle() {
        let mut formation = formation(ShapeId::Wedge9);
        assert!(formation.slots().iter().all(|s| s.is_visible()));
        formation.set_visualize(false);
        assert!(formation.slots().iter().all(|s| !s.is_visible()));
    }
}
