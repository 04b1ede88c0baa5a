//! Formation anchor
//!
//! The anchor is the point the whole formation tracks. Its motion comes from
//! an external navigation provider; `AnchorAdapter` wraps that provider with
//! the target bookkeeping, measured velocity and one-shot arrival signal the
//! formation needs.

use std::cell::RefCell;
use std::rc::Rc;

use glam::{Quat, Vec3};

use crate::formation::constants::{DEFAULT_END_REACHED_DISTANCE, MIN_VELOCITY_DT};

/// Navigation back-end that moves the anchor
pub trait NavigationProvider {
    fn start_move(&mut self, destination: Vec3);
    fn stop_move(&mut self);
    fn position(&self) -> Vec3;
    fn rotation(&self) -> Quat;
    /// Velocity as reported by the back-end itself
    fn velocity(&self) -> Vec3;
    /// Polling arrival check
    fn has_arrived(&self) -> bool;
    /// Event arrival signal. Returns true once per arrival.
    fn take_arrival_event(&mut self) -> bool {
        false
    }
    /// Teleport without pathing
    fn warp(&mut self, position: Vec3);
}

/// Shared handle to a host-owned navigation provider
pub type SharedNavigator = Rc<RefCell<dyn NavigationProvider>>;

/// Facade over the navigation provider bound to one formation
pub struct AnchorAdapter {
    provider: SharedNavigator,
    target: Option<Vec3>,
    end_reached_distance: f32,
    previous_position: Option<Vec3>,
    measured_velocity: Vec3,
    /// A move was started and its arrival has not been reported yet
    awaiting_arrival: bool,
    arrivals: u32,
}

impl AnchorAdapter {
    pub fn new(provider: SharedNavigator) -> Self {
        Self {
            provider,
            target: None,
            end_reached_distance: DEFAULT_END_REACHED_DISTANCE,
            previous_position: None,
            measured_velocity: Vec3::ZERO,
            awaiting_arrival: false,
            arrivals: 0,
        }
    }

    pub fn with_end_reached_distance(mut self, distance: f32) -> Self {
        self.end_reached_distance = distance.max(0.0);
        self
    }

    pub fn with_target(mut self, target: Vec3) -> Self {
        self.target = Some(target);
        self
    }

    pub fn provider(&self) -> &SharedNavigator {
        &self.provider
    }

    pub fn target(&self) -> Option<Vec3> {
        self.target
    }

    /// Change the travel target. A move in progress is redirected.
    pub fn set_target(&mut self, target: Vec3) {
        self.target = Some(target);
        if self.awaiting_arrival {
            self.provider.borrow_mut().start_move(target);
        }
    }

    pub fn end_reached_distance(&self) -> f32 {
        self.end_reached_distance
    }

    pub fn position(&self) -> Vec3 {
        self.provider.borrow().position()
    }

    pub fn rotation(&self) -> Quat {
        self.provider.borrow().rotation()
    }

    /// Velocity measured from position deltas between updates
    pub fn velocity(&self) -> Vec3 {
        self.measured_velocity
    }

    pub fn is_moving(&self) -> bool {
        self.awaiting_arrival
    }

    /// Number of arrivals reported so far
    pub fn arrivals(&self) -> u32 {
        self.arrivals
    }

    /// Send the provider toward the target. False when no target is set.
    pub fn start_move(&mut self) -> bool {
        let Some(target) = self.target else {
            tracing::warn!("anchor has no target, move not started");
            return false;
        };
        let mut provider = self.provider.borrow_mut();
        // Drop any event left over from an earlier move
        provider.take_arrival_event();
        provider.start_move(target);
        self.awaiting_arrival = true;
        true
    }

    pub fn stop_move(&mut self) {
        self.provider.borrow_mut().stop_move();
        self.awaiting_arrival = false;
    }

    pub fn warp(&mut self, position: Vec3) {
        self.provider.borrow_mut().warp(position);
        self.previous_position = Some(position);
        self.measured_velocity = Vec3::ZERO;
    }

    /// Sample the provider and refresh the measured velocity
    pub fn update(&mut self, dt: f32) {
        let (position, reported) = {
            let provider = self.provider.borrow();
            (provider.position(), provider.velocity())
        };

        match self.previous_position {
            None => self.measured_velocity = reported,
            Some(previous) if dt > MIN_VELOCITY_DT => {
                self.measured_velocity = (position - previous) / dt;
            }
            Some(_) => {}
        }
        self.previous_position = Some(position);
    }

    /// True once per started move, when the provider reports arrival by
    /// either signal
    pub fn check_arrival(&mut self) -> bool {
        if !self.awaiting_arrival {
            return false;
        }

        let mut provider = self.provider.borrow_mut();
        let event = provider.take_arrival_event();
        if !(event || provider.has_arrived()) {
            return false;
        }

        self.awaiting_arrival = false;
        self.arrivals += 1;
        tracing::debug!(arrivals = self.arrivals, "anchor reached target");
        true
    }
}

impl std::fmt::Debug for AnchorAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnchorAdapter")
            .field("target", &self.target)
            .field("end_reached_distance", &self.end_reached_distance)
            .field("measured_velocity", &self.measured_velocity)
            .field("awaiting_arrival", &self.awaiting_arrival)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{DirectNavigator, WaypointNavigator};

    fn direct(position: Vec3) -> Rc<RefCell<DirectNavigator>> {
        Rc::new(RefCell::new(DirectNavigator::new(position, 2.0)))
    }

    #[test]
    fn test_start_without_target_fails() {
        let nav = direct(Vec3::ZERO);
        let mut anchor = AnchorAdapter::new(nav);
        assert!(!anchor.start_move());
        assert!(!anchor.is_moving());
    }

    #[test]
    fn test_first_update_uses_reported_velocity() {
        let nav = direct(Vec3::ZERO);
        let mut anchor = AnchorAdapter::new(nav.clone()).with_target(Vec3::new(10.0, 0.0, 0.0));
        anchor.start_move();
        nav.borrow_mut().step(0.5);

        anchor.update(0.5);
        assert!((anchor.velocity() - nav.borrow().velocity()).length() < 1e-5);
    }

    #[test]
    fn test_velocity_measured_from_deltas() {
        let nav = direct(Vec3::ZERO);
        let mut anchor = AnchorAdapter::new(nav.clone()).with_target(Vec3::new(10.0, 0.0, 0.0));
        anchor.update(0.1);
        anchor.start_move();

        nav.borrow_mut().step(0.5);
        anchor.update(0.5);

        // 2 units/s along x
        assert!((anchor.velocity().x - 2.0).abs() < 1e-4);
    }

    #[test]
    fn test_tiny_dt_keeps_last_velocity() {
        let nav = direct(Vec3::ZERO);
        let mut anchor = AnchorAdapter::new(nav.clone()).with_target(Vec3::new(10.0, 0.0, 0.0));
        anchor.update(0.1);
        anchor.start_move();
        nav.borrow_mut().step(0.5);
        anchor.update(0.5);
        let before = anchor.velocity();

        anchor.update(0.0);
        assert_eq!(anchor.velocity(), before);
    }

    #[test]
    fn test_polling_arrival_fires_once() {
        let nav = direct(Vec3::ZERO);
        let mut anchor = AnchorAdapter::new(nav.clone()).with_target(Vec3::new(1.0, 0.0, 0.0));
        anchor.start_move();

        for _ in 0..20 {
            nav.borrow_mut().step(0.1);
        }

        assert!(anchor.check_arrival());
        assert!(!anchor.check_arrival());
        assert_eq!(anchor.arrivals(), 1);
    }

    #[test]
    fn test_event_arrival() {
        let nav = Rc::new(RefCell::new(WaypointNavigator::new(Vec3::ZERO, 2.0)));
        let mut anchor = AnchorAdapter::new(nav.clone()).with_target(Vec3::new(1.0, 0.0, 1.0));
        anchor.start_move();

        assert!(!anchor.check_arrival());
        for _ in 0..20 {
            nav.borrow_mut().step(0.1);
        }
        assert!(anchor.check_arrival());
    }

    #[test]
    fn test_no_arrival_when_stopped() {
        let nav = direct(Vec3::ZERO);
        let mut anchor = AnchorAdapter::new(nav).with_target(Vec3::ZERO);
        anchor.start_move();
        anchor.stop_move();
        assert!(!anchor.check_arrival());
    }

    #[test]
    fn test_warp_moves_provider() {
        let nav = direct(Vec3::ZERO);
        let mut anchor = AnchorAdapter::new(nav.clone());
        anchor.warp(Vec3::new(4.0, 0.0, 4.0));
        assert_eq!(nav.borrow().position(), Vec3::new(4.0, 0.0, 4.0));
        assert_eq!(anchor.velocity(), Vec3::ZERO);
    }
}
