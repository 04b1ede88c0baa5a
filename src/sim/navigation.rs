//! Anchor navigation back-ends
//!
//! Two interchangeable providers behind `NavigationProvider`:
//! - DirectNavigator walks straight at the destination and is polled for
//!   arrival.
//! - WaypointNavigator follows a path of corners and raises an arrival
//!   event when the last one is reached.

use std::collections::VecDeque;

use glam::{Quat, Vec3};

use crate::formation::anchor::NavigationProvider;

/// Heading that faces `direction` (+z forward)
fn facing(direction: Vec3) -> Option<Quat> {
    let flat = Vec3::new(direction.x, 0.0, direction.z);
    if flat.length_squared() <= f32::EPSILON {
        return None;
    }
    Some(Quat::from_rotation_y(flat.x.atan2(flat.z)))
}

/// Straight-line agent with polling arrival
#[derive(Debug, Clone)]
pub struct DirectNavigator {
    pub position: Vec3,
    pub rotation: Quat,
    pub velocity: Vec3,
    pub speed: f32,
    pub stopping_distance: f32,
    destination: Option<Vec3>,
    moving: bool,
}

impl DirectNavigator {
    pub fn new(position: Vec3, speed: f32) -> Self {
        Self {
            position,
            rotation: Quat::IDENTITY,
            velocity: Vec3::ZERO,
            speed,
            stopping_distance: 0.0,
            destination: None,
            moving: false,
        }
    }

    pub fn destination(&self) -> Option<Vec3> {
        self.destination
    }

    pub fn remaining_distance(&self) -> Option<f32> {
        self.destination.map(|d| d.distance(self.position))
    }

    pub fn is_moving(&self) -> bool {
        self.moving
    }

    pub fn step(&mut self, dt: f32) {
        let Some(destination) = self.destination else {
            return;
        };
        if !self.moving {
            return;
        }

        let to_target = destination - self.position;
        let distance = to_target.length();
        if distance <= self.speed * dt {
            self.position = destination;
            self.velocity = Vec3::ZERO;
            self.moving = false;
            return;
        }

        let direction = to_target / distance;
        self.velocity = direction * self.speed;
        self.position += self.velocity * dt;
        if let Some(rotation) = facing(direction) {
            self.rotation = rotation;
        }
    }
}

impl NavigationProvider for DirectNavigator {
    fn start_move(&mut self, destination: Vec3) {
        self.destination = Some(destination);
        self.moving = true;
    }

    fn stop_move(&mut self) {
        self.moving = false;
        self.velocity = Vec3::ZERO;
    }

    fn position(&self) -> Vec3 {
        self.position
    }

    fn rotation(&self) -> Quat {
        self.rotation
    }

    fn velocity(&self) -> Vec3 {
        self.velocity
    }

    fn has_arrived(&self) -> bool {
        match self.remaining_distance() {
            Some(remaining) => {
                !self.moving
                    && remaining <= self.stopping_distance
                    && self.velocity.length_squared() == 0.0
            }
            None => false,
        }
    }

    fn warp(&mut self, position: Vec3) {
        self.position = position;
    }
}

/// Path-following agent with event arrival
#[derive(Debug, Clone)]
pub struct WaypointNavigator {
    pub position: Vec3,
    pub rotation: Quat,
    pub velocity: Vec3,
    pub speed: f32,
    path: VecDeque<Vec3>,
    arrival_pending: bool,
}

impl WaypointNavigator {
    pub fn new(position: Vec3, speed: f32) -> Self {
        Self {
            position,
            rotation: Quat::IDENTITY,
            velocity: Vec3::ZERO,
            speed,
            path: VecDeque::new(),
            arrival_pending: false,
        }
    }

    /// Remaining corners, nearest first
    pub fn path(&self) -> impl Iterator<Item = &Vec3> {
        self.path.iter()
    }

    pub fn step(&mut self, dt: f32) {
        if self.path.is_empty() {
            return;
        }

        let mut budget = self.speed * dt;
        let start = self.position;
        while let Some(&corner) = self.path.front() {
            let to_corner = corner - self.position;
            let distance = to_corner.length();
            if distance > budget {
                self.position += to_corner / distance * budget;
                break;
            }
            budget -= distance;
            self.position = corner;
            self.path.pop_front();
        }

        if self.path.is_empty() {
            self.velocity = Vec3::ZERO;
            self.arrival_pending = true;
            tracing::trace!("waypoint navigator reached end of path");
        } else if dt > 0.0 {
            self.velocity = (self.position - start) / dt;
        }
        if let Some(rotation) = facing(self.position - start) {
            self.rotation = rotation;
        }
    }
}

impl NavigationProvider for WaypointNavigator {
    /// Plans an L-shaped path: along x first, then along z
    fn start_move(&mut self, destination: Vec3) {
        self.path.clear();
        self.arrival_pending = false;

        let corner = Vec3::new(destination.x, self.position.y, self.position.z);
        if corner.distance_squared(self.position) > f32::EPSILON
            && corner.distance_squared(destination) > f32::EPSILON
        {
            self.path.push_back(corner);
        }
        self.path.push_back(destination);
    }

    fn stop_move(&mut self) {
        self.path.clear();
        self.velocity = Vec3::ZERO;
    }

    fn position(&self) -> Vec3 {
        self.position
    }

    fn rotation(&self) -> Quat {
        self.rotation
    }

    fn velocity(&self) -> Vec3 {
        self.velocity
    }

    fn has_arrived(&self) -> bool {
        false
    }

    fn take_arrival_event(&mut self) -> bool {
        std::mem::take(&mut self.arrival_pending)
    }

    fn warp(&mut self, position: Vec3) {
        self.position = position;
    }
}
