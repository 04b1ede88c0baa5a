//! Registry of live formations
//!
//! Owned by the host and handed to whatever needs cross-formation
//! awareness. Formations are registered on creation and unregistered on
//! teardown.

use std::cell::RefCell;
use std::rc::Rc;

use glam::Vec3;

use crate::core::error::{FormationError, Result};
use crate::core::types::FormationId;
use crate::formation::grid::Formation;

/// Shared handle to a formation
pub type SharedFormation = Rc<RefCell<Formation>>;

#[derive(Default)]
pub struct FormationRegistry {
    formations: Vec<(FormationId, SharedFormation)>,
}

impl FormationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap and register a formation in one step
    pub fn insert(&mut self, formation: Formation) -> Result<SharedFormation> {
        let shared = Rc::new(RefCell::new(formation));
        self.register(shared.clone())?;
        Ok(shared)
    }

    pub fn register(&mut self, formation: SharedFormation) -> Result<FormationId> {
        let id = formation.borrow().id();
        if self.contains(id) {
            return Err(FormationError::AlreadyRegistered(id));
        }
        self.formations.push((id, formation));
        tracing::debug!(formation = %id, total = self.formations.len(), "formation registered");
        Ok(id)
    }

    pub fn unregister(&mut self, id: FormationId) -> Result<SharedFormation> {
        let index = self
            .formations
            .iter()
            .position(|(fid, _)| *fid == id)
            .ok_or(FormationError::NotRegistered(id))?;
        let (_, formation) = self.formations.remove(index);
        tracing::debug!(formation = %id, total = self.formations.len(), "formation unregistered");
        Ok(formation)
    }

    pub fn contains(&self, id: FormationId) -> bool {
        self.formations.iter().any(|(fid, _)| *fid == id)
    }

    pub fn get(&self, id: FormationId) -> Option<SharedFormation> {
        self.formations
            .iter()
            .find(|(fid, _)| *fid == id)
            .map(|(_, f)| f.clone())
    }

    /// Registered formations in registration order
    pub fn iter(&self) -> impl Iterator<Item = &SharedFormation> {
        self.formations.iter().map(|(_, f)| f)
    }

    pub fn len(&self) -> usize {
        self.formations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.formations.is_empty()
    }

    /// Formations whose position is strictly closer than `range` to `point`
    pub fn within_range(&self, point: Vec3, range: f32) -> Vec<SharedFormation> {
        self.iter()
            .filter(|f| f.borrow().pose().position.distance(point) < range)
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::FormationConfig;
    use crate::sim::FlatGround;

    fn formation_at(x: f32) -> Formation {
        let mut config = FormationConfig::new();
        config.origin = [x, 0.0, 0.0];
        Formation::new(config, Box::new(FlatGround::new(0.0))).unwrap()
    }

    #[test]
    fn test_register_and_get() {
        let mut registry = FormationRegistry::new();
        let shared = registry.insert(formation_at(0.0)).unwrap();
        let id = shared.borrow().id();

        assert!(registry.contains(id));
        assert!(Rc::ptr_eq(&registry.get(id).unwrap(), &shared));
    }

    #[test]
    fn test_double_register_rejected() {
        let mut registry = FormationRegistry::new();
        let shared = registry.insert(formation_at(0.0)).unwrap();

        let err = registry.register(shared).unwrap_err();
        assert!(matches!(err, FormationError::AlreadyRegistered(_)));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_unregister() {
        let mut registry = FormationRegistry::new();
        let shared = registry.insert(formation_at(0.0)).unwrap();
        let id = shared.borrow().id();

        assert!(registry.unregister(id).is_ok());
        assert!(registry.is_empty());
        assert!(matches!(
            registry.unregister(id),
            Err(FormationError::NotRegistered(_))
        ));
    }

    #[test]
    fn test_within_range() {
        let mut registry = FormationRegistry::new();
        registry.insert(formation_at(1.0)).unwrap();
        registry.insert(formation_at(10.0)).unwrap();

        let near = registry.within_range(Vec3::ZERO, 5.0);
        assert_eq!(near.len(), 1);
        assert_eq!(near[0].borrow().pose().position.x, 1.0);
    }
}
