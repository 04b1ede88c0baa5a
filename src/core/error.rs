use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::types::{FormationId, UnitId};
use crate::formation::shape::ShapeId;
use crate::formation::unit::Capability;

#[derive(Error, Debug)]
pub enum FormationError {
    #[error("No anchor bound to formation")]
    MissingAnchor,

    #[error("Unit {unit} lacks the {capability} required by the formation's movement mode")]
    MissingCapability { unit: UnitId, capability: Capability },

    #[error("Unit {0} has no navigation agent")]
    MissingNavigator(UnitId),

    #[error("Shape {0:?} has no point table, using a single-point layout")]
    PlaceholderShape(ShapeId),

    #[error("Custom shape has no offsets, using a single-point layout")]
    EmptyCustomShape,

    #[error("Unit {0} is already assigned to this formation")]
    DuplicateUnit(UnitId),

    #[error("Too many units for this shape: {supplied} supplied, {capacity} slots")]
    Capacity { supplied: usize, capacity: usize },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Formation {0} is already registered")]
    AlreadyRegistered(FormationId),

    #[error("Formation {0} is not registered")]
    NotRegistered(FormationId),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),
}

/// Coarse classification of formation errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Missing anchor, missing capability, placeholder shape, bad config
    Configuration,
    /// More units than slots
    Capacity,
    /// Loading external data failed
    Io,
}

impl FormationError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            FormationError::Capacity { .. } => ErrorKind::Capacity,
            FormationError::IoError(_)
            | FormationError::TomlError(_)
            | FormationError::SerdeError(_) => ErrorKind::Io,
            _ => ErrorKind::Configuration,
        }
    }
}

pub type Result<T> = std::result::Result<T, FormationError>;
