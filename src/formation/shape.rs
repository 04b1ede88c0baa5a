//! Shape tables
//!
//! A shape is an ordered list of local (x, z) offsets around the anchor:
//! +x is to the formation's right, +z is forward. Slot ids follow table order.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::core::error::Result;

/// Predefined layouts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ShapeId {
    #[default]
    None,
    Box9,
    RightFlank5,
    LeftFlank5,
    Wedge9,
    Line8,
    StaggeredLine8,
    Column10,
    /// Offsets supplied at runtime
    Custom,
    /// Reserved for generated layouts
    Function,
}

impl ShapeId {
    pub const PREDEFINED: [ShapeId; 7] = [
        ShapeId::Box9,
        ShapeId::RightFlank5,
        ShapeId::LeftFlank5,
        ShapeId::Wedge9,
        ShapeId::Line8,
        ShapeId::StaggeredLine8,
        ShapeId::Column10,
    ];
}

/// Layout used whenever a shape has no table
pub const SINGLE_POINT: [Vec2; 1] = [Vec2::ZERO];

const BOX_9: [Vec2; 9] = [
    Vec2::new(1.0, 1.5),
    Vec2::new(0.0, 1.5),
    Vec2::new(-1.0, 1.5),
    Vec2::new(1.0, 0.5),
    Vec2::new(0.0, 0.5),
    Vec2::new(-1.0, 0.5),
    Vec2::new(1.0, -0.5),
    Vec2::new(0.0, -0.5),
    Vec2::new(-1.0, -0.5),
];

// Echelon stepping back toward the right
const RIGHT_FLANK_5: [Vec2; 5] = [
    Vec2::new(-1.0, 1.0),
    Vec2::new(-0.5, 0.5),
    Vec2::new(0.0, 0.0),
    Vec2::new(0.5, -0.5),
    Vec2::new(1.0, -1.0),
];

const LEFT_FLANK_5: [Vec2; 5] = [
    Vec2::new(1.0, 1.0),
    Vec2::new(0.5, 0.5),
    Vec2::new(0.0, 0.0),
    Vec2::new(-0.5, -0.5),
    Vec2::new(-1.0, -1.0),
];

const WEDGE_9: [Vec2; 9] = [
    Vec2::new(0.0, 2.0),
    Vec2::new(0.5, 1.0),
    Vec2::new(-0.5, 1.0),
    Vec2::new(1.0, 0.0),
    Vec2::new(-1.0, 0.0),
    Vec2::new(1.5, -1.0),
    Vec2::new(-1.5, -1.0),
    Vec2::new(2.0, -2.0),
    Vec2::new(-2.0, -2.0),
];

const LINE_8: [Vec2; 8] = [
    Vec2::new(3.5, 0.0),
    Vec2::new(2.5, 0.0),
    Vec2::new(1.5, 0.0),
    Vec2::new(0.5, 0.0),
    Vec2::new(-0.5, 0.0),
    Vec2::new(-1.5, 0.0),
    Vec2::new(-2.5, 0.0),
    Vec2::new(-3.5, 0.0),
];

// Two ranks of four, the rear rank shifted half a spacing
const STAGGERED_LINE_8: [Vec2; 8] = [
    Vec2::new(1.5, 0.5),
    Vec2::new(0.5, 0.5),
    Vec2::new(-0.5, 0.5),
    Vec2::new(-1.5, 0.5),
    Vec2::new(2.0, -0.5),
    Vec2::new(1.0, -0.5),
    Vec2::new(0.0, -0.5),
    Vec2::new(-1.0, -0.5),
];

const COLUMN_10: [Vec2; 10] = [
    Vec2::new(0.0, -0.5),
    Vec2::new(0.0, -1.5),
    Vec2::new(0.0, -2.5),
    Vec2::new(0.0, -3.5),
    Vec2::new(0.0, -4.5),
    Vec2::new(0.0, -5.5),
    Vec2::new(0.0, -6.5),
    Vec2::new(0.0, -7.5),
    Vec2::new(0.0, -8.5),
    Vec2::new(0.0, -9.5),
];

/// Static lookup from shape id to offsets
pub struct ShapeTable;

impl ShapeTable {
    /// Offsets for a predefined shape, or `None` for Custom/Function/None
    pub fn predefined(shape: ShapeId) -> Option<&'static [Vec2]> {
        match shape {
            ShapeId::Box9 => Some(&BOX_9),
            ShapeId::RightFlank5 => Some(&RIGHT_FLANK_5),
            ShapeId::LeftFlank5 => Some(&LEFT_FLANK_5),
            ShapeId::Wedge9 => Some(&WEDGE_9),
            ShapeId::Line8 => Some(&LINE_8),
            ShapeId::StaggeredLine8 => Some(&STAGGERED_LINE_8),
            ShapeId::Column10 => Some(&COLUMN_10),
            ShapeId::None | ShapeId::Custom | ShapeId::Function => None,
        }
    }

    /// Resolve the offsets a formation should build its slots from.
    ///
    /// Returns the single-point layout (and `false`) when the shape has no
    /// usable table.
    pub fn resolve(shape: ShapeId, custom: Option<&CustomShape>) -> (Vec<Vec2>, bool) {
        if let Some(points) = Self::predefined(shape) {
            return (points.to_vec(), true);
        }
        match (shape, custom) {
            (ShapeId::Custom, Some(custom)) if !custom.offsets.is_empty() => {
                (custom.offsets.clone(), true)
            }
            _ => (SINGLE_POINT.to_vec(), false),
        }
    }

    /// Number of slots a shape produces
    pub fn points(shape: ShapeId, custom: Option<&CustomShape>) -> usize {
        Self::resolve(shape, custom).0.len()
    }
}

/// Externally supplied layout for `ShapeId::Custom`
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CustomShape {
    pub name: String,
    pub offsets: Vec<Vec2>,
}

#[derive(Deserialize)]
struct CustomShapeFile {
    #[serde(default)]
    name: String,
    offsets: Vec<[f32; 2]>,
}

impl CustomShape {
    pub fn new(name: impl Into<String>, offsets: Vec<Vec2>) -> Self {
        Self {
            name: name.into(),
            offsets,
        }
    }

    /// Parse `{"name": "...", "offsets": [[x, z], ...]}`
    pub fn from_json(content: &str) -> Result<Self> {
        let file: CustomShapeFile = serde_json::from_str(content)?;
        Ok(Self {
            name: file.name,
            offsets: file.offsets.into_iter().map(Vec2::from_array).collect(),
        })
    }
}
