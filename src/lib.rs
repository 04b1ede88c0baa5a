//! Formation Grid - anchor-following unit formations
//!
//! Units are bound to the slots of a grid shape and integrated toward them
//! every tick while an external navigator moves the anchor.

pub mod core;
pub mod formation;
pub mod sim;
