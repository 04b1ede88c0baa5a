pub mod config;
pub mod error;
pub mod types;

pub use config::FormationConfig;
pub use error::{ErrorKind, FormationError, Result};
pub use types::{FormationId, Pose, Tick, UnitId};
