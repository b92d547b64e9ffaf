pub mod config;
pub mod error;
pub mod types;

pub use config::{EngineSettings, RecruitmentSettings};
pub use error::{AiError, Result};
pub use types::{MapLocation, Side, TimeOfDay, Turn, UnitId};
