//! Game model the decision engine plays against
//!
//! Map, units, teams, pathfinding and an action-applying world. The AI reads
//! `GameState` freely and changes it only through `GameWorld::execute`.

pub mod actions;
pub mod combat;
pub mod map;
pub mod pathfind;
pub mod scenario;
pub mod sim;
pub mod state;
pub mod team;
pub mod unit;

pub use actions::{ActionError, ActionRequest, ActionResult, GameWorld, GamestateObserver};
pub use map::{GameMap, Terrain};
pub use scenario::Scenario;
pub use sim::SimWorld;
pub use state::GameState;
pub use team::Team;
pub use unit::{Alignment, Attack, AttackRange, Unit, UnitType, UnitTypeCatalog, Usage};
