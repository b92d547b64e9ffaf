//! Action requests, results and the world boundary
//!
//! The AI never mutates game state directly. It builds an [`ActionRequest`],
//! hands it to a [`GameWorld`], and gets an [`ActionResult`] telling whether
//! the action succeeded and whether game state changed.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::state::GameState;
use crate::core::types::{MapLocation, Side, UnitId};

/// A decision to apply to the game
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ActionRequest {
    Move {
        unit: UnitId,
        to: MapLocation,
    },
    Attack {
        attacker: UnitId,
        defender: UnitId,
        /// Hex to attack from; the attacker moves there first when needed
        #[serde(default)]
        from: Option<MapLocation>,
    },
    /// Recruit a fresh unit; missing leader/location are chosen by the world
    Recruit {
        unit_type: String,
        #[serde(default)]
        location: Option<MapLocation>,
        #[serde(default)]
        leader: Option<UnitId>,
    },
    Recall {
        unit: UnitId,
        #[serde(default)]
        location: Option<MapLocation>,
        #[serde(default)]
        leader: Option<UnitId>,
    },
}

impl ActionRequest {
    /// Moves are minor changes; everything else is a major change
    pub fn is_major(&self) -> bool {
        !matches!(self, ActionRequest::Move { .. })
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ActionError {
    #[error("No such unit: {0}")]
    NoSuchUnit(UnitId),
    #[error("Unit {0} does not belong to the acting side")]
    NotOwnUnit(UnitId),
    #[error("Unit {0} has no moves left")]
    NoMovesLeft(UnitId),
    #[error("Destination {0} is unreachable")]
    Unreachable(MapLocation),
    #[error("Destination {0} is occupied")]
    Occupied(MapLocation),
    #[error("Target is not adjacent")]
    NotAdjacent,
    #[error("Unit {0} has no attacks left")]
    NoAttacksLeft(UnitId),
    #[error("Not enough gold: need {needed}, have {available}")]
    NotEnoughGold { needed: i32, available: i32 },
    #[error("No leader on a keep with a vacant castle hex")]
    NoLeaderOnKeep,
    #[error("Unit type '{0}' is not recruitable")]
    NotRecruitable(String),
    #[error("Unit {0} is not on the recall list")]
    NotOnRecallList(UnitId),
    #[error("Unknown side {0}")]
    UnknownSide(Side),
}

/// Outcome of applying an action
#[derive(Debug, Clone, PartialEq)]
pub struct ActionResult {
    pub outcome: Result<(), ActionError>,
    pub gamestate_changed: bool,
}

impl ActionResult {
    pub fn success() -> Self {
        Self {
            outcome: Ok(()),
            gamestate_changed: true,
        }
    }

    pub fn failure(error: ActionError) -> Self {
        Self {
            outcome: Err(error),
            gamestate_changed: false,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.outcome.is_ok()
    }
}

/// The game as the AI sees it: read access plus an action channel
pub trait GameWorld {
    fn state(&self) -> &GameState;

    fn execute(&mut self, side: Side, action: &ActionRequest) -> ActionResult;
}

/// Counter-based detector of game-state changes within a window
#[derive(Debug, Clone, Copy)]
pub struct GamestateObserver {
    baseline: u64,
}

impl GamestateObserver {
    pub fn new(state: &GameState) -> Self {
        Self {
            baseline: state.change_count(),
        }
    }

    pub fn is_gamestate_changed(&self, state: &GameState) -> bool {
        state.change_count() != self.baseline
    }

    pub fn reset(&mut self, state: &GameState) {
        self.baseline = state.change_count();
    }
}
