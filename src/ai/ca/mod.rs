//! Native candidate actions
//!
//! Each behavior scores one kind of move for the whole side and remembers
//! the best instance it found, so `execute` can carry it out without a
//! second search. Scores are the configured `score` when there is
//! something to do and `BAD_SCORE` otherwise.

pub mod combat;
pub mod leader;
pub mod targets;
pub mod villages;

pub use combat::CombatPhase;
pub use leader::MoveLeaderToKeep;
pub use targets::MoveToTargets;
pub use villages::GetVillages;

use crate::ai::context::{DecisionContext, IssueActions};
use crate::game::actions::ActionRequest;

/// Issue `action` and report whether it went through
pub(crate) fn issue(ctx: &mut DecisionContext, action: ActionRequest) -> bool {
    ctx.execute_action(&action).is_ok()
}
