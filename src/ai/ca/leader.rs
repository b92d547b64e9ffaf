//! Bring the leader back to a keep so it can recruit

use super::issue;
use crate::ai::candidate_action::{CaBehavior, CaInfo, BAD_SCORE};
use crate::ai::context::{DecisionContext, ReadGameInfo};
use crate::core::types::{MapLocation, UnitId};
use crate::game::actions::ActionRequest;
use crate::game::pathfind::{cost_map, step_towards};

#[derive(Debug, Default)]
pub struct MoveLeaderToKeep {
    choice: Option<(UnitId, MapLocation)>,
}

impl MoveLeaderToKeep {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CaBehavior for MoveLeaderToKeep {
    fn evaluate(&mut self, info: &CaInfo, ctx: &mut DecisionContext) -> f64 {
        self.choice = None;
        if ctx.aspect::<bool>("leader_ignores_keep") {
            return BAD_SCORE;
        }
        let side = ctx.side();
        let state = ctx.state();

        for leader in state.leaders(side).filter(|l| l.moves > 0) {
            if state.map.is_keep(&leader.loc) {
                continue;
            }
            let Some(unit_type) = state.unit_type_of(leader) else {
                continue;
            };
            let costs = cost_map(state, unit_type, side, leader.loc, None);
            let nearest = state
                .map
                .keeps()
                .into_iter()
                .filter(|k| !state.is_occupied(k))
                .filter_map(|k| costs.cost(&k).map(|c| (c, k)))
                .min();
            let Some((_, keep)) = nearest else {
                continue;
            };
            if let Some(step) = step_towards(state, leader, &keep) {
                self.choice = Some((leader.id, step));
                return info.default_score;
            }
        }
        BAD_SCORE
    }

    fn execute(&mut self, _info: &CaInfo, ctx: &mut DecisionContext) {
        if let Some((unit, to)) = self.choice.take() {
            issue(ctx, ActionRequest::Move { unit, to });
        }
    }
}
