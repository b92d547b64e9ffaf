//! Grab villages that are not ours yet

use super::issue;
use crate::ai::aspect::LocationFilter;
use crate::ai::candidate_action::{CaBehavior, CaInfo, BAD_SCORE};
use crate::ai::context::{DecisionContext, ReadGameInfo};
use crate::core::types::{MapLocation, UnitId};
use crate::game::actions::ActionRequest;
use crate::game::pathfind::reachable_locations;

#[derive(Debug, Default)]
pub struct GetVillages {
    choice: Option<(UnitId, MapLocation)>,
}

impl GetVillages {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CaBehavior for GetVillages {
    fn evaluate(&mut self, info: &CaInfo, ctx: &mut DecisionContext) -> f64 {
        self.choice = None;
        let village_value: f64 = ctx.aspect("village_value");
        if village_value <= 0.0 {
            return BAD_SCORE;
        }
        let passive_leader: bool = ctx.aspect("passive_leader");
        let avoid: LocationFilter = ctx.aspect("avoid");
        let side = ctx.side();
        let state = ctx.state();

        let mut best: Option<(f64, UnitId, MapLocation)> = None;
        for unit in state.units_of(side).filter(|u| u.moves > 0) {
            // a leader on its keep stays there to recruit
            if unit.is_leader() && (passive_leader || state.map.is_keep(&unit.loc)) {
                continue;
            }
            for (loc, cost) in reachable_locations(state, unit) {
                if loc == unit.loc || !state.map.is_village(&loc) || avoid.matches(&state.map, &loc) {
                    continue;
                }
                let owner = state.map.village_owner(&loc);
                if owner == Some(side) {
                    continue;
                }
                let capture = if owner.is_some() { 2.0 } else { 1.0 };
                let rating = village_value * capture - cost as f64 * 0.01;
                if best.map_or(true, |(b, _, _)| rating > b) {
                    best = Some((rating, unit.id, loc));
                }
            }
        }

        match best {
            Some((_, unit, loc)) => {
                self.choice = Some((unit, loc));
                info.default_score
            }
            None => BAD_SCORE,
        }
    }

    fn execute(&mut self, _info: &CaInfo, ctx: &mut DecisionContext) {
        if let Some((unit, to)) = self.choice.take() {
            issue(ctx, ActionRequest::Move { unit, to });
        }
    }
}
