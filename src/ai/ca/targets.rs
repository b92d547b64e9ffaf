//! Move idle units towards the turn's targets
//!
//! Targets come from the goals plus the usual villages, enemy leaders and
//! threats, rebuilt from the current state on every evaluation. Each unit
//! sent towards a target halves that target's value for the rest of the
//! turn so the army spreads over several of them.

use ahash::AHashMap;
use tracing::debug;

use super::issue;
use crate::ai::aspect::LocationFilter;
use crate::ai::candidate_action::{CaBehavior, CaInfo, BAD_SCORE};
use crate::ai::context::{DecisionContext, ReadGameInfo};
use crate::ai::goal::{find_targets, Target, TargetWeights};
use crate::core::types::{MapLocation, UnitId};
use crate::game::actions::ActionRequest;
use crate::game::pathfind::{reachable_locations, step_towards};
use crate::game::state::GameState;
use crate::game::unit::Unit;

/// Next hex towards `goal`: along the route when one exists, else the
/// reachable hex closest to it. Enemy-held goals have no route.
fn advance(state: &GameState, unit: &Unit, goal: &MapLocation) -> Option<MapLocation> {
    if let Some(step) = step_towards(state, unit, goal) {
        return Some(step);
    }
    let here = unit.loc.distance(goal);
    reachable_locations(state, unit)
        .into_iter()
        .filter(|(loc, _)| *loc != unit.loc)
        .map(|(loc, cost)| (loc.distance(goal), cost, loc))
        .filter(|(distance, _, _)| *distance < here)
        .min()
        .map(|(_, _, loc)| loc)
}

#[derive(Debug, Default)]
pub struct MoveToTargets {
    /// Units sent towards each target location this turn
    assigned: AHashMap<MapLocation, u32>,
    choice: Option<(UnitId, MapLocation, MapLocation)>,
}

impl MoveToTargets {
    pub fn new() -> Self {
        Self::default()
    }

    /// Target values after this turn's assignments
    fn discounted(&self, mut targets: Vec<Target>) -> Vec<Target> {
        for target in &mut targets {
            if let Some(&sent) = self.assigned.get(&target.loc) {
                target.value /= 2f64.powi(sent as i32);
            }
        }
        targets
    }
}

impl CaBehavior for MoveToTargets {
    fn evaluate(&mut self, info: &CaInfo, ctx: &mut DecisionContext) -> f64 {
        self.choice = None;
        let weights = TargetWeights {
            village_value: ctx.aspect("village_value"),
            leader_value: ctx.aspect("leader_value"),
            caution: ctx.aspect("caution"),
        };
        let avoid: LocationFilter = ctx.aspect("avoid");
        let side = ctx.side();
        let state = ctx.state();
        let targets = self.discounted(find_targets(state, side, ctx.goals(), weights));

        let mut options: Vec<(f64, UnitId, usize)> = Vec::new();
        for unit in state.units_of(side).filter(|u| u.moves > 0 && !u.is_leader()) {
            // units already in contact are left to the combat phase
            if state.enemy_units(side).any(|e| e.loc.is_adjacent(&unit.loc)) {
                continue;
            }
            for (index, target) in targets.iter().enumerate() {
                let distance = unit.loc.distance(&target.loc);
                if target.value <= 0.0 || distance == 0 {
                    continue;
                }
                options.push((target.value / (1.0 + distance as f64), unit.id, index));
            }
        }
        options.sort_by(|a, b| b.0.total_cmp(&a.0));

        for (rating, unit_id, index) in options {
            let Some(unit) = state.unit(unit_id) else {
                continue;
            };
            let goal = targets[index].loc;
            let Some(step) = advance(state, unit, &goal) else {
                continue;
            };
            if avoid.matches(&state.map, &step) {
                continue;
            }
            debug!("{} heads for {:?} target at {} (rating {:.2})", unit_id, targets[index].kind, goal, rating);
            self.choice = Some((unit_id, step, goal));
            return info.default_score;
        }
        BAD_SCORE
    }

    fn execute(&mut self, _info: &CaInfo, ctx: &mut DecisionContext) {
        let Some((unit, to, goal)) = self.choice.take() else {
            return;
        };
        if issue(ctx, ActionRequest::Move { unit, to }) {
            *self.assigned.entry(goal).or_insert(0) += 1;
        }
    }

    fn on_turn_start(&mut self) {
        self.assigned.clear();
        self.choice = None;
    }
}
