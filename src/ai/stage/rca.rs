//! The candidate-action evaluation loop
//!
//! Each round every enabled candidate action is evaluated in descending
//! `max_score` order and the best one above `BAD_SCORE` is executed. A
//! winner that does not change game state is disabled for the rest of the
//! call. Rounds repeat until nothing can act.

use ordered_float::OrderedFloat;
use std::cmp::Reverse;
use tracing::{debug, info, warn};

use super::{Stage, CA_LOOP_STAGE};
use crate::ai::candidate_action::{CandidateAction, BAD_SCORE};
use crate::ai::component::{
    change_matching, child_mut, configs_of, delete_matching, insertion_index, no_children, Component,
};
use crate::ai::context::{DecisionContext, ReadGameInfo};
use crate::ai::engine::{EngineSet, NATIVE_ENGINE};
use crate::ai::path::PathElement;
use crate::config::Config;
use crate::core::error::Result;
use crate::game::actions::GamestateObserver;

const CANDIDATE_ACTION: &str = "candidate_action";

/// Stable sort, highest `max_score` first; ties keep configuration order
pub fn sort_by_max_score(cas: &mut [Box<CandidateAction>]) {
    cas.sort_by_key(|ca| Reverse(OrderedFloat(ca.max_score())));
}

/// One evaluation pass over `cas`, which must already be sorted by
/// [`sort_by_max_score`]. Returns the index of the winner, if any action
/// scored above `BAD_SCORE`.
///
/// With `pruning`, the pass stops as soon as the best score so far is at
/// least the next action's `max_score`. Ties go to the earlier action.
pub fn evaluation_pass(cas: &mut [Box<CandidateAction>], ctx: &mut DecisionContext, pruning: bool) -> Option<usize> {
    let mut best_score = BAD_SCORE;
    let mut best = None;
    for (index, ca) in cas.iter_mut().enumerate() {
        if !ca.is_enabled() {
            continue;
        }
        if pruning && best_score >= ca.max_score() {
            debug!("Pruned evaluation at '{}' (best {} >= max {})", ca.id(), best_score, ca.max_score());
            break;
        }
        let score = ca.evaluate(ctx);
        if score > best_score {
            best_score = score;
            best = Some(index);
        }
    }
    best
}

pub struct CandidateActionLoop {
    id: String,
    name: String,
    engine: String,
    candidate_actions: Vec<Box<CandidateAction>>,
}

impl CandidateActionLoop {
    pub fn new(id: &str, candidate_actions: Vec<Box<CandidateAction>>) -> Self {
        Self {
            id: id.to_string(),
            name: CA_LOOP_STAGE.to_string(),
            engine: NATIVE_ENGINE.to_string(),
            candidate_actions,
        }
    }

    pub fn from_config(cfg: &Config, engines: &EngineSet) -> Self {
        let mut candidate_actions = Vec::new();
        for ca_cfg in cfg.children(CANDIDATE_ACTION) {
            engines.parse_candidate_action(ca_cfg, &mut candidate_actions);
        }
        let id = cfg.str_or("id", CA_LOOP_STAGE);
        Self::new(&id, candidate_actions)
    }

    pub fn candidate_actions(&self) -> &[Box<CandidateAction>] {
        &self.candidate_actions
    }

    pub fn candidate_actions_mut(&mut self) -> &mut Vec<Box<CandidateAction>> {
        &mut self.candidate_actions
    }

    fn build(cfg: &Config, engines: &EngineSet) -> Vec<Box<CandidateAction>> {
        let mut built = Vec::new();
        engines.parse_candidate_action(cfg, &mut built);
        built
    }

    fn check_property(&self, element: &PathElement) -> Result<()> {
        if element.property == CANDIDATE_ACTION {
            Ok(())
        } else {
            Err(no_children(&self.id, element))
        }
    }
}

impl Stage for CandidateActionLoop {
    fn play_stage(&mut self, ctx: &mut DecisionContext) -> bool {
        for ca in &mut self.candidate_actions {
            ca.enable();
        }
        sort_by_max_score(&mut self.candidate_actions);

        let pruning = ctx.settings().pruning;
        let limit = ctx.settings().max_executions_per_stage;
        let mut executions = 0;
        let mut changed = false;

        loop {
            if ctx.is_aborted() {
                info!("Stage '{}' stopped: turn aborted", self.id);
                break;
            }
            let Some(best) = evaluation_pass(&mut self.candidate_actions, ctx, pruning) else {
                break;
            };
            if executions >= limit {
                warn!("Stage '{}' hit the limit of {} executions", self.id, limit);
                break;
            }
            let ca = &mut self.candidate_actions[best];
            let observer = GamestateObserver::new(ctx.state());
            ca.execute(ctx);
            executions += 1;
            if observer.is_gamestate_changed(ctx.state()) {
                changed = true;
            } else {
                info!("Candidate action '{}' did not change the game state, disabling it", ca.id());
                ca.disable();
            }
            if ca.is_to_be_removed() {
                ca.disable();
            }
        }

        for ca in self.candidate_actions.iter().filter(|ca| ca.is_to_be_removed()) {
            ctx.request_removal(format!("stage['{}'].candidate_action['{}']", self.id, ca.id()));
        }
        changed
    }

    fn on_turn_start(&mut self) {
        for ca in &mut self.candidate_actions {
            ca.on_turn_start();
        }
    }
}

impl Component for CandidateActionLoop {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn engine(&self) -> &str {
        &self.engine
    }

    fn get_child(&mut self, element: &PathElement) -> Option<&mut dyn Component> {
        if element.property != CANDIDATE_ACTION {
            return None;
        }
        child_mut(&mut self.candidate_actions, element)
    }

    fn add_child(&mut self, element: &PathElement, cfg: &Config, engines: &EngineSet) -> Result<()> {
        self.check_property(element)?;
        let at = insertion_index(element, self.candidate_actions.len());
        for (offset, ca) in Self::build(cfg, engines).into_iter().enumerate() {
            self.candidate_actions.insert(at + offset, ca);
        }
        Ok(())
    }

    fn change_child(&mut self, element: &PathElement, cfg: &Config, engines: &EngineSet) -> Result<()> {
        self.check_property(element)?;
        change_matching(&mut self.candidate_actions, element, cfg, |c| Self::build(c, engines))
    }

    fn delete_child(&mut self, element: &PathElement) -> Result<()> {
        self.check_property(element)?;
        delete_matching(&mut self.candidate_actions, element)
    }

    fn child_configs(&self, element: &PathElement) -> Vec<Config> {
        if element.property != CANDIDATE_ACTION {
            return Vec::new();
        }
        configs_of(&self.candidate_actions, element)
    }

    fn to_config(&self) -> Config {
        let mut cfg = Config::new()
            .with("id", self.id.as_str())
            .with("name", self.name.as_str())
            .with("engine", self.engine.as_str());
        for ca in &self.candidate_actions {
            cfg.add_child(CANDIDATE_ACTION, ca.to_config());
        }
        cfg
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::aspect::AspectSet;
    use crate::ai::candidate_action::{CaBehavior, CaInfo};
    use crate::ai::context::IssueActions;
    use crate::core::config::EngineSettings;
    use crate::core::types::{MapLocation, UnitId};
    use crate::game::actions::{ActionRequest, ActionResult, GameWorld};
    use crate::game::map::GameMap;
    use crate::game::state::GameState;
    use crate::game::unit::UnitTypeCatalog;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use std::cell::RefCell;
    use std::rc::Rc;

    /// World where every action succeeds and bumps the change counter
    struct EchoWorld {
        state: GameState,
    }

    impl GameWorld for EchoWorld {
        fn state(&self) -> &GameState {
            &self.state
        }

        fn execute(&mut self, _side: u32, _action: &ActionRequest) -> ActionResult {
            self.state.mark_changed();
            ActionResult::success()
        }
    }

    /// Scores a fixed value a limited number of times
    struct Fixed {
        score: f64,
        budget: u32,
        honest: bool,
        log: Rc<RefCell<Vec<String>>>,
    }

    impl CaBehavior for Fixed {
        fn evaluate(&mut self, info: &CaInfo, _ctx: &mut DecisionContext) -> f64 {
            self.log.borrow_mut().push(format!("eval {}", info.id));
            if self.budget == 0 {
                0.0
            } else {
                self.score
            }
        }

        fn execute(&mut self, info: &CaInfo, ctx: &mut DecisionContext) {
            self.log.borrow_mut().push(format!("exec {}", info.id));
            self.budget -= 1;
            if self.honest {
                ctx.execute_action(&ActionRequest::Move {
                    unit: UnitId(1),
                    to: MapLocation::new(0, 0),
                });
            }
        }
    }

    fn ca(id: &str, max: f64, score: f64, budget: u32, honest: bool, log: &Rc<RefCell<Vec<String>>>) -> Box<CandidateAction> {
        let mut info = CaInfo::new(id, "fixed", "native", score);
        info.max_score = max;
        Box::new(CandidateAction::new(
            info,
            Box::new(Fixed {
                score,
                budget,
                honest,
                log: Rc::clone(log),
            }),
        ))
    }

    fn run(stage: &mut CandidateActionLoop) -> bool {
        let mut world = EchoWorld {
            state: GameState::new(GameMap::new(2, 2), UnitTypeCatalog::new()),
        };
        let mut aspects = AspectSet::new();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let settings = EngineSettings::default();
        let mut ctx = DecisionContext::new(1, &mut world, &mut aspects, &[], &mut rng, &settings);
        stage.play_stage(&mut ctx)
    }

    #[test]
    fn test_highest_score_executes_first() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut stage = CandidateActionLoop::new(
            "main_loop",
            vec![ca("low", 100.0, 10.0, 1, true, &log), ca("high", 100.0, 20.0, 1, true, &log)],
        );
        assert!(run(&mut stage));
        let execs: Vec<String> = log.borrow().iter().filter(|l| l.starts_with("exec")).cloned().collect();
        assert_eq!(execs, vec!["exec high", "exec low"]);
    }

    #[test]
    fn test_liar_disabled_after_one_execution() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut stage = CandidateActionLoop::new("main_loop", vec![ca("liar", 100.0, 50.0, 100, false, &log)]);
        assert!(!run(&mut stage));
        let execs = log.borrow().iter().filter(|l| l.starts_with("exec")).count();
        assert_eq!(execs, 1);
        assert!(!stage.candidate_actions()[0].is_enabled());
    }

    #[test]
    fn test_zero_score_never_executes() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut stage = CandidateActionLoop::new("main_loop", vec![ca("idle", 100.0, 0.0, 5, true, &log)]);
        assert!(!run(&mut stage));
        assert!(log.borrow().iter().all(|l| !l.starts_with("exec")));
    }

    #[test]
    fn test_sort_is_stable() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut cas = vec![
            ca("a", 10.0, 1.0, 1, true, &log),
            ca("b", 50.0, 1.0, 1, true, &log),
            ca("c", 10.0, 1.0, 1, true, &log),
        ];
        sort_by_max_score(&mut cas);
        let ids: Vec<&str> = cas.iter().map(|c| c.id()).collect();
        assert_eq!(ids, vec!["b", "a", "c"]);
    }
}
