//! Candidate-action arbitration: winner selection, pruning soundness and
//! the correction for actions that do not change the game.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use proptest::prelude::*;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rca_ai::ai::stage::{evaluation_pass, sort_by_max_score};
use rca_ai::ai::{AspectSet, CaBehavior, CaInfo, CandidateAction, CandidateActionLoop, DecisionContext, IssueActions, Stage};
use rca_ai::core::{EngineSettings, MapLocation, UnitId};
use rca_ai::game::{ActionRequest, ActionResult, GameMap, GameState, GameWorld, UnitTypeCatalog};

/// Every action succeeds and counts as a change
struct CountingWorld {
    state: GameState,
}

impl GameWorld for CountingWorld {
    fn state(&self) -> &GameState {
        &self.state
    }

    fn execute(&mut self, _side: u32, _action: &ActionRequest) -> ActionResult {
        self.state.mark_changed();
        ActionResult::success()
    }
}

fn world() -> CountingWorld {
    CountingWorld {
        state: GameState::new(GameMap::new(3, 3), UnitTypeCatalog::new()),
    }
}

struct Scripted {
    score: f64,
    honest: bool,
    evaluations: Rc<Cell<u32>>,
    executions: Rc<RefCell<Vec<String>>>,
}

impl CaBehavior for Scripted {
    fn evaluate(&mut self, _info: &CaInfo, _ctx: &mut DecisionContext) -> f64 {
        self.evaluations.set(self.evaluations.get() + 1);
        self.score
    }

    fn execute(&mut self, info: &CaInfo, ctx: &mut DecisionContext) {
        self.executions.borrow_mut().push(info.id.clone());
        if self.honest {
            ctx.execute_action(&ActionRequest::Move {
                unit: UnitId(1),
                to: MapLocation::new(1, 1),
            });
        }
    }
}

struct Tally {
    evaluations: Vec<Rc<Cell<u32>>>,
    executions: Rc<RefCell<Vec<String>>>,
}

/// Candidate actions `ca0`, `ca1`, ... with the given (max_score, score)
fn build(specs: &[(f64, f64)], honest: bool) -> (Vec<Box<CandidateAction>>, Tally) {
    let executions = Rc::new(RefCell::new(Vec::new()));
    let mut evaluations = Vec::new();
    let cas = specs
        .iter()
        .enumerate()
        .map(|(i, &(max, score))| {
            let counter = Rc::new(Cell::new(0));
            evaluations.push(Rc::clone(&counter));
            let mut info = CaInfo::new(&format!("ca{}", i), "scripted", "native", score);
            info.max_score = max;
            Box::new(CandidateAction::new(
                info,
                Box::new(Scripted {
                    score,
                    honest,
                    evaluations: counter,
                    executions: Rc::clone(&executions),
                }),
            ))
        })
        .collect();
    (cas, Tally { evaluations, executions })
}

fn pass(cas: &mut [Box<CandidateAction>], pruning: bool) -> Option<usize> {
    let mut world = world();
    let mut aspects = AspectSet::new();
    let mut rng = ChaCha8Rng::seed_from_u64(9);
    let settings = EngineSettings::default();
    let mut ctx = DecisionContext::new(1, &mut world, &mut aspects, &[], &mut rng, &settings);
    evaluation_pass(cas, &mut ctx, pruning)
}

#[test]
fn test_pruning_scenario_from_three_actions() {
    let (mut cas, tally) = build(&[(100.0, 30.0), (50.0, 45.0), (10.0, 5.0)], true);
    sort_by_max_score(&mut cas);
    let winner = pass(&mut cas, true);
    assert_eq!(winner.map(|i| cas[i].info().id.as_str()), Some("ca1"));
    let counts: Vec<u32> = tally.evaluations.iter().map(|c| c.get()).collect();
    assert_eq!(counts, vec![1, 1, 0]);
}

#[test]
fn test_liar_is_disabled_and_others_still_act() {
    let executions = Rc::new(RefCell::new(Vec::new()));
    let liar_evaluations = Rc::new(Cell::new(0));
    let liar = {
        let mut info = CaInfo::new("liar", "scripted", "native", 90.0);
        info.max_score = 100.0;
        Box::new(CandidateAction::new(
            info,
            Box::new(Scripted {
                score: 90.0,
                honest: false,
                evaluations: Rc::clone(&liar_evaluations),
                executions: Rc::clone(&executions),
            }),
        ))
    };

    /// Honest, acts twice then has nothing left to do
    struct TwoMoves {
        left: u32,
        executions: Rc<RefCell<Vec<String>>>,
    }
    impl CaBehavior for TwoMoves {
        fn evaluate(&mut self, _info: &CaInfo, _ctx: &mut DecisionContext) -> f64 {
            if self.left > 0 {
                10.0
            } else {
                0.0
            }
        }
        fn execute(&mut self, info: &CaInfo, ctx: &mut DecisionContext) {
            self.left -= 1;
            self.executions.borrow_mut().push(info.id.clone());
            ctx.execute_action(&ActionRequest::Move {
                unit: UnitId(1),
                to: MapLocation::new(0, 1),
            });
        }
    }
    let worker = Box::new(CandidateAction::new(
        CaInfo::new("worker", "two_moves", "native", 10.0),
        Box::new(TwoMoves {
            left: 2,
            executions: Rc::clone(&executions),
        }),
    ));

    let mut stage = CandidateActionLoop::new("main_loop", vec![liar, worker]);
    let mut world = world();
    let mut aspects = AspectSet::new();
    let mut rng = ChaCha8Rng::seed_from_u64(9);
    let settings = EngineSettings::default();
    let mut ctx = DecisionContext::new(1, &mut world, &mut aspects, &[], &mut rng, &settings);
    assert!(stage.play_stage(&mut ctx));

    assert_eq!(*executions.borrow(), vec!["liar", "worker", "worker"]);
    // evaluated once, then never again after being disabled
    assert_eq!(liar_evaluations.get(), 1);
    let liar = stage.candidate_actions().iter().find(|c| c.info().id == "liar").unwrap();
    assert!(!liar.is_enabled());
}

#[test]
fn test_disabled_actions_come_back_next_call() {
    let (cas, tally) = build(&[(100.0, 50.0)], false);
    let mut stage = CandidateActionLoop::new("main_loop", cas);
    for _ in 0..2 {
        let mut world = world();
        let mut aspects = AspectSet::new();
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        let settings = EngineSettings::default();
        let mut ctx = DecisionContext::new(1, &mut world, &mut aspects, &[], &mut rng, &settings);
        assert!(!stage.play_stage(&mut ctx));
    }
    assert_eq!(tally.executions.borrow().len(), 2);
}

fn specs() -> impl Strategy<Value = Vec<(f64, f64)>> {
    prop::collection::vec((1u32..1000, 0u32..=100), 1..8).prop_map(|raw| {
        raw.into_iter()
            .map(|(max, percent)| {
                let max = max as f64;
                // whole numbers keep ties common
                (max, (max * percent as f64 / 100.0).floor())
            })
            .collect()
    })
}

proptest! {
    #[test]
    fn prop_winner_has_highest_score(specs in specs()) {
        let (mut cas, _) = build(&specs, true);
        sort_by_max_score(&mut cas);
        let winner = pass(&mut cas, false);
        let best = cas.iter().map(|c| c.info().score).fold(0.0_f64, f64::max);
        match winner {
            Some(i) => {
                prop_assert!(cas[i].info().score > 0.0);
                prop_assert_eq!(cas[i].info().score, best);
                // ties go to the earliest action
                prop_assert!(cas[..i].iter().all(|c| c.info().score < best));
            }
            None => prop_assert_eq!(best, 0.0),
        }
    }

    #[test]
    fn prop_pruning_never_changes_the_winner(specs in specs()) {
        let (mut plain, plain_tally) = build(&specs, true);
        let (mut pruned, pruned_tally) = build(&specs, true);
        sort_by_max_score(&mut plain);
        sort_by_max_score(&mut pruned);
        let a = pass(&mut plain, false).map(|i| plain[i].info().id.clone());
        let b = pass(&mut pruned, true).map(|i| pruned[i].info().id.clone());
        prop_assert_eq!(a, b);

        let total = |p: &Tally| p.evaluations.iter().map(|c| c.get()).sum::<u32>();
        prop_assert!(total(&pruned_tally) <= total(&plain_tally));
    }

    #[test]
    fn prop_no_zero_score_is_executed(specs in specs()) {
        let (cas, tally) = build(&specs, true);
        let zero_ids: Vec<String> = specs
            .iter()
            .enumerate()
            .filter(|(_, (_, score))| *score <= 0.0)
            .map(|(i, _)| format!("ca{}", i))
            .collect();
        let mut stage = CandidateActionLoop::new("main_loop", cas);
        let mut world = world();
        let mut aspects = AspectSet::new();
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        let settings = EngineSettings { max_executions_per_stage: 20, ..EngineSettings::default() };
        let mut ctx = DecisionContext::new(1, &mut world, &mut aspects, &[], &mut rng, &settings);
        stage.play_stage(&mut ctx);
        prop_assert!(tally.executions.borrow().iter().all(|id| !zero_ids.contains(id)));
    }
}
