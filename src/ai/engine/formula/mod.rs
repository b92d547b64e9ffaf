//! The formula engine: candidate actions and aspects written as expressions
//!
//! A `formula` candidate action carries an `evaluation` formula producing
//! its score and an `execution` formula producing the action(s) to take.
//! A `formula_aspect` computes its value from a `formula` attribute each
//! time it is recalculated.

pub mod expression;

use std::collections::BTreeMap;
use tracing::{debug, warn};

use self::expression::{Bindings, EvalError, Expr};
use super::{unknown_component, Engine, EngineSet, FORMULA_ENGINE};
use crate::ai::aspect::{Aspect, AspectView, VariantSource};
use crate::ai::candidate_action::{CaBehavior, CaInfo, CandidateAction, BAD_SCORE};
use crate::ai::context::{DecisionContext, IssueActions, ReadGameInfo};
use crate::ai::variant::Variant;
use crate::config::Config;
use crate::core::error::{AiError, Result};
use crate::core::types::{MapLocation, Side};
use crate::game::actions::ActionRequest;
use crate::game::state::GameState;

pub const FORMULA_CA: &str = "formula";
pub const FORMULA_ASPECT: &str = "formula_aspect";

/// Game variables and action constructors visible to formulas
pub struct GameBindings<'a> {
    pub state: &'a GameState,
    pub side: Side,
}

impl<'a> GameBindings<'a> {
    pub fn new(state: &'a GameState, side: Side) -> Self {
        Self { state, side }
    }

    fn cheapest_recruit(&self) -> i64 {
        self.state
            .team(self.side)
            .into_iter()
            .flat_map(|team| team.recruits.iter())
            .filter_map(|id| self.state.catalog.get(id))
            .map(|t| t.cost as i64)
            .min()
            .unwrap_or(0)
    }
}

fn count(n: usize) -> Variant {
    Variant::Int(n as i64)
}

fn location_args(name: &str, args: &[Variant]) -> std::result::Result<Vec<i32>, EvalError> {
    args.iter()
        .map(|a| {
            a.as_int().map(|i| i as i32).ok_or_else(|| EvalError::TypeMismatch {
                op: name.to_string(),
                left: a.type_name(),
                right: "int",
            })
        })
        .collect()
}

fn loc_variant(loc: MapLocation) -> Variant {
    let mut map = BTreeMap::new();
    map.insert("x".to_string(), Variant::Int(loc.x as i64));
    map.insert("y".to_string(), Variant::Int(loc.y as i64));
    Variant::Map(map)
}

fn action(kind: &str, fields: Vec<(&str, Variant)>) -> Variant {
    let mut map = BTreeMap::new();
    map.insert("action".to_string(), Variant::from(kind));
    for (key, value) in fields {
        map.insert(key.to_string(), value);
    }
    Variant::Map(map)
}

fn arg_count(func: &str, args: &[Variant], allowed: &[usize]) -> std::result::Result<(), EvalError> {
    if allowed.contains(&args.len()) {
        return Ok(());
    }
    let expected = allowed.iter().map(|n| n.to_string()).collect::<Vec<_>>().join(" or ");
    Err(EvalError::InvalidArgCount {
        func: func.to_string(),
        expected,
        got: args.len(),
    })
}

impl GameBindings<'_> {
    fn unit_id_at(&self, x: i32, y: i32) -> Variant {
        self.state
            .unit_at(&MapLocation::new(x, y))
            .map_or(Variant::Null, |u| Variant::Int(u.id.0 as i64))
    }

    /// `recruit(type)` or `recruit(type, x, y)`
    fn recruit(&self, args: &[Variant]) -> std::result::Result<Variant, EvalError> {
        arg_count("recruit", args, &[1, 3])?;
        let mut fields = vec![("unit_type", Variant::from(args[0].as_str().unwrap_or_default()))];
        if args.len() == 3 {
            let xy = location_args("recruit", &args[1..])?;
            fields.push(("location", loc_variant(MapLocation::new(xy[0], xy[1]))));
        }
        Ok(action("recruit", fields))
    }

    /// `recall(id)` or `recall(id, x, y)`
    fn recall(&self, args: &[Variant]) -> std::result::Result<Variant, EvalError> {
        arg_count("recall", args, &[1, 3])?;
        let id = location_args("recall", &args[..1])?[0];
        let mut fields = vec![("unit", Variant::Int(id as i64))];
        if args.len() == 3 {
            let xy = location_args("recall", &args[1..])?;
            fields.push(("location", loc_variant(MapLocation::new(xy[0], xy[1]))));
        }
        Ok(action("recall", fields))
    }

    /// `move(x1, y1, x2, y2)`; null when no unit stands on the source hex
    fn move_unit(&self, args: &[Variant]) -> std::result::Result<Variant, EvalError> {
        arg_count("move", args, &[4])?;
        let c = location_args("move", args)?;
        let unit = self.unit_id_at(c[0], c[1]);
        if unit.is_null() {
            return Ok(Variant::Null);
        }
        Ok(action("move", vec![("unit", unit), ("to", loc_variant(MapLocation::new(c[2], c[3])))]))
    }

    /// `attack(ax, ay, dx, dy)`; null unless both hexes hold units
    fn attack(&self, args: &[Variant]) -> std::result::Result<Variant, EvalError> {
        arg_count("attack", args, &[4])?;
        let c = location_args("attack", args)?;
        let (attacker, defender) = (self.unit_id_at(c[0], c[1]), self.unit_id_at(c[2], c[3]));
        if attacker.is_null() || defender.is_null() {
            return Ok(Variant::Null);
        }
        Ok(action("attack", vec![("attacker", attacker), ("defender", defender)]))
    }
}

impl Bindings for GameBindings<'_> {
    fn variable(&self, name: &str) -> Option<Variant> {
        let state = self.state;
        let side = self.side;
        let value = match name {
            "turn" => Variant::Int(state.turn as i64),
            "side" => Variant::Int(side as i64),
            "gold" => Variant::Int(state.gold(side) as i64),
            "income" => Variant::Int(state.income(side) as i64),
            "my_units" => count(state.units_of(side).count()),
            "enemy_units" => count(state.enemy_units(side).count()),
            "my_villages" => count(state.map.village_count(side)),
            "total_villages" => count(state.map.villages().len()),
            "my_leaders" => count(state.leaders(side).count()),
            "cheapest_recruit" => Variant::Int(self.cheapest_recruit()),
            _ => return None,
        };
        Some(value)
    }

    fn call(&self, name: &str, args: &[Variant]) -> Option<std::result::Result<Variant, EvalError>> {
        let result = match name {
            "recruit" => self.recruit(args),
            "recall" => self.recall(args),
            "move" => self.move_unit(args),
            "attack" => self.attack(args),
            "distance" => arg_count(name, args, &[4])
                .and_then(|_| location_args(name, args))
                .map(|c| Variant::Int(MapLocation::new(c[0], c[1]).distance(&MapLocation::new(c[2], c[3])) as i64)),
            _ => return None,
        };
        Some(result)
    }
}

/// Turn a formula result into action requests. Null yields nothing, a
/// list yields one request per element.
pub fn actions_from_variant(value: &Variant) -> Result<Vec<ActionRequest>> {
    match value {
        Variant::Null => Ok(Vec::new()),
        Variant::List(items) => {
            let mut out = Vec::new();
            for item in items {
                out.extend(actions_from_variant(item)?);
            }
            Ok(out)
        }
        Variant::Map(_) => {
            let request: ActionRequest = serde_json::from_value(value.to_json())?;
            Ok(vec![request])
        }
        other => Err(AiError::Formula(format!("{} is not an action", other))),
    }
}

/// Parse a formula, naming the attribute it came from in the error
fn parse(attr: &str, text: &str) -> Result<Expr> {
    Expr::parse(text).map_err(|e| AiError::Formula(format!("{} '{}': {}", attr, text, e)))
}

fn evaluate(expr: &Expr, state: &GameState, side: Side) -> Result<Variant> {
    expr.evaluate(&GameBindings::new(state, side))
        .map_err(|e| AiError::Formula(e.to_string()))
}

/// A candidate action whose score and action are formulas
pub struct FormulaCa {
    evaluation_text: String,
    evaluation: Expr,
    execution_text: String,
    execution: Expr,
}

impl FormulaCa {
    pub fn from_config(cfg: &Config) -> Result<Self> {
        let evaluation_text = cfg
            .string("evaluation")
            .ok_or_else(|| AiError::Config("formula candidate action without 'evaluation'".into()))?;
        let execution_text = cfg
            .string("execution")
            .or_else(|| cfg.string("action"))
            .ok_or_else(|| AiError::Config("formula candidate action without 'execution'".into()))?;
        Ok(Self {
            evaluation: parse("evaluation", &evaluation_text)?,
            execution: parse("execution", &execution_text)?,
            evaluation_text,
            execution_text,
        })
    }
}

impl CaBehavior for FormulaCa {
    fn evaluate(&mut self, info: &CaInfo, ctx: &mut DecisionContext) -> f64 {
        match evaluate(&self.evaluation, ctx.state(), ctx.side()) {
            Ok(value) => value.as_real().unwrap_or(BAD_SCORE),
            Err(e) => {
                warn!("Formula candidate action '{}' failed to evaluate: {}", info.id, e);
                BAD_SCORE
            }
        }
    }

    fn execute(&mut self, info: &CaInfo, ctx: &mut DecisionContext) {
        let actions = evaluate(&self.execution, ctx.state(), ctx.side()).and_then(|v| actions_from_variant(&v));
        match actions {
            Ok(actions) => {
                if actions.is_empty() {
                    debug!("Formula candidate action '{}' produced no action", info.id);
                }
                for action in actions {
                    if !ctx.execute_action(&action).is_ok() {
                        break;
                    }
                }
            }
            Err(e) => warn!("Formula candidate action '{}' failed to execute: {}", info.id, e),
        }
    }

    fn write_config(&self, cfg: &mut Config) {
        cfg.set("evaluation", self.evaluation_text.as_str());
        cfg.set("execution", self.execution_text.as_str());
    }
}

/// Aspect value computed by a formula
pub struct FormulaSource {
    text: String,
    expr: Expr,
}

impl FormulaSource {
    pub fn new(text: &str) -> Result<Self> {
        Ok(Self {
            text: text.to_string(),
            expr: parse("formula", text)?,
        })
    }
}

impl VariantSource for FormulaSource {
    fn compute(&mut self, view: &AspectView) -> Result<Variant> {
        evaluate(&self.expr, view.state, view.side)
    }

    fn write_config(&self, cfg: &mut Config) {
        cfg.set("formula", self.text.as_str());
    }
}

#[derive(Debug, Default)]
pub struct FormulaEngine;

impl FormulaEngine {
    pub fn new() -> Self {
        Self
    }
}

impl Engine for FormulaEngine {
    fn name(&self) -> &str {
        FORMULA_ENGINE
    }

    fn parse_candidate_action(&self, cfg: &Config, _engines: &EngineSet, out: &mut Vec<Box<CandidateAction>>) {
        let name = cfg.str_or("name", FORMULA_CA);
        if name != FORMULA_CA {
            unknown_component(FORMULA_ENGINE, "candidate_action", &name);
            return;
        }
        match FormulaCa::from_config(cfg) {
            Ok(behavior) => {
                let mut info = CaInfo::from_config(cfg, FORMULA_ENGINE, BAD_SCORE);
                info.name = name;
                debug!("Built formula candidate action '{}'", info.id);
                out.push(Box::new(CandidateAction::new(info, Box::new(behavior))));
            }
            Err(e) => warn!("Skipping formula candidate action '{}': {}", cfg.str_or("id", ""), e),
        }
    }

    fn parse_aspect(&self, aspect_id: &str, cfg: &Config, engines: &EngineSet, out: &mut Vec<Box<dyn Aspect>>) {
        let name = cfg.str_or("name", FORMULA_ASPECT);
        if name != FORMULA_ASPECT {
            unknown_component(FORMULA_ENGINE, "aspect", &name);
            return;
        }
        let Some(factory) = engines.aspect_factory(aspect_id) else {
            return;
        };
        let Some(text) = cfg.string("formula") else {
            warn!("Skipping formula aspect '{}': no 'formula' attribute", aspect_id);
            return;
        };
        match FormulaSource::new(&text) {
            Ok(source) => {
                let mut cfg = cfg.clone();
                cfg.set("name", FORMULA_ASPECT);
                out.push(factory.dynamic(aspect_id, &cfg, FORMULA_ENGINE, Box::new(source)));
            }
            Err(e) => warn!("Skipping formula aspect '{}': {}", aspect_id, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::aspect::AspectSet;
    use crate::ai::component::Component;
    use crate::core::config::EngineSettings;
    use crate::game::actions::GameWorld;
    use crate::game::map::GameMap;
    use crate::game::sim::SimWorld;
    use crate::game::team::Team;
    use crate::game::unit::{Unit, UnitTypeCatalog};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn world() -> SimWorld {
        let map = GameMap::from_rows(
            "
            v . . . .
            k c . . v
            ",
        )
        .unwrap();
        let mut state = GameState::new(map, UnitTypeCatalog::builtin());
        let mut team = Team::new(1);
        team.recruits = vec!["Spearman".into(), "Bowman".into()];
        team.gold = 40;
        team.enemies.push(2);
        let mut enemy = Team::new(2);
        enemy.enemies.push(1);
        state.teams = vec![team, enemy];
        let spearman = state.catalog.get("Spearman").unwrap().clone();
        let id = state.allocate_unit_id();
        let mut unit = Unit::new(id, &spearman, 1, MapLocation::new(2, 0));
        unit.refresh();
        state.add_unit(unit);
        SimWorld::new(state)
    }

    #[test]
    fn test_game_variables() {
        let w = world();
        let bindings = GameBindings::new(w.state(), 1);
        assert_eq!(bindings.variable("gold"), Some(Variant::Int(40)));
        assert_eq!(bindings.variable("my_units"), Some(Variant::Int(1)));
        assert_eq!(bindings.variable("total_villages"), Some(Variant::Int(2)));
        assert_eq!(bindings.variable("cheapest_recruit"), Some(Variant::Int(14)));
        assert_eq!(bindings.variable("weather"), None);
    }

    #[test]
    fn test_action_constructors() {
        let w = world();
        let bindings = GameBindings::new(w.state(), 1);
        let value = Expr::parse("[recruit('Bowman', 1, 1), move(2, 0, 3, 0)]")
            .unwrap()
            .evaluate(&bindings)
            .unwrap();
        let actions = actions_from_variant(&value).unwrap();
        assert_eq!(
            actions[0],
            ActionRequest::Recruit {
                unit_type: "Bowman".into(),
                location: Some(MapLocation::new(1, 1)),
                leader: None,
            }
        );
        assert!(matches!(actions[1], ActionRequest::Move { to, .. } if to == MapLocation::new(3, 0)));
        let nobody = Expr::parse("move(4, 1, 3, 1)").unwrap().evaluate(&bindings).unwrap();
        assert!(actions_from_variant(&nobody).unwrap().is_empty());
        assert!(actions_from_variant(&Variant::Int(3)).is_err());
    }

    #[test]
    fn test_formula_candidate_action() {
        let engines = EngineSet::new(EngineSettings::default());
        let cfg = Config::new()
            .with("engine", "formula")
            .with("name", "formula")
            .with("id", "walk")
            .with("evaluation", "if(my_units > 0, 500, 0)")
            .with("execution", "move(2, 0, 3, 0)");
        let mut cas = Vec::new();
        engines.parse_candidate_action(&cfg, &mut cas);
        assert_eq!(cas.len(), 1);
        assert_eq!(cas[0].id(), "walk");
        assert_eq!(cas[0].to_config().str_or("execution", ""), "move(2, 0, 3, 0)");

        let mut w = world();
        let mut aspects = AspectSet::new();
        let settings = EngineSettings::default();
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let mut ctx = DecisionContext::new(1, &mut w, &mut aspects, &[], &mut rng, &settings);
        assert_eq!(cas[0].evaluate(&mut ctx), 500.0);
        cas[0].execute(&mut ctx);
        drop(ctx);
        assert!(w.state().unit_at(&MapLocation::new(3, 0)).is_some());
    }

    #[test]
    fn test_bad_formulas_are_skipped() {
        let engines = EngineSet::new(EngineSettings::default());
        let mut cas = Vec::new();
        engines.parse_candidate_action(
            &Config::new().with("engine", "formula").with("evaluation", "(1 +").with("execution", "null"),
            &mut cas,
        );
        engines.parse_candidate_action(&Config::new().with("engine", "formula").with("evaluation", "1"), &mut cas);
        assert!(cas.is_empty());
    }

    #[test]
    fn test_formula_aspect_tracks_state() {
        let engines = EngineSet::new(EngineSettings::default());
        let mut out = Vec::new();
        engines.parse_aspect(
            "aggression",
            &Config::new().with("engine", "formula").with("formula", "if(gold > 30, 0.8, 0.1)"),
            &mut out,
        );
        assert_eq!(out.len(), 1);
        let mut w = world();
        let variant = out[0].get_variant(&AspectView::new(w.state(), 1));
        assert_eq!(variant, Variant::Real(0.8));
        w.state_mut().team_mut(1).unwrap().gold = 10;
        out[0].invalidate();
        assert_eq!(out[0].get_variant(&AspectView::new(w.state(), 1)), Variant::Real(0.1));
        assert_eq!(out[0].to_config().str_or("formula", ""), "if(gold > 30, 0.8, 0.1)");
    }
}
