//! The embedded-script engine
//!
//! Script components never see engine internals. Every `evaluate`,
//! `execute` or aspect computation becomes a [`ScriptRequest`] serialized
//! to JSON and handed to an [`Interpreter`]; the interpreter answers with a
//! [`ScriptResponse`] carrying a score, a value, action requests and the
//! updated blackboard. The blackboard is the component's only persistent
//! state and is written back by `to_config()` as a `[state]` child.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::rc::Rc;
use tracing::{debug, warn};

use super::{unknown_component, Engine, EngineSet, SCRIPT_ENGINE};
use crate::ai::aspect::{Aspect, AspectView, VariantSource};
use crate::ai::candidate_action::{CaBehavior, CaInfo, CandidateAction, BAD_SCORE};
use crate::ai::component::Component;
use crate::ai::context::{DecisionContext, IssueActions, ReadGameInfo};
use crate::ai::stage::{Stage, SCRIPT_STAGE};
use crate::ai::variant::Variant;
use crate::config::Config;
use crate::core::error::{AiError, Result};
use crate::core::types::{MapLocation, Side, Turn, UnitId};
use crate::game::actions::{ActionRequest, GamestateObserver};
use crate::game::state::GameState;

pub const SCRIPT_CA: &str = "script";
pub const SCRIPT_ASPECT: &str = "script_aspect";

const STATE_TAG: &str = "state";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitSummary {
    pub id: UnitId,
    pub unit_type: String,
    pub side: Side,
    pub loc: MapLocation,
    pub hitpoints: u32,
    pub moves: u32,
    pub leader: bool,
}

/// Read-only picture of the game handed to scripts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameSummary {
    pub gold: i32,
    pub income: i32,
    pub villages: usize,
    pub total_villages: usize,
    pub recruits: Vec<String>,
    pub units: Vec<UnitSummary>,
}

impl GameSummary {
    pub fn capture(state: &GameState, side: Side) -> Self {
        let units = state
            .units
            .iter()
            .map(|u| UnitSummary {
                id: u.id,
                unit_type: u.type_id.clone(),
                side: u.side,
                loc: u.loc,
                hitpoints: u.hitpoints,
                moves: u.moves,
                leader: u.is_leader(),
            })
            .collect();
        Self {
            gold: state.gold(side),
            income: state.income(side),
            villages: state.map.village_count(side),
            total_villages: state.map.villages().len(),
            recruits: state.team(side).map(|t| t.recruits.clone()).unwrap_or_default(),
            units,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptRequest {
    pub function: String,
    pub side: Side,
    pub turn: Turn,
    pub game: GameSummary,
    /// The calling component's blackboard
    #[serde(default)]
    pub state: Config,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScriptResponse {
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub value: Option<serde_json::Value>,
    #[serde(default)]
    pub actions: Vec<ActionRequest>,
    /// Replacement blackboard; `None` keeps the current one
    #[serde(default)]
    pub state: Option<Config>,
    /// Ask for the calling candidate action to be removed
    #[serde(default)]
    pub remove: bool,
}

/// The interpreter boundary: one JSON request in, one JSON response out
pub trait Interpreter {
    fn call(&self, request: &str) -> Result<String>;
}

type ScriptFunction = Box<dyn Fn(&ScriptRequest) -> Result<ScriptResponse>>;

/// In-process interpreter whose functions are registered by name
#[derive(Default)]
pub struct ScriptHost {
    functions: BTreeMap<String, ScriptFunction>,
}

impl ScriptHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: &str, function: impl Fn(&ScriptRequest) -> Result<ScriptResponse> + 'static) {
        self.functions.insert(name.to_string(), Box::new(function));
    }

    pub fn with(mut self, name: &str, function: impl Fn(&ScriptRequest) -> Result<ScriptResponse> + 'static) -> Self {
        self.register(name, function);
        self
    }

    pub fn function_names(&self) -> impl Iterator<Item = &str> {
        self.functions.keys().map(String::as_str)
    }
}

impl Interpreter for ScriptHost {
    fn call(&self, request: &str) -> Result<String> {
        let request: ScriptRequest = serde_json::from_str(request)?;
        let function = self
            .functions
            .get(&request.function)
            .ok_or_else(|| AiError::Script(format!("no function '{}'", request.function)))?;
        let response = function(&request)?;
        Ok(serde_json::to_string(&response)?)
    }
}

/// Shared plumbing of every script component: the interpreter and the
/// blackboard
struct ScriptLink {
    interpreter: Rc<dyn Interpreter>,
    state: Config,
}

impl ScriptLink {
    fn new(interpreter: Rc<dyn Interpreter>, cfg: &Config) -> Self {
        Self {
            interpreter,
            state: cfg.child(STATE_TAG).cloned().unwrap_or_default(),
        }
    }

    /// Round-trip one request, adopting the returned blackboard
    fn call(&mut self, function: &str, state: &GameState, side: Side) -> Result<ScriptResponse> {
        let request = ScriptRequest {
            function: function.to_string(),
            side,
            turn: state.turn,
            game: GameSummary::capture(state, side),
            state: self.state.clone(),
        };
        let reply = self.interpreter.call(&serde_json::to_string(&request)?)?;
        let response: ScriptResponse = serde_json::from_str(&reply)?;
        if let Some(state) = &response.state {
            self.state = state.clone();
        }
        Ok(response)
    }

    /// Issue the response's actions in order, stopping at the first failure.
    /// True when any of them went through.
    fn issue(actions: &[ActionRequest], ctx: &mut DecisionContext) -> bool {
        let mut any = false;
        for action in actions {
            if !ctx.execute_action(action).is_ok() {
                break;
            }
            any = true;
        }
        any
    }

    fn write_state(&self, cfg: &mut Config) {
        if !self.state.is_empty() {
            cfg.add_child(STATE_TAG, self.state.clone());
        }
    }
}

/// Candidate action proxying `evaluation` and `execution` into the
/// interpreter
pub struct ScriptCa {
    link: ScriptLink,
    evaluation: String,
    execution: String,
    remove: bool,
}

impl ScriptCa {
    fn from_config(cfg: &Config, interpreter: Rc<dyn Interpreter>) -> Result<Self> {
        let evaluation = cfg
            .string("evaluation")
            .ok_or_else(|| AiError::Config("script candidate action without 'evaluation'".into()))?;
        let execution = cfg
            .string("execution")
            .ok_or_else(|| AiError::Config("script candidate action without 'execution'".into()))?;
        Ok(Self {
            link: ScriptLink::new(interpreter, cfg),
            evaluation,
            execution,
            remove: false,
        })
    }
}

impl CaBehavior for ScriptCa {
    fn evaluate(&mut self, info: &CaInfo, ctx: &mut DecisionContext) -> f64 {
        match self.link.call(&self.evaluation, ctx.state(), ctx.side()) {
            Ok(response) => response.score.unwrap_or(BAD_SCORE),
            Err(e) => {
                warn!("Script candidate action '{}' failed to evaluate: {}", info.id, e);
                BAD_SCORE
            }
        }
    }

    fn execute(&mut self, info: &CaInfo, ctx: &mut DecisionContext) {
        match self.link.call(&self.execution, ctx.state(), ctx.side()) {
            Ok(response) => {
                ScriptLink::issue(&response.actions, ctx);
                self.remove |= response.remove;
            }
            Err(e) => warn!("Script candidate action '{}' failed to execute: {}", info.id, e),
        }
    }

    fn write_config(&self, cfg: &mut Config) {
        cfg.set("evaluation", self.evaluation.as_str());
        cfg.set("execution", self.execution.as_str());
        self.link.write_state(cfg);
    }

    fn wants_removal(&self) -> bool {
        self.remove
    }
}

/// Aspect value returned by a script function
pub struct ScriptSource {
    link: ScriptLink,
    function: String,
}

impl VariantSource for ScriptSource {
    fn compute(&mut self, view: &AspectView) -> Result<Variant> {
        let response = self.link.call(&self.function, view.state, view.side)?;
        Ok(response.value.as_ref().map(Variant::from_json).unwrap_or_default())
    }

    fn write_config(&self, cfg: &mut Config) {
        cfg.set("function", self.function.as_str());
        self.link.write_state(cfg);
    }
}

/// Stage that hands the whole phase to one script function
pub struct ScriptStage {
    id: String,
    function: String,
    link: ScriptLink,
}

impl Stage for ScriptStage {
    fn play_stage(&mut self, ctx: &mut DecisionContext) -> bool {
        let observer = GamestateObserver::new(ctx.state());
        match self.link.call(&self.function, ctx.state(), ctx.side()) {
            Ok(response) => {
                debug!("Script stage '{}' returned {} action(s)", self.id, response.actions.len());
                ScriptLink::issue(&response.actions, ctx);
            }
            Err(e) => warn!("Script stage '{}' failed: {}", self.id, e),
        }
        observer.is_gamestate_changed(ctx.state())
    }
}

impl Component for ScriptStage {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        SCRIPT_STAGE
    }

    fn engine(&self) -> &str {
        SCRIPT_ENGINE
    }

    fn to_config(&self) -> Config {
        let mut cfg = Config::new()
            .with("id", self.id.as_str())
            .with("name", SCRIPT_STAGE)
            .with("engine", SCRIPT_ENGINE)
            .with("function", self.function.as_str());
        self.link.write_state(&mut cfg);
        cfg
    }
}

pub struct ScriptEngine {
    interpreter: Rc<dyn Interpreter>,
}

impl ScriptEngine {
    pub fn new(interpreter: Rc<dyn Interpreter>) -> Self {
        Self { interpreter }
    }
}

impl Engine for ScriptEngine {
    fn name(&self) -> &str {
        SCRIPT_ENGINE
    }

    fn parse_candidate_action(&self, cfg: &Config, _engines: &EngineSet, out: &mut Vec<Box<CandidateAction>>) {
        let name = cfg.str_or("name", SCRIPT_CA);
        if name != SCRIPT_CA {
            unknown_component(SCRIPT_ENGINE, "candidate_action", &name);
            return;
        }
        match ScriptCa::from_config(cfg, Rc::clone(&self.interpreter)) {
            Ok(behavior) => {
                let mut info = CaInfo::from_config(cfg, SCRIPT_ENGINE, BAD_SCORE);
                info.name = name;
                debug!("Built script candidate action '{}'", info.id);
                out.push(Box::new(CandidateAction::new(info, Box::new(behavior))));
            }
            Err(e) => warn!("Skipping script candidate action '{}': {}", cfg.str_or("id", ""), e),
        }
    }

    fn parse_stage(&self, cfg: &Config, _engines: &EngineSet, out: &mut Vec<Box<dyn Stage>>) {
        let name = cfg.str_or("name", SCRIPT_STAGE);
        if name != SCRIPT_STAGE {
            unknown_component(SCRIPT_ENGINE, "stage", &name);
            return;
        }
        let Some(function) = cfg.string("function") else {
            warn!("Skipping script stage '{}': no 'function' attribute", cfg.str_or("id", ""));
            return;
        };
        out.push(Box::new(ScriptStage {
            id: cfg.str_or("id", SCRIPT_STAGE),
            function,
            link: ScriptLink::new(Rc::clone(&self.interpreter), cfg),
        }));
    }

    fn parse_aspect(&self, aspect_id: &str, cfg: &Config, engines: &EngineSet, out: &mut Vec<Box<dyn Aspect>>) {
        let name = cfg.str_or("name", SCRIPT_ASPECT);
        if name != SCRIPT_ASPECT {
            unknown_component(SCRIPT_ENGINE, "aspect", &name);
            return;
        }
        let Some(factory) = engines.aspect_factory(aspect_id) else {
            return;
        };
        let Some(function) = cfg.string("function") else {
            warn!("Skipping script aspect '{}': no 'function' attribute", aspect_id);
            return;
        };
        let source = ScriptSource {
            link: ScriptLink::new(Rc::clone(&self.interpreter), cfg),
            function,
        };
        let mut cfg = cfg.clone();
        cfg.set("name", SCRIPT_ASPECT);
        out.push(factory.dynamic(aspect_id, &cfg, SCRIPT_ENGINE, Box::new(source)));
    }
}
