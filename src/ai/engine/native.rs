//! The native engine: compiled-in stages, candidate actions and aspects
//!
//! Every implementation is listed in a registration table filled once by
//! [`register_native_components`], keyed by the `name=` used in config.

use tracing::debug;

use super::{unknown_component, Engine, EngineSet, NATIVE_ENGINE};
use crate::ai::aspect::registry::STANDARD_ASPECT;
use crate::ai::aspect::typed::COMPOSITE_ASPECT;
use crate::ai::aspect::Aspect;
use crate::ai::ca::{CombatPhase, GetVillages, MoveLeaderToKeep, MoveToTargets};
use crate::ai::candidate_action::{CaBehavior, CaInfo, CandidateAction};
use crate::ai::goal::{parse_goal_config, Goal};
use crate::ai::recruitment::{Recruitment, RECRUITMENT_CA};
use crate::ai::stage::{CandidateActionLoop, FallbackStage, Stage, CA_LOOP_STAGE, FALLBACK_STAGE};
use crate::config::Config;

type BehaviorBuilder = fn(&Config) -> Box<dyn CaBehavior>;
type StageBuilder = fn(&Config, &EngineSet) -> Box<dyn Stage>;

struct CaEntry {
    name: &'static str,
    default_score: f64,
    build: BehaviorBuilder,
}

struct StageEntry {
    name: &'static str,
    build: StageBuilder,
}

pub struct NativeEngine {
    candidate_actions: Vec<CaEntry>,
    stages: Vec<StageEntry>,
}

impl Default for NativeEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl NativeEngine {
    pub fn new() -> Self {
        let mut engine = Self {
            candidate_actions: Vec::new(),
            stages: Vec::new(),
        };
        register_native_components(&mut engine);
        engine
    }

    pub fn register_candidate_action(&mut self, name: &'static str, default_score: f64, build: BehaviorBuilder) {
        self.candidate_actions.retain(|e| e.name != name);
        self.candidate_actions.push(CaEntry {
            name,
            default_score,
            build,
        });
    }

    pub fn register_stage(&mut self, name: &'static str, build: StageBuilder) {
        self.stages.retain(|e| e.name != name);
        self.stages.push(StageEntry { name, build });
    }

    pub fn candidate_action_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.candidate_actions.iter().map(|e| e.name)
    }
}

/// Every candidate action and stage the native engine ships with
pub fn register_native_components(engine: &mut NativeEngine) {
    engine.register_candidate_action(RECRUITMENT_CA, 180_000.0, |cfg| Box::new(Recruitment::from_config(cfg)));
    engine.register_candidate_action("move_leader_to_keep", 120_000.0, |_| Box::new(MoveLeaderToKeep::new()));
    engine.register_candidate_action("combat", 100_000.0, |_| Box::new(CombatPhase::new()));
    engine.register_candidate_action("villages", 60_000.0, |_| Box::new(GetVillages::new()));
    engine.register_candidate_action("move_to_targets", 20_000.0, |_| Box::new(MoveToTargets::new()));

    engine.register_stage(CA_LOOP_STAGE, |cfg, engines| Box::new(CandidateActionLoop::from_config(cfg, engines)));
    engine.register_stage(FALLBACK_STAGE, |cfg, engines| Box::new(FallbackStage::from_config(cfg, engines)));
}

impl Engine for NativeEngine {
    fn name(&self) -> &str {
        NATIVE_ENGINE
    }

    fn parse_candidate_action(&self, cfg: &Config, _engines: &EngineSet, out: &mut Vec<Box<CandidateAction>>) {
        let name = cfg.str_or("name", "");
        match self.candidate_actions.iter().find(|e| e.name == name) {
            Some(entry) => {
                let info = CaInfo::from_config(cfg, NATIVE_ENGINE, entry.default_score);
                debug!("Built native candidate action '{}' ({})", info.id, name);
                out.push(Box::new(CandidateAction::new(info, (entry.build)(cfg))));
            }
            None => unknown_component(NATIVE_ENGINE, "candidate_action", &name),
        }
    }

    fn parse_stage(&self, cfg: &Config, engines: &EngineSet, out: &mut Vec<Box<dyn Stage>>) {
        let name = cfg.str_or("name", CA_LOOP_STAGE);
        match self.stages.iter().find(|e| e.name == name) {
            Some(entry) => out.push((entry.build)(cfg, engines)),
            None => unknown_component(NATIVE_ENGINE, "stage", &name),
        }
    }

    fn parse_aspect(&self, aspect_id: &str, cfg: &Config, engines: &EngineSet, out: &mut Vec<Box<dyn Aspect>>) {
        let Some(factory) = engines.aspect_factory(aspect_id) else {
            return;
        };
        let name = cfg.str_or("name", STANDARD_ASPECT);
        match name.as_str() {
            STANDARD_ASPECT => out.push(factory.standard(aspect_id, cfg)),
            COMPOSITE_ASPECT => out.push(factory.composite(aspect_id, cfg, engines)),
            other => unknown_component(NATIVE_ENGINE, "aspect", other),
        }
    }

    fn parse_goal(&self, cfg: &Config, _engines: &EngineSet, out: &mut Vec<Box<Goal>>) {
        parse_goal_config(cfg, out);
    }

    fn to_config(&self) -> Config {
        Config::new().with("name", NATIVE_ENGINE)
    }
}
