//! Engines: the backends that turn config into components
//!
//! Every component config names its backend with `engine=` (default
//! `native`). The engine set dispatches to the matching engine, which looks
//! the component's `name=` up in its own registration table. Unknown
//! engines and unknown names are logged and the component is skipped.

pub mod formula;
pub mod native;
pub mod script;

use std::rc::Rc;
use tracing::warn;

use super::aspect::{Aspect, AspectFactory, AspectRegistry};
use super::candidate_action::CandidateAction;
use super::goal::Goal;
use super::stage::Stage;
use crate::config::Config;
use crate::core::config::EngineSettings;
use crate::core::error::{AiError, Result};

pub use formula::FormulaEngine;
pub use native::NativeEngine;
pub use script::{Interpreter, ScriptEngine, ScriptHost};

pub const NATIVE_ENGINE: &str = "native";
pub const FORMULA_ENGINE: &str = "formula";
pub const SCRIPT_ENGINE: &str = "script";

/// Other names the embedded-script engine answers to
const SCRIPT_ALIASES: [&str; 1] = ["embedded-script"];

/// One backend family. Each parse call appends zero or more components to
/// `out`; a backend that cannot build the requested kind logs and appends
/// nothing.
pub trait Engine {
    fn name(&self) -> &str;

    fn parse_candidate_action(&self, cfg: &Config, _engines: &EngineSet, _out: &mut Vec<Box<CandidateAction>>) {
        warn_unsupported(self.name(), "candidate_action", cfg);
    }

    fn parse_stage(&self, cfg: &Config, _engines: &EngineSet, _out: &mut Vec<Box<dyn Stage>>) {
        warn_unsupported(self.name(), "stage", cfg);
    }

    /// Build one facet (or a whole aspect) of the known aspect `aspect_id`
    fn parse_aspect(&self, _aspect_id: &str, cfg: &Config, _engines: &EngineSet, _out: &mut Vec<Box<dyn Aspect>>) {
        warn_unsupported(self.name(), "aspect", cfg);
    }

    fn parse_goal(&self, cfg: &Config, _engines: &EngineSet, _out: &mut Vec<Box<Goal>>) {
        warn_unsupported(self.name(), "goal", cfg);
    }

    fn to_config(&self) -> Config {
        Config::new().with("name", self.name())
    }
}

fn warn_unsupported(engine: &str, kind: &'static str, cfg: &Config) {
    let error = AiError::UnknownComponent {
        kind,
        name: cfg.str_or("name", ""),
        engine: engine.to_string(),
    };
    warn!("Skipping component: {}", error);
}

/// Log an unknown implementation name the way every engine reports it
pub(crate) fn unknown_component(engine: &str, kind: &'static str, name: &str) {
    let error = AiError::UnknownComponent {
        kind,
        name: name.to_string(),
        engine: engine.to_string(),
    };
    warn!("Skipping component: {}", error);
}

/// The engines available to one AI, plus the shared aspect registry and
/// engine settings
pub struct EngineSet {
    engines: Vec<Box<dyn Engine>>,
    aspects: AspectRegistry,
    settings: EngineSettings,
}

impl EngineSet {
    /// Native and formula engines; the script engine needs an interpreter
    pub fn new(settings: EngineSettings) -> Self {
        Self {
            engines: vec![Box::new(NativeEngine::new()), Box::new(FormulaEngine::new())],
            aspects: AspectRegistry::builtin(),
            settings,
        }
    }

    pub fn with_interpreter(mut self, interpreter: Rc<dyn Interpreter>) -> Self {
        self.register(Box::new(ScriptEngine::new(interpreter)));
        self
    }

    /// Add an engine, replacing one with the same name
    pub fn register(&mut self, engine: Box<dyn Engine>) {
        match self.engines.iter().position(|e| e.name() == engine.name()) {
            Some(i) => self.engines[i] = engine,
            None => self.engines.push(engine),
        }
    }

    pub fn engine(&self, name: &str) -> Result<&dyn Engine> {
        let name = if SCRIPT_ALIASES.contains(&name) { SCRIPT_ENGINE } else { name };
        self.engines
            .iter()
            .find(|e| e.name() == name)
            .map(|e| e.as_ref())
            .ok_or_else(|| AiError::UnknownEngine(name.to_string()))
    }

    pub fn engine_names(&self) -> impl Iterator<Item = &str> {
        self.engines.iter().map(|e| e.name())
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn aspect_registry(&self) -> &AspectRegistry {
        &self.aspects
    }

    pub fn aspect_registry_mut(&mut self) -> &mut AspectRegistry {
        &mut self.aspects
    }

    /// Factory for a known aspect id, logging unknown ids
    pub(crate) fn aspect_factory(&self, aspect_id: &str) -> Option<&dyn AspectFactory> {
        let factory = self.aspects.factory(aspect_id);
        if factory.is_none() {
            warn!("Skipping unknown aspect '{}'", aspect_id);
        }
        factory
    }

    fn resolve(&self, cfg: &Config, kind: &str) -> Option<&dyn Engine> {
        let name = cfg.str_or("engine", NATIVE_ENGINE);
        match self.engine(&name) {
            Ok(engine) => Some(engine),
            Err(e) => {
                warn!("Skipping {} '{}': {}", kind, cfg.str_or("id", ""), e);
                None
            }
        }
    }

    pub fn parse_candidate_action(&self, cfg: &Config, out: &mut Vec<Box<CandidateAction>>) {
        if let Some(engine) = self.resolve(cfg, "candidate_action") {
            engine.parse_candidate_action(cfg, self, out);
        }
    }

    pub fn parse_stage(&self, cfg: &Config, out: &mut Vec<Box<dyn Stage>>) {
        if let Some(engine) = self.resolve(cfg, "stage") {
            engine.parse_stage(cfg, self, out);
        }
    }

    pub fn parse_aspect(&self, aspect_id: &str, cfg: &Config, out: &mut Vec<Box<dyn Aspect>>) {
        if let Some(engine) = self.resolve(cfg, "aspect") {
            engine.parse_aspect(aspect_id, cfg, self, out);
        }
    }

    pub fn parse_goal(&self, cfg: &Config, out: &mut Vec<Box<Goal>>) {
        if let Some(engine) = self.resolve(cfg, "goal") {
            engine.parse_goal(cfg, self, out);
        }
    }

    /// `[engine]` children describing every registered engine
    pub fn to_configs(&self) -> Vec<Config> {
        self.engines.iter().map(|e| e.to_config()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_lookup_and_alias() {
        let engines = EngineSet::new(EngineSettings::default()).with_interpreter(Rc::new(ScriptHost::new()));
        assert_eq!(engines.engine("native").unwrap().name(), NATIVE_ENGINE);
        assert_eq!(engines.engine("embedded-script").unwrap().name(), SCRIPT_ENGINE);
        assert!(matches!(engines.engine("python"), Err(AiError::UnknownEngine(_))));
    }

    #[test]
    fn test_unknown_engine_skips_component() {
        let engines = EngineSet::new(EngineSettings::default());
        let mut out = Vec::new();
        engines.parse_candidate_action(&Config::new().with("engine", "script").with("name", "x"), &mut out);
        assert!(out.is_empty());
    }

    #[test]
    fn test_register_replaces_engine() {
        struct Quiet;
        impl Engine for Quiet {
            fn name(&self) -> &str {
                FORMULA_ENGINE
            }
        }
        let mut engines = EngineSet::new(EngineSettings::default());
        let before = engines.engine_names().count();
        engines.register(Box::new(Quiet));
        assert_eq!(engines.engine_names().count(), before);
        let mut out = Vec::new();
        engines.parse_candidate_action(&Config::new().with("engine", "formula"), &mut out);
        assert!(out.is_empty());
    }
}
