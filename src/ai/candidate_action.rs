//! Candidate actions: scoreable, executable units of behavior
//!
//! The identity and bookkeeping every candidate action shares lives in
//! [`CaInfo`]; what it actually does is a boxed [`CaBehavior`] supplied by
//! the engine that built it.

use tracing::debug;

use super::component::Component;
use super::context::DecisionContext;
use crate::config::Config;

/// Universal floor: at or below this a candidate action cannot act
pub const BAD_SCORE: f64 = 0.0;

/// Default a-priori ceiling of a candidate action's score
pub const HIGH_SCORE: f64 = 10_000_000.0;

/// Shared state of a candidate action
#[derive(Debug, Clone, PartialEq)]
pub struct CaInfo {
    pub id: String,
    pub name: String,
    pub engine: String,
    /// Free-form classification
    pub ca_type: String,
    pub enabled: bool,
    /// Result of the last evaluation
    pub score: f64,
    /// Score the action reports when it can act (`score=` in config)
    pub default_score: f64,
    pub max_score: f64,
    pub to_be_removed: bool,
}

impl CaInfo {
    pub fn new(id: &str, name: &str, engine: &str, default_score: f64) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            engine: engine.to_string(),
            ca_type: String::new(),
            enabled: true,
            score: BAD_SCORE,
            default_score,
            max_score: HIGH_SCORE,
            to_be_removed: false,
        }
    }

    /// Read the common attributes; `id` defaults to the name
    pub fn from_config(cfg: &Config, engine: &str, default_score: f64) -> Self {
        let name = cfg.str_or("name", "");
        let id = cfg.str_or("id", &name);
        Self {
            ca_type: cfg.str_or("type", ""),
            enabled: cfg.bool_or("enabled", true),
            default_score: cfg.float_or("score", default_score),
            max_score: cfg.float_or("max_score", HIGH_SCORE),
            ..Self::new(&id, &name, engine, default_score)
        }
    }

    pub fn write_config(&self, cfg: &mut Config) {
        cfg.set("id", self.id.as_str());
        cfg.set("name", self.name.as_str());
        cfg.set("engine", self.engine.as_str());
        if !self.ca_type.is_empty() {
            cfg.set("type", self.ca_type.as_str());
        }
        if !self.enabled {
            cfg.set("enabled", false);
        }
        cfg.set("score", self.default_score);
        cfg.set("max_score", self.max_score);
    }
}

/// Backend-specific behavior of a candidate action
pub trait CaBehavior {
    /// Score in `BAD_SCORE..=max_score`; must not change game state
    fn evaluate(&mut self, info: &CaInfo, ctx: &mut DecisionContext) -> f64;

    /// Carry out what the last evaluation found
    fn execute(&mut self, info: &CaInfo, ctx: &mut DecisionContext);

    /// Behavior-specific attributes and children for `to_config()`
    fn write_config(&self, _cfg: &mut Config) {}

    fn on_turn_start(&mut self) {}

    /// Whether the action asked to be removed from its stage
    fn wants_removal(&self) -> bool {
        false
    }
}

pub struct CandidateAction {
    info: CaInfo,
    behavior: Box<dyn CaBehavior>,
}

impl CandidateAction {
    pub fn new(info: CaInfo, behavior: Box<dyn CaBehavior>) -> Self {
        Self { info, behavior }
    }

    pub fn info(&self) -> &CaInfo {
        &self.info
    }

    pub fn is_enabled(&self) -> bool {
        self.info.enabled
    }

    pub fn enable(&mut self) {
        self.info.enabled = true;
    }

    pub fn disable(&mut self) {
        self.info.enabled = false;
    }

    pub fn score(&self) -> f64 {
        self.info.score
    }

    pub fn max_score(&self) -> f64 {
        self.info.max_score
    }

    pub fn is_to_be_removed(&self) -> bool {
        self.info.to_be_removed
    }

    pub fn mark_for_removal(&mut self) {
        self.info.to_be_removed = true;
    }

    /// Evaluate and remember the score, clamped to `max_score`
    pub fn evaluate(&mut self, ctx: &mut DecisionContext) -> f64 {
        let raw = self.behavior.evaluate(&self.info, ctx);
        let score = if raw.is_nan() { BAD_SCORE } else { raw.min(self.info.max_score).max(BAD_SCORE) };
        debug!("Candidate action '{}' scored {}", self.info.id, score);
        self.info.score = score;
        score
    }

    pub fn execute(&mut self, ctx: &mut DecisionContext) {
        debug!("Executing candidate action '{}' (score {})", self.info.id, self.info.score);
        self.behavior.execute(&self.info, ctx);
        if self.behavior.wants_removal() {
            self.info.to_be_removed = true;
        }
    }

    pub fn on_turn_start(&mut self) {
        self.behavior.on_turn_start();
    }
}

impl Component for CandidateAction {
    fn id(&self) -> &str {
        &self.info.id
    }

    fn name(&self) -> &str {
        &self.info.name
    }

    fn engine(&self) -> &str {
        &self.info.engine
    }

    fn to_config(&self) -> Config {
        let mut cfg = Config::new();
        self.info.write_config(&mut cfg);
        self.behavior.write_config(&mut cfg);
        cfg
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_info_from_config() {
        let cfg = Config::new()
            .with("name", "combat")
            .with("max_score", 100000.0)
            .with("enabled", "no");
        let info = CaInfo::from_config(&cfg, "native", 5.0);
        assert_eq!(info.id, "combat");
        assert_eq!(info.default_score, 5.0);
        assert_eq!(info.max_score, 100000.0);
        assert!(!info.enabled);
        assert_eq!(info.score, BAD_SCORE);
    }

    #[test]
    fn test_info_config_round_trip() {
        let mut info = CaInfo::new("grab", "villages", "native", 60000.0);
        info.ca_type = "movement".into();
        let mut cfg = Config::new();
        info.write_config(&mut cfg);
        assert_eq!(CaInfo::from_config(&cfg, "native", 0.0), info);
    }
}
