//! Fallback stage: hand the turn to a nested AI
//!
//! The nested AI is a full decision tree (aspects, stages, goals) built from
//! the stage's inner `[ai]` config. It plays with the outer world, random
//! generator and recursion counter, so a chain of fallbacks cannot recurse
//! without bound.

use tracing::{debug, error};

use super::{play_stages, Stage, FALLBACK_STAGE};
use crate::ai::aspect::AspectEvent;
use crate::ai::component::Component;
use crate::ai::composite::AiTree;
use crate::ai::context::DecisionContext;
use crate::ai::engine::{EngineSet, NATIVE_ENGINE};
use crate::ai::path::PathElement;
use crate::config::Config;
use crate::core::error::Result;

pub struct FallbackStage {
    id: String,
    tree: AiTree,
}

impl FallbackStage {
    pub fn new(id: &str, tree: AiTree) -> Self {
        Self { id: id.to_string(), tree }
    }

    pub fn from_config(cfg: &Config, engines: &EngineSet) -> Self {
        let inner = cfg.child("ai").cloned().unwrap_or_default();
        let id = cfg.str_or("id", FALLBACK_STAGE);
        Self::new(&id, AiTree::from_config(&inner, engines))
    }

    pub fn tree(&self) -> &AiTree {
        &self.tree
    }
}

impl Stage for FallbackStage {
    fn play_stage(&mut self, ctx: &mut DecisionContext) -> bool {
        let _guard = match ctx.recursion().enter() {
            Ok(guard) => guard,
            Err(e) => {
                error!("Fallback stage '{}' not played: {}", self.id, e);
                return false;
            }
        };
        debug!("Fallback stage '{}' playing nested AI", self.id);

        let (aspects, stages, goals) = self.tree.parts_mut();
        let mut nested = ctx.nested(aspects, goals);
        let changed = play_stages(stages, &mut nested);
        let removals = nested.take_removals();
        drop(nested);

        for path in removals {
            ctx.request_removal(format!("stage['{}'].{}", self.id, path));
        }
        if changed {
            ctx.aspects_mut().on_event(AspectEvent::GamestateChanged);
            ctx.aspects_mut().on_event(AspectEvent::MinorGamestateChanged);
        }
        changed
    }

    fn on_turn_start(&mut self) {
        self.tree.on_turn_start();
    }

    fn on_aspect_event(&mut self, event: AspectEvent) {
        self.tree.on_event(event);
    }
}

impl Component for FallbackStage {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        FALLBACK_STAGE
    }

    fn engine(&self) -> &str {
        NATIVE_ENGINE
    }

    fn get_child(&mut self, element: &PathElement) -> Option<&mut dyn Component> {
        self.tree.get_child(element)
    }

    fn add_child(&mut self, element: &PathElement, cfg: &Config, engines: &EngineSet) -> Result<()> {
        self.tree.add_child(element, cfg, engines)
    }

    fn change_child(&mut self, element: &PathElement, cfg: &Config, engines: &EngineSet) -> Result<()> {
        self.tree.change_child(element, cfg, engines)
    }

    fn delete_child(&mut self, element: &PathElement) -> Result<()> {
        self.tree.delete_child(element)
    }

    fn child_configs(&self, element: &PathElement) -> Vec<Config> {
        self.tree.child_configs(element)
    }

    fn to_config(&self) -> Config {
        Config::new()
            .with("id", self.id.as_str())
            .with("name", FALLBACK_STAGE)
            .with("engine", NATIVE_ENGINE)
            .with_child("ai", self.tree.to_config())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::ca::testing::{aspects, place, world};
    use crate::ai::composite::CompositeAi;
    use crate::ai::context::RecursionCounter;
    use crate::core::config::EngineSettings;
    use crate::core::types::MapLocation;
    use crate::game::actions::GameWorld;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    const NESTED: &str = r#"
        [[stage]]
        id = "outer"
        name = "fallback"

        [[stage.ai.stage]]
        id = "too_deep"
        name = "fallback"

        [[stage.ai.stage.ai.stage]]
        id = "never"
        name = "candidate_action_loop"

        [[stage.ai.stage.ai.stage.candidate_action]]
        name = "villages"

        [[stage.ai.stage]]
        id = "grab"
        name = "candidate_action_loop"

        [[stage.ai.stage.candidate_action]]
        name = "villages"
    "#;

    fn nested_ai(max_recursion_depth: u32) -> CompositeAi {
        let settings = EngineSettings {
            max_recursion_depth,
            ..EngineSettings::default()
        };
        let cfg = Config::from_toml_str(NESTED).unwrap();
        CompositeAi::new(1, &cfg, EngineSet::new(settings))
    }

    #[test]
    fn test_nested_tree_is_addressable() {
        let mut ai = nested_ai(5);
        let found = ai.get("stage['outer'].stage['grab'].candidate_action['villages']").unwrap();
        assert_eq!(found[0].str_or("name", ""), "villages");
        assert!(ai.get("stage['outer'].stage['too_deep'].stage['never']").is_ok());
    }

    #[test]
    fn test_recursion_limit_aborts_only_the_deep_branch() {
        let mut w = world(". v . .");
        place(&mut w, "Spearman", 1, MapLocation::new(0, 0), false);
        let mut ai = nested_ai(1);

        // the inner fallback is refused, the sibling stage still plays
        assert!(ai.play_turn(&mut w));
        assert_eq!(w.state().map.village_owner(&MapLocation::new(1, 0)), Some(1));
    }

    #[test]
    fn test_refused_fallback_reports_no_change() {
        let mut w = world(". v . .");
        place(&mut w, "Spearman", 1, MapLocation::new(0, 0), false);
        let cfg = Config::from_toml_str(NESTED).unwrap();
        let engines = EngineSet::new(EngineSettings::default());
        let mut stages = Vec::new();
        engines.parse_stage(cfg.child("stage").unwrap(), &mut stages);

        let mut set = aspects(&[]);
        let settings = EngineSettings::default();
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let counter = RecursionCounter::new(1);
        let _held = counter.enter().unwrap();
        let mut ctx = DecisionContext::new(1, &mut w, &mut set, &[], &mut rng, &settings).with_recursion(counter.clone());
        assert!(!stages[0].play_stage(&mut ctx));
        drop(ctx);
        assert_eq!(counter.depth(), 1);
        assert_eq!(w.state().map.village_owner(&MapLocation::new(1, 0)), None);
    }
}
