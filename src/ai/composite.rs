//! The composite AI: one side's live decision tree
//!
//! [`AiTree`] is the root component every path starts from. It always holds
//! every known aspect (builtin defaults first), plus the stages and goals
//! its configuration declared. Configuration is applied as overlays: the
//! facets an overlay brings go in front of the ones already present, so
//! later overlays take precedence.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::collections::BTreeMap;
use tracing::{info, warn};

use super::aspect::typed::COMPOSITE_ASPECT;
use super::aspect::{Aspect, AspectEvent, AspectSet, AspectValue, AspectView};
use super::component::{
    change_matching, child_mut, configs_of, delete_matching, insertion_index, no_children, not_found, Component,
};
use super::context::{AbortHandle, DecisionContext};
use super::engine::{EngineSet, NATIVE_ENGINE};
use super::goal::Goal;
use super::path::{self, ModifyRequest, PathElement, Selector};
use super::stage::{play_stages, Stage};
use crate::config::Config;
use crate::core::error::{AiError, Result};
use crate::core::types::Side;
use crate::game::actions::GameWorld;
use crate::game::state::GameState;

const ASPECT: &str = "aspect";
const STAGE: &str = "stage";
const GOAL: &str = "goal";
const MODIFY_AI: &str = "modify_ai";
const RECRUITMENT_INSTRUCTIONS: &str = "recruitment_instructions";

/// Facets and default replacement one overlay brings for one aspect
#[derive(Debug, Default)]
struct AspectOverlay {
    facets: Vec<Config>,
    default: Option<Config>,
}

fn is_composite_form(cfg: &Config) -> bool {
    cfg.str_or("name", "") == COMPOSITE_ASPECT || cfg.has_child("facet") || cfg.has_child("default")
}

impl AspectOverlay {
    fn from_aspect_config(cfg: &Config) -> Self {
        if is_composite_form(cfg) {
            Self {
                facets: cfg.children("facet").cloned().collect(),
                default: cfg.child("default").cloned(),
            }
        } else {
            let mut facet = cfg.clone();
            facet.remove_attr("id");
            Self {
                facets: vec![facet],
                default: None,
            }
        }
    }
}

/// Turn every aspect shorthand of an `[ai]` config into overlays:
/// `aggression=0.5`, `[avoid] x=.. y=..`, `[[caution]] engine=".." ..`,
/// `[aspect] id=..` and `[recruit]` / `[limit]` instructions.
fn collect_aspect_overlays(cfg: &Config, engines: &EngineSet) -> BTreeMap<String, AspectOverlay> {
    let registry = engines.aspect_registry();
    let mut overlays: BTreeMap<String, AspectOverlay> = BTreeMap::new();

    for (key, value) in cfg.attributes() {
        if registry.contains(key) {
            let facet = Config::new().with("value", value.clone());
            overlays.entry(key.to_string()).or_default().facets.push(facet);
        }
    }

    let mut instructions = Config::new();
    for (tag, child) in cfg.all_children() {
        match tag {
            ASPECT => {
                let Some(id) = child.string("id") else {
                    warn!("Skipping [aspect] without id");
                    continue;
                };
                if !registry.contains(&id) {
                    warn!("Skipping unknown aspect '{}'", id);
                    continue;
                }
                let overlay = AspectOverlay::from_aspect_config(child);
                let entry = overlays.entry(id).or_default();
                entry.facets.extend(overlay.facets);
                if overlay.default.is_some() {
                    entry.default = overlay.default;
                }
            }
            "recruit" | "limit" => {
                instructions.add_child(tag, child.clone());
            }
            _ if registry.contains(tag) => {
                let is_facet = child.has_attr("value")
                    || child.has_child("value")
                    || child.has_attr("engine")
                    || child.has_attr("name");
                let facet = if is_facet {
                    child.clone()
                } else {
                    Config::new().with_child("value", child.clone())
                };
                overlays.entry(tag.to_string()).or_default().facets.push(facet);
            }
            _ => {}
        }
    }

    if !instructions.is_empty() {
        overlays
            .entry(RECRUITMENT_INSTRUCTIONS.to_string())
            .or_default()
            .facets
            .push(Config::new().with_child("value", instructions));
    }
    overlays
}

/// Root of a decision tree
pub struct AiTree {
    aspects: AspectSet,
    stages: Vec<Box<dyn Stage>>,
    goals: Vec<Box<Goal>>,
}

impl AiTree {
    /// Every known aspect with its builtin default, no stages, no goals
    pub fn new(engines: &EngineSet) -> Self {
        let registry = engines.aspect_registry();
        let mut aspects = AspectSet::new();
        for id in registry.ids() {
            if let Some(factory) = registry.factory(id) {
                aspects.insert(factory.builtin(id));
            }
        }
        Self {
            aspects,
            stages: Vec::new(),
            goals: Vec::new(),
        }
    }

    pub fn from_config(cfg: &Config, engines: &EngineSet) -> Self {
        let mut tree = Self::new(engines);
        tree.overlay(cfg, engines);
        tree
    }

    /// Apply an `[ai]` config on top of the current tree. Stages it declares
    /// replace the current stage list; goals are appended; `[modify_ai]`
    /// requests run last.
    pub fn overlay(&mut self, cfg: &Config, engines: &EngineSet) {
        for (id, overlay) in collect_aspect_overlays(cfg, engines) {
            self.apply_aspect_overlay(&id, &overlay, engines);
        }
        if cfg.has_child(STAGE) {
            self.stages.clear();
            for stage_cfg in cfg.children(STAGE) {
                engines.parse_stage(stage_cfg, &mut self.stages);
            }
        }
        for goal_cfg in cfg.children(GOAL) {
            engines.parse_goal(goal_cfg, &mut self.goals);
        }
        for modify_cfg in cfg.children(MODIFY_AI) {
            match ModifyRequest::from_config(modify_cfg) {
                Ok(request) => {
                    path::apply_logged(self, &request, engines);
                }
                Err(e) => warn!("Skipping [modify_ai]: {}", e),
            }
        }
    }

    fn apply_aspect_overlay(&mut self, id: &str, overlay: &AspectOverlay, engines: &EngineSet) {
        let Some(aspect) = self.aspects.get_mut(id) else {
            warn!("Skipping overlay for unknown aspect '{}'", id);
            return;
        };
        for (position, facet) in overlay.facets.iter().enumerate() {
            if let Err(e) = aspect.add_child(&PathElement::with_position("facet", position), facet, engines) {
                warn!("Skipping facet of aspect '{}': {}", id, e);
            }
        }
        if let Some(default) = &overlay.default {
            if let Err(e) = aspect.add_child(&PathElement::new("default"), default, engines) {
                warn!("Keeping default of aspect '{}': {}", id, e);
            }
        }
    }

    pub fn aspects(&self) -> &AspectSet {
        &self.aspects
    }

    pub fn aspects_mut(&mut self) -> &mut AspectSet {
        &mut self.aspects
    }

    pub fn stages(&self) -> &[Box<dyn Stage>] {
        &self.stages
    }

    pub fn goals(&self) -> &[Box<Goal>] {
        &self.goals
    }

    /// Split borrows for playing: aspects and stages mutable, goals shared
    pub fn parts_mut(&mut self) -> (&mut AspectSet, &mut Vec<Box<dyn Stage>>, &[Box<Goal>]) {
        (&mut self.aspects, &mut self.stages, &self.goals)
    }

    pub fn on_turn_start(&mut self) {
        self.on_event(AspectEvent::TurnStarted);
        for stage in &mut self.stages {
            stage.on_turn_start();
        }
    }

    pub fn on_event(&mut self, event: AspectEvent) {
        self.aspects.on_event(event);
        for stage in &mut self.stages {
            stage.on_aspect_event(event);
        }
    }

    fn aspect_id(element: &PathElement, cfg: &Config) -> Result<String> {
        match element.selector() {
            Selector::Id(id) => Ok(id.to_string()),
            _ => cfg.string("id").ok_or_else(|| AiError::InvalidPath {
                path: element.to_string(),
                reason: "aspects are addressed by id".into(),
            }),
        }
    }

    fn rebuilt_aspect(id: &str, cfg: &Config, engines: &EngineSet) -> Result<Box<dyn Aspect>> {
        let factory = engines.aspect_factory(id).ok_or_else(|| AiError::UnknownComponent {
            kind: "aspect",
            name: id.to_string(),
            engine: cfg.str_or("engine", NATIVE_ENGINE),
        })?;
        if cfg.is_empty() {
            return Ok(factory.builtin(id));
        }
        if is_composite_form(cfg) {
            return Ok(factory.composite(id, cfg, engines));
        }
        let mut aspect = factory.builtin(id);
        let mut facet = cfg.clone();
        facet.remove_attr("id");
        aspect.add_child(&PathElement::with_position("facet", 0), &facet, engines)?;
        Ok(aspect)
    }

    fn reset_aspect(&mut self, id: &str) -> Result<()> {
        let aspect = self
            .aspects
            .get_mut(id)
            .ok_or_else(|| AiError::PathNotFound(format!("aspect['{}']", id)))?;
        match aspect.delete_child(&PathElement::with_id("facet", path::WILDCARD)) {
            Ok(()) | Err(AiError::PathNotFound(_)) => {}
            Err(e) => return Err(e),
        }
        aspect.delete_child(&PathElement::new("default"))
    }
}

impl Component for AiTree {
    fn id(&self) -> &str {
        "ai"
    }

    fn name(&self) -> &str {
        "composite_ai"
    }

    fn engine(&self) -> &str {
        NATIVE_ENGINE
    }

    fn get_child(&mut self, element: &PathElement) -> Option<&mut dyn Component> {
        match element.property.as_str() {
            ASPECT => child_mut(self.aspects.boxes_mut(), element),
            STAGE => child_mut(&mut self.stages, element),
            GOAL => child_mut(&mut self.goals, element),
            _ => None,
        }
    }

    /// Adding to an aspect overlays the config onto it
    fn add_child(&mut self, element: &PathElement, cfg: &Config, engines: &EngineSet) -> Result<()> {
        match element.property.as_str() {
            ASPECT => {
                let id = Self::aspect_id(element, cfg)?;
                if !self.aspects.contains(&id) {
                    return Err(AiError::UnknownComponent {
                        kind: "aspect",
                        name: id,
                        engine: cfg.str_or("engine", NATIVE_ENGINE),
                    });
                }
                self.apply_aspect_overlay(&id, &AspectOverlay::from_aspect_config(cfg), engines);
                Ok(())
            }
            STAGE => {
                let mut built = Vec::new();
                engines.parse_stage(cfg, &mut built);
                let at = insertion_index(element, self.stages.len());
                for (offset, stage) in built.into_iter().enumerate() {
                    self.stages.insert(at + offset, stage);
                }
                Ok(())
            }
            GOAL => {
                let mut built = Vec::new();
                engines.parse_goal(cfg, &mut built);
                let at = insertion_index(element, self.goals.len());
                for (offset, goal) in built.into_iter().enumerate() {
                    self.goals.insert(at + offset, goal);
                }
                Ok(())
            }
            _ => Err(no_children("ai", element)),
        }
    }

    /// Changing an aspect rebuilds it from the config alone
    fn change_child(&mut self, element: &PathElement, cfg: &Config, engines: &EngineSet) -> Result<()> {
        match element.property.as_str() {
            ASPECT => {
                let id = Self::aspect_id(element, cfg)?;
                let aspect = Self::rebuilt_aspect(&id, cfg, engines)?;
                self.aspects.insert(aspect);
                Ok(())
            }
            STAGE => change_matching(&mut self.stages, element, cfg, |c| {
                let mut built = Vec::new();
                engines.parse_stage(c, &mut built);
                built
            }),
            GOAL => change_matching(&mut self.goals, element, cfg, |c| {
                let mut built = Vec::new();
                engines.parse_goal(c, &mut built);
                built
            }),
            _ => Err(no_children("ai", element)),
        }
    }

    /// Aspects always exist; deleting one resets it to its builtin default
    fn delete_child(&mut self, element: &PathElement) -> Result<()> {
        match element.property.as_str() {
            ASPECT => {
                let ids: Vec<String> = match element.selector() {
                    Selector::All => self.aspects.ids().map(String::from).collect(),
                    Selector::Id(id) if self.aspects.contains(id) => vec![id.to_string()],
                    Selector::Id(_) => return Err(not_found(element)),
                    Selector::Index(_) | Selector::Unspecified => {
                        return Err(AiError::InvalidPath {
                            path: element.to_string(),
                            reason: "aspects are addressed by id".into(),
                        })
                    }
                };
                for id in ids {
                    self.reset_aspect(&id)?;
                }
                Ok(())
            }
            STAGE => delete_matching(&mut self.stages, element),
            GOAL => delete_matching(&mut self.goals, element),
            _ => Err(no_children("ai", element)),
        }
    }

    fn child_configs(&self, element: &PathElement) -> Vec<Config> {
        match element.property.as_str() {
            ASPECT => configs_of(self.aspects.boxes(), element),
            STAGE => configs_of(&self.stages, element),
            GOAL => configs_of(&self.goals, element),
            _ => Vec::new(),
        }
    }

    fn to_config(&self) -> Config {
        let mut cfg = Config::new();
        for aspect in self.aspects.iter() {
            cfg.add_child(ASPECT, aspect.to_config());
        }
        for stage in &self.stages {
            cfg.add_child(STAGE, stage.to_config());
        }
        for goal in &self.goals {
            cfg.add_child(GOAL, goal.to_config());
        }
        cfg
    }
}

/// One side's AI: its engines, its decision tree and its random generator
pub struct CompositeAi {
    side: Side,
    engines: EngineSet,
    tree: AiTree,
    rng: ChaCha8Rng,
    abort: AbortHandle,
}

impl CompositeAi {
    pub fn new(side: Side, cfg: &Config, engines: EngineSet) -> Self {
        let seed = engines.settings().seed.wrapping_add(u64::from(side));
        let tree = AiTree::from_config(cfg, &engines);
        Self {
            side,
            engines,
            tree,
            rng: ChaCha8Rng::seed_from_u64(seed),
            abort: AbortHandle::new(),
        }
    }

    pub fn side(&self) -> Side {
        self.side
    }

    pub fn engines(&self) -> &EngineSet {
        &self.engines
    }

    pub fn tree(&self) -> &AiTree {
        &self.tree
    }

    pub fn tree_mut(&mut self) -> &mut AiTree {
        &mut self.tree
    }

    pub fn abort_handle(&self) -> AbortHandle {
        self.abort.clone()
    }

    pub fn set_abort_handle(&mut self, abort: AbortHandle) {
        self.abort = abort;
    }

    pub fn overlay(&mut self, cfg: &Config) {
        self.tree.overlay(cfg, &self.engines);
    }

    pub fn new_turn(&mut self) {
        self.tree.on_turn_start();
    }

    pub fn notify(&mut self, event: AspectEvent) {
        self.tree.on_event(event);
    }

    /// Current value of an aspect for this side
    pub fn aspect_value<T: AspectValue>(&mut self, id: &str, state: &GameState) -> T {
        let view = AspectView::new(state, self.side);
        self.tree.aspects.value::<T>(id, &view)
    }

    /// Play every stage once; true when game state changed
    pub fn play_turn(&mut self, world: &mut dyn GameWorld) -> bool {
        info!("Side {} AI playing turn {}", self.side, world.state().turn);
        let (aspects, stages, goals) = self.tree.parts_mut();
        let mut ctx = DecisionContext::new(self.side, world, aspects, goals, &mut self.rng, self.engines.settings())
            .with_abort(self.abort.clone());
        let changed = play_stages(stages, &mut ctx);
        let removals = ctx.take_removals();
        drop(ctx);

        for removal in removals {
            path::apply_logged(&mut self.tree, &ModifyRequest::delete(&removal), &self.engines);
        }
        info!("Side {} AI finished (changed: {})", self.side, changed);
        changed
    }

    pub fn modify(&mut self, request: &ModifyRequest) -> Result<()> {
        path::apply(&mut self.tree, request, &self.engines)
    }

    pub fn get(&mut self, path: &str) -> Result<Vec<Config>> {
        path::get(&mut self.tree, path)
    }

    /// Full description: the tree plus `side` and the engines in use
    pub fn to_config(&self) -> Config {
        let mut cfg = self.tree.to_config();
        cfg.set("side", self.side);
        for engine_cfg in self.engines.to_configs() {
            cfg.add_child("engine", engine_cfg);
        }
        cfg
    }
}
