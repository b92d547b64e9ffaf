//! Typed aspects: standard, composite and dynamically computed
//!
//! The cache is an explicit state machine. `recalculate()` fills one of the
//! two representations; reading the other derives it through the type's
//! translator and moves the cache to `Both`.

use std::any::Any;
use std::iter;
use tracing::{debug, warn};

use super::registry::STANDARD_ASPECT;
use super::value::AspectValue;
use super::{Activation, Aspect, AspectEvent, AspectView, InvalidationFlags};
use crate::ai::component::{configs_of, no_children, not_found, Component};
use crate::ai::engine::{EngineSet, NATIVE_ENGINE};
use crate::ai::path::{PathElement, Selector};
use crate::ai::variant::Variant;
use crate::config::Config;
use crate::core::error::{AiError, Result};

/// Synthetic id of a composite aspect's default facet
pub const DEFAULT_FACET_ID: &str = "default_facet";

pub const COMPOSITE_ASPECT: &str = "composite_aspect";

/// Backend hook computing an aspect value as a variant
pub trait VariantSource {
    fn compute(&mut self, view: &AspectView) -> Result<Variant>;

    /// Write the source's own attributes (formula text, script function, ...)
    fn write_config(&self, cfg: &mut Config);
}

#[derive(Debug, Clone, PartialEq)]
enum AspectCache<T> {
    Invalid,
    Value(T),
    Variant(Variant),
    Both(T, Variant),
}

enum AspectKind<T: AspectValue> {
    Standard(T),
    Composite {
        facets: Vec<Box<TypedAspect<T>>>,
        default: Box<TypedAspect<T>>,
        builtin: T,
    },
    Dynamic(Box<dyn VariantSource>),
}

pub struct TypedAspect<T: AspectValue> {
    id: String,
    name: String,
    engine: String,
    activation: Activation,
    invalidation: InvalidationFlags,
    cache: AspectCache<T>,
    kind: AspectKind<T>,
    recalculations: u32,
}

impl<T: AspectValue> TypedAspect<T> {
    fn base(id: &str, name: &str, engine: &str, kind: AspectKind<T>) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            engine: engine.to_string(),
            activation: Activation::default(),
            invalidation: InvalidationFlags::default(),
            cache: AspectCache::Invalid,
            kind,
            recalculations: 0,
        }
    }

    fn with_common_config(mut self, cfg: &Config) -> Self {
        self.activation = Activation::from_config(cfg);
        self.invalidation = InvalidationFlags::from_config(cfg);
        self
    }

    /// Fixed value
    pub fn standard(id: &str, value: T) -> Self {
        Self::base(id, STANDARD_ASPECT, NATIVE_ENGINE, AspectKind::Standard(value))
    }

    /// Fixed value read from config, `fallback` when the config has none
    pub fn standard_from_config(id: &str, cfg: &Config, fallback: &T) -> Self {
        let value = T::from_config(cfg).unwrap_or_else(|| {
            warn!("Aspect '{}' has no usable {} value, using default", id, T::TYPE_NAME);
            fallback.clone()
        });
        let id = cfg.str_or("id", id);
        Self::base(&id, STANDARD_ASPECT, NATIVE_ENGINE, AspectKind::Standard(value)).with_common_config(cfg)
    }

    /// Value computed by a backend
    pub fn dynamic(id: &str, cfg: &Config, engine: &str, source: Box<dyn VariantSource>) -> Self {
        let name = cfg.str_or("name", "");
        let id = cfg.str_or("id", id);
        Self::base(&id, &name, engine, AspectKind::Dynamic(source)).with_common_config(cfg)
    }

    /// Composite with no facets and a builtin default
    pub fn composite(id: &str, builtin: T) -> Self {
        let default = Self::standard(DEFAULT_FACET_ID, builtin.clone());
        Self::base(
            id,
            COMPOSITE_ASPECT,
            NATIVE_ENGINE,
            AspectKind::Composite {
                facets: Vec::new(),
                default: Box::new(default),
                builtin,
            },
        )
    }

    /// Composite built from `[facet]` and `[default]` children
    pub fn composite_from_config(id: &str, cfg: &Config, builtin: T, engines: &EngineSet) -> Self {
        let mut aspect = Self::composite(id, builtin).with_common_config(cfg);
        for facet_cfg in cfg.children("facet") {
            if let Err(e) = aspect.add_facet(facet_cfg, None, engines) {
                warn!("Skipping facet of aspect '{}': {}", id, e);
            }
        }
        if let Some(default_cfg) = cfg.child("default") {
            if let Err(e) = aspect.replace_default(default_cfg, engines) {
                warn!("Keeping builtin default of aspect '{}': {}", id, e);
            }
        }
        aspect
    }

    /// Build one facet of this aspect's type through the engines
    fn build_facet(&self, cfg: &Config, engines: &EngineSet) -> Result<Box<TypedAspect<T>>> {
        let mut built = Vec::new();
        engines.parse_aspect(&self.id, cfg, &mut built);
        let aspect = built
            .pop()
            .ok_or_else(|| AiError::Config(format!("no facet built for aspect '{}'", self.id)))?;
        let held = aspect.type_name();
        match aspect.into_any().downcast::<TypedAspect<T>>() {
            Ok(facet) => Ok(facet),
            Err(_) => panic!(
                "facet of aspect '{}' holds {} instead of {}",
                self.id,
                held,
                T::TYPE_NAME
            ),
        }
    }

    fn add_facet(&mut self, cfg: &Config, position: Option<usize>, engines: &EngineSet) -> Result<()> {
        let mut facet = self.build_facet(cfg, engines)?;
        if !cfg.has_attr("id") {
            facet.id = String::new();
        }
        match &mut self.kind {
            AspectKind::Composite { facets, .. } => {
                let at = position.unwrap_or(facets.len()).min(facets.len());
                facets.insert(at, facet);
                self.invalidate_self();
                Ok(())
            }
            _ => Err(AiError::Config(format!("aspect '{}' is not a composite", self.id))),
        }
    }

    fn replace_default(&mut self, cfg: &Config, engines: &EngineSet) -> Result<()> {
        let mut facet = self.build_facet(cfg, engines)?;
        facet.id = DEFAULT_FACET_ID.to_string();
        match &mut self.kind {
            AspectKind::Composite { default, .. } => {
                *default = facet;
                self.invalidate_self();
                Ok(())
            }
            _ => Err(AiError::Config(format!("aspect '{}' is not a composite", self.id))),
        }
    }

    fn reset_default(&mut self) -> Result<()> {
        match &mut self.kind {
            AspectKind::Composite { default, builtin, .. } => {
                **default = Self::standard(DEFAULT_FACET_ID, builtin.clone());
                self.invalidate_self();
                Ok(())
            }
            _ => Err(AiError::Config(format!("aspect '{}' is not a composite", self.id))),
        }
    }

    fn targets_default(element: &PathElement) -> bool {
        element.property == "default" || matches!(element.selector(), Selector::Id(DEFAULT_FACET_ID))
    }

    pub fn facet_count(&self) -> usize {
        match &self.kind {
            AspectKind::Composite { facets, .. } => facets.len(),
            _ => 0,
        }
    }

    pub fn is_composite(&self) -> bool {
        matches!(self.kind, AspectKind::Composite { .. })
    }

    /// Current typed value, recalculating or translating as needed
    pub fn get(&mut self, view: &AspectView) -> &T {
        if matches!(self.cache, AspectCache::Invalid) {
            self.recalculate(view);
        }
        self.cache = match std::mem::replace(&mut self.cache, AspectCache::Invalid) {
            AspectCache::Variant(variant) => {
                let value = self.translate(&variant);
                AspectCache::Both(value, variant)
            }
            other => other,
        };
        match &self.cache {
            AspectCache::Value(value) | AspectCache::Both(value, _) => value,
            AspectCache::Invalid | AspectCache::Variant(_) => {
                unreachable!("aspect cache holds a typed value after translation")
            }
        }
    }

    fn translate(&self, variant: &Variant) -> T {
        T::from_variant(variant).unwrap_or_else(|| {
            warn!(
                "Aspect '{}' produced {} which is not a {}, using default",
                self.id,
                variant.type_name(),
                T::TYPE_NAME
            );
            self.fallback()
        })
    }

    fn fallback(&self) -> T {
        match &self.kind {
            AspectKind::Standard(value) => value.clone(),
            AspectKind::Composite { builtin, .. } => builtin.clone(),
            AspectKind::Dynamic(_) => T::default(),
        }
    }

    fn invalidate_self(&mut self) {
        self.cache = AspectCache::Invalid;
    }

    fn facets_and_default_mut(&mut self) -> Box<dyn Iterator<Item = &mut Box<TypedAspect<T>>> + '_> {
        match &mut self.kind {
            AspectKind::Composite { facets, default, .. } => Box::new(facets.iter_mut().chain(iter::once(default))),
            _ => Box::new(iter::empty()),
        }
    }

    fn write_own_config(&self, cfg: &mut Config) {
        if !self.id.is_empty() {
            cfg.set("id", self.id.as_str());
        }
        cfg.set("name", self.name.as_str());
        cfg.set("engine", self.engine.as_str());
        self.activation.write_config(cfg);
        self.invalidation.write_config(cfg);
    }
}

impl<T: AspectValue> Aspect for TypedAspect<T> {
    fn type_name(&self) -> &'static str {
        T::TYPE_NAME
    }

    fn is_valid(&self) -> bool {
        !matches!(self.cache, AspectCache::Invalid)
    }

    fn invalidate(&mut self) {
        self.invalidate_self();
        for facet in self.facets_and_default_mut() {
            facet.invalidate();
        }
    }

    fn on_event(&mut self, event: AspectEvent) {
        let mut stale = self.invalidation.matches(event);
        for facet in self.facets_and_default_mut() {
            let was_valid = facet.is_valid();
            facet.on_event(event);
            stale |= was_valid && !facet.is_valid();
        }
        if stale {
            self.invalidate_self();
        }
    }

    fn active(&self, view: &AspectView) -> bool {
        self.activation.is_active(view.state)
    }

    fn recalculate(&mut self, view: &AspectView) {
        self.recalculations += 1;
        self.cache = match &mut self.kind {
            AspectKind::Standard(value) => AspectCache::Value(value.clone()),
            AspectKind::Composite { facets, default, .. } => {
                let value = match facets.iter_mut().find(|f| f.active(view)) {
                    Some(facet) => facet.get(view).clone(),
                    None => default.get(view).clone(),
                };
                AspectCache::Value(value)
            }
            AspectKind::Dynamic(source) => match source.compute(view) {
                Ok(variant) => AspectCache::Variant(variant),
                Err(e) => {
                    warn!("Aspect '{}' failed to compute: {}", self.id, e);
                    AspectCache::Value(T::default())
                }
            },
        };
        debug!("Aspect '{}' recalculated", self.id);
    }

    fn get_variant(&mut self, view: &AspectView) -> Variant {
        if matches!(self.cache, AspectCache::Invalid) {
            self.recalculate(view);
        }
        self.cache = match std::mem::replace(&mut self.cache, AspectCache::Invalid) {
            AspectCache::Value(value) => {
                let variant = value.to_variant();
                AspectCache::Both(value, variant)
            }
            other => other,
        };
        match &self.cache {
            AspectCache::Variant(variant) | AspectCache::Both(_, variant) => variant.clone(),
            AspectCache::Invalid | AspectCache::Value(_) => Variant::Null,
        }
    }

    fn recalculation_count(&self) -> u32 {
        self.recalculations
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

impl<T: AspectValue> Component for TypedAspect<T> {
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
        let is_default = Self::targets_default(element);
        let AspectKind::Composite { facets, default, .. } = &mut self.kind else {
            return None;
        };
        if is_default {
            return Some(&mut **default);
        }
        if element.property != "facet" {
            return None;
        }
        let index = *element.matches(facets.iter().map(|f| f.id.as_str())).first()?;
        Some(&mut *facets[index])
    }

    fn add_child(&mut self, element: &PathElement, cfg: &Config, engines: &EngineSet) -> Result<()> {
        if !self.is_composite() {
            return Err(no_children(&self.id, element));
        }
        if Self::targets_default(element) {
            return self.replace_default(cfg, engines);
        }
        if element.property != "facet" {
            return Err(no_children(&self.id, element));
        }
        let position = match element.selector() {
            Selector::Index(p) => Some(p),
            _ => None,
        };
        self.add_facet(cfg, position, engines)
    }

    fn change_child(&mut self, element: &PathElement, cfg: &Config, engines: &EngineSet) -> Result<()> {
        if !self.is_composite() {
            return Err(no_children(&self.id, element));
        }
        if Self::targets_default(element) {
            return self.replace_default(cfg, engines);
        }
        let AspectKind::Composite { facets, .. } = &self.kind else {
            return Err(no_children(&self.id, element));
        };
        let indices = element.matches(facets.iter().map(|f| f.id.as_str()));
        let Some(&first) = indices.first() else {
            return self.add_facet(cfg, None, engines);
        };
        let mut replacement_cfg = cfg.clone();
        if !replacement_cfg.has_attr("id") && !facets[first].id.is_empty() {
            replacement_cfg.set("id", facets[first].id.as_str());
        }
        let replacement = self.build_facet(&replacement_cfg, engines)?;
        if let AspectKind::Composite { facets, .. } = &mut self.kind {
            for index in indices.into_iter().rev() {
                facets.remove(index);
            }
            let at = first.min(facets.len());
            facets.insert(at, replacement);
        }
        self.invalidate_self();
        Ok(())
    }

    fn delete_child(&mut self, element: &PathElement) -> Result<()> {
        if !self.is_composite() {
            return Err(no_children(&self.id, element));
        }
        if Self::targets_default(element) {
            return self.reset_default();
        }
        if element.property != "facet" {
            return Err(no_children(&self.id, element));
        }
        let AspectKind::Composite { facets, .. } = &mut self.kind else {
            return Err(no_children(&self.id, element));
        };
        let indices = element.matches(facets.iter().map(|f| f.id.as_str()));
        if indices.is_empty() {
            return Err(not_found(element));
        }
        for index in indices.into_iter().rev() {
            facets.remove(index);
        }
        self.invalidate_self();
        Ok(())
    }

    fn child_configs(&self, element: &PathElement) -> Vec<Config> {
        let AspectKind::Composite { facets, default, .. } = &self.kind else {
            return Vec::new();
        };
        if Self::targets_default(element) {
            return vec![default.to_config()];
        }
        if element.property != "facet" {
            return Vec::new();
        }
        configs_of(facets, element)
    }

    fn to_config(&self) -> Config {
        let mut cfg = Config::new();
        self.write_own_config(&mut cfg);
        match &self.kind {
            AspectKind::Standard(value) => value.write_config(&mut cfg),
            AspectKind::Composite { facets, default, .. } => {
                for facet in facets {
                    cfg.add_child("facet", facet.to_config());
                }
                let mut default_cfg = default.to_config();
                default_cfg.remove_attr("id");
                cfg.add_child("default", default_cfg);
            }
            AspectKind::Dynamic(source) => source.write_config(&mut cfg),
        }
        cfg
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::map::GameMap;
    use crate::game::state::GameState;
    use crate::game::unit::UnitTypeCatalog;

    fn state() -> GameState {
        GameState::new(GameMap::new(3, 3), UnitTypeCatalog::new())
    }

    struct Counter(f64);

    impl VariantSource for Counter {
        fn compute(&mut self, _view: &AspectView) -> Result<Variant> {
            self.0 += 1.0;
            Ok(Variant::Real(self.0))
        }

        fn write_config(&self, cfg: &mut Config) {
            cfg.set("start", self.0);
        }
    }

    #[test]
    fn test_standard_cache_counts() {
        let state = state();
        let view = AspectView::new(&state, 1);
        let mut aspect = TypedAspect::standard("aggression", 0.4);
        assert_eq!(*aspect.get(&view), 0.4);
        assert_eq!(*aspect.get(&view), 0.4);
        assert_eq!(aspect.recalculation_count(), 1);
        aspect.invalidate();
        assert!(!aspect.is_valid());
        aspect.get_variant(&view);
        aspect.get(&view);
        assert_eq!(aspect.recalculation_count(), 2);
    }

    #[test]
    fn test_dynamic_variant_translated_once() {
        let state = state();
        let view = AspectView::new(&state, 1);
        let mut aspect: TypedAspect<f64> =
            TypedAspect::dynamic("caution", &Config::new(), "formula", Box::new(Counter(0.0)));
        assert_eq!(*aspect.get(&view), 1.0);
        assert_eq!(aspect.get_variant(&view), Variant::Real(1.0));
        assert_eq!(*aspect.get(&view), 1.0);
        aspect.on_event(AspectEvent::TurnStarted);
        assert_eq!(*aspect.get(&view), 2.0);
        aspect.on_event(AspectEvent::MinorGamestateChanged);
        assert_eq!(*aspect.get(&view), 2.0);
        assert_eq!(aspect.recalculation_count(), 2);
    }

    #[test]
    fn test_wrong_variant_falls_back() {
        struct Words;
        impl VariantSource for Words {
            fn compute(&mut self, _view: &AspectView) -> Result<Variant> {
                Ok(Variant::List(vec![]))
            }
            fn write_config(&self, _cfg: &mut Config) {}
        }
        let state = state();
        let view = AspectView::new(&state, 1);
        let mut aspect: TypedAspect<bool> = TypedAspect::dynamic("passive_leader", &Config::new(), "script", Box::new(Words));
        assert!(!*aspect.get(&view));
    }

    #[test]
    fn test_standard_to_config() {
        let aspect = TypedAspect::standard_from_config("aggression", &Config::new().with("value", 0.9).with("turns", "2-"), &0.4);
        let cfg = aspect.to_config();
        assert_eq!(cfg.float_or("value", 0.0), 0.9);
        assert_eq!(cfg.str_or("turns", ""), "2-");
        assert_eq!(cfg.str_or("name", ""), STANDARD_ASPECT);
    }
}
