//! Known aspects: id -> value type and builtin default
//!
//! Filled once by `register_known_aspects`. Engines look up the factory by
//! aspect id so every facet of an aspect is built with the aspect's type.

use super::typed::{TypedAspect, VariantSource};
use super::value::{AspectValue, LocationFilter};
use super::Aspect;
use crate::ai::engine::EngineSet;
use crate::ai::recruitment::instructions::RecruitmentInstructions;
use crate::config::Config;

pub const STANDARD_ASPECT: &str = "standard_aspect";

/// Typed constructors for one known aspect
pub trait AspectFactory {
    fn type_name(&self) -> &'static str;

    /// Composite holding only the builtin default
    fn builtin(&self, id: &str) -> Box<dyn Aspect>;

    fn standard(&self, id: &str, cfg: &Config) -> Box<dyn Aspect>;

    fn dynamic(&self, id: &str, cfg: &Config, engine: &str, source: Box<dyn VariantSource>) -> Box<dyn Aspect>;

    fn composite(&self, id: &str, cfg: &Config, engines: &EngineSet) -> Box<dyn Aspect>;
}

struct TypedFactory<T: AspectValue> {
    builtin: T,
}

impl<T: AspectValue> AspectFactory for TypedFactory<T> {
    fn type_name(&self) -> &'static str {
        T::TYPE_NAME
    }

    fn builtin(&self, id: &str) -> Box<dyn Aspect> {
        Box::new(TypedAspect::composite(id, self.builtin.clone()))
    }

    fn standard(&self, id: &str, cfg: &Config) -> Box<dyn Aspect> {
        Box::new(TypedAspect::standard_from_config(id, cfg, &self.builtin))
    }

    fn dynamic(&self, id: &str, cfg: &Config, engine: &str, source: Box<dyn VariantSource>) -> Box<dyn Aspect> {
        Box::new(TypedAspect::<T>::dynamic(id, cfg, engine, source))
    }

    fn composite(&self, id: &str, cfg: &Config, engines: &EngineSet) -> Box<dyn Aspect> {
        Box::new(TypedAspect::composite_from_config(id, cfg, self.builtin.clone(), engines))
    }
}

/// Ordered table of known aspects
#[derive(Default)]
pub struct AspectRegistry {
    entries: Vec<(String, Box<dyn AspectFactory>)>,
}

impl AspectRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every aspect the native candidate actions read
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        register_known_aspects(&mut registry);
        registry
    }

    pub fn register<T: AspectValue>(&mut self, id: &str, builtin: T) {
        let factory: Box<dyn AspectFactory> = Box::new(TypedFactory { builtin });
        match self.entries.iter_mut().find(|(existing, _)| existing == id) {
            Some(entry) => entry.1 = factory,
            None => self.entries.push((id.to_string(), factory)),
        }
    }

    pub fn factory(&self, id: &str) -> Option<&dyn AspectFactory> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == id)
            .map(|(_, f)| f.as_ref())
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(id, _)| id.as_str())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.factory(id).is_some()
    }
}

fn save_gold_defaults() -> Config {
    Config::new()
        .with("active", 2)
        .with("begin", 1.5)
        .with("end", 1.1)
        .with("spend_all_gold", -1)
        .with("save_on_negative_income", false)
}

/// Register every aspect the engine ships with
pub fn register_known_aspects(registry: &mut AspectRegistry) {
    registry.register("aggression", 0.4_f64);
    registry.register("caution", 0.25_f64);
    registry.register("leader_value", 3.0_f64);
    registry.register("village_value", 1.0_f64);
    registry.register("villages_per_scout", 4_i64);
    registry.register("passive_leader", false);
    registry.register("leader_ignores_keep", false);
    registry.register("avoid", LocationFilter::default());
    registry.register("recruitment_instructions", RecruitmentInstructions::default_instructions());
    registry.register("recruitment_more", Vec::<String>::new());
    registry.register("recruitment_diversity", 2.0_f64);
    registry.register("recruitment_randomness", 50_i64);
    registry.register("recruitment_save_gold", save_gold_defaults());
    registry.register("recruitment_ignore_bad_movement", false);
    registry.register("recruitment_ignore_bad_combat", false);
}
