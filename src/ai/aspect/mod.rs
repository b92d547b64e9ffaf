//! Aspects - cached, configurable decision parameters
//!
//! An aspect computes its value lazily and keeps it until one of the game
//! events it subscribes to invalidates it. Every aspect the engine knows
//! about is a composite: an ordered list of facets gated by time of day and
//! turn, plus a default facet.

pub mod registry;
pub mod typed;
pub mod value;

use std::any::Any;
use tracing::error;

use super::component::{AsComponent, Component};
use super::variant::Variant;
use crate::config::Config;
use crate::core::types::{Side, Turn};
use crate::game::state::GameState;

pub use registry::{register_known_aspects, AspectFactory, AspectRegistry};
pub use typed::{TypedAspect, VariantSource, DEFAULT_FACET_ID};
pub use value::{AspectValue, LocationFilter};

/// Game events aspects may subscribe to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AspectEvent {
    TurnStarted,
    TimeOfDayChanged,
    /// Recruit, recall or attack
    GamestateChanged,
    /// Any successful action, including moves
    MinorGamestateChanged,
}

/// Read-only view an aspect computes from
#[derive(Clone, Copy)]
pub struct AspectView<'a> {
    pub state: &'a GameState,
    pub side: Side,
}

impl<'a> AspectView<'a> {
    pub fn new(state: &'a GameState, side: Side) -> Self {
        Self { state, side }
    }
}

/// Which events invalidate an aspect
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidationFlags {
    pub on_turn_start: bool,
    pub on_tod_change: bool,
    pub on_gamestate_change: bool,
    pub on_minor_gamestate_change: bool,
}

impl Default for InvalidationFlags {
    fn default() -> Self {
        Self {
            on_turn_start: true,
            on_tod_change: true,
            on_gamestate_change: false,
            on_minor_gamestate_change: false,
        }
    }
}

impl InvalidationFlags {
    pub fn from_config(cfg: &Config) -> Self {
        let d = Self::default();
        Self {
            on_turn_start: cfg.bool_or("invalidate_on_turn_start", d.on_turn_start),
            on_tod_change: cfg.bool_or("invalidate_on_tod_change", d.on_tod_change),
            on_gamestate_change: cfg.bool_or("invalidate_on_gamestate_change", d.on_gamestate_change),
            on_minor_gamestate_change: cfg.bool_or(
                "invalidate_on_minor_gamestate_change",
                d.on_minor_gamestate_change,
            ),
        }
    }

    /// Write only the flags that differ from the defaults
    pub fn write_config(&self, cfg: &mut Config) {
        let d = Self::default();
        if self.on_turn_start != d.on_turn_start {
            cfg.set("invalidate_on_turn_start", self.on_turn_start);
        }
        if self.on_tod_change != d.on_tod_change {
            cfg.set("invalidate_on_tod_change", self.on_tod_change);
        }
        if self.on_gamestate_change != d.on_gamestate_change {
            cfg.set("invalidate_on_gamestate_change", self.on_gamestate_change);
        }
        if self.on_minor_gamestate_change != d.on_minor_gamestate_change {
            cfg.set("invalidate_on_minor_gamestate_change", self.on_minor_gamestate_change);
        }
    }

    pub fn matches(&self, event: AspectEvent) -> bool {
        match event {
            AspectEvent::TurnStarted => self.on_turn_start,
            AspectEvent::TimeOfDayChanged => self.on_tod_change,
            AspectEvent::GamestateChanged => self.on_gamestate_change,
            AspectEvent::MinorGamestateChanged => self.on_minor_gamestate_change,
        }
    }
}

/// Turn filter such as `1-5,10,12-`
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TurnRanges {
    ranges: Vec<(Turn, Option<Turn>)>,
    /// Some part was written, even if none of them parsed
    restricted: bool,
    source: String,
}

impl TurnRanges {
    pub fn parse(text: &str) -> Self {
        let mut ranges = Vec::new();
        let mut restricted = false;
        for part in text.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            restricted = true;
            let parsed = match part.split_once('-') {
                Some((from, "")) => from.trim().parse().ok().map(|f| (f, None)),
                Some((from, to)) => match (from.trim().parse(), to.trim().parse()) {
                    (Ok(f), Ok(t)) => Some((f, Some(t))),
                    _ => None,
                },
                None => part.parse().ok().map(|t| (t, Some(t))),
            };
            match parsed {
                Some(range) => ranges.push(range),
                None => error!("Ignoring malformed turn range '{}'", part),
            }
        }
        if restricted && ranges.is_empty() {
            error!("Turn filter '{}' has no valid range and matches no turn", text.trim());
        }
        Self {
            ranges,
            restricted,
            source: text.trim().to_string(),
        }
    }

    /// An empty filter accepts every turn; one made only of malformed
    /// parts accepts none
    pub fn contains(&self, turn: Turn) -> bool {
        !self.restricted
            || self
                .ranges
                .iter()
                .any(|(from, to)| turn >= *from && to.map_or(true, |t| turn <= t))
    }

    pub fn is_empty(&self) -> bool {
        !self.restricted
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }
}

/// Time-of-day and turn window in which an aspect or facet is active
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Activation {
    pub time_of_day: Vec<String>,
    pub turns: TurnRanges,
}

impl Activation {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            time_of_day: cfg.list("time_of_day"),
            turns: TurnRanges::parse(&cfg.str_or("turns", "")),
        }
    }

    pub fn write_config(&self, cfg: &mut Config) {
        if !self.time_of_day.is_empty() {
            cfg.set("time_of_day", self.time_of_day.join(","));
        }
        if !self.turns.is_empty() {
            cfg.set("turns", self.turns.as_str());
        }
    }

    pub fn is_active(&self, state: &GameState) -> bool {
        if !self.turns.contains(state.turn) {
            return false;
        }
        self.time_of_day.is_empty() || self.time_of_day.contains(&state.time_of_day().id)
    }
}

/// Type-erased aspect, as stored in an `AspectSet`
pub trait Aspect: Component + AsComponent {
    fn type_name(&self) -> &'static str;

    fn is_valid(&self) -> bool;

    /// Drop both cached forms
    fn invalidate(&mut self);

    fn on_event(&mut self, event: AspectEvent);

    fn active(&self, view: &AspectView) -> bool;

    /// The only transition from invalid to valid
    fn recalculate(&mut self, view: &AspectView);

    fn get_variant(&mut self, view: &AspectView) -> Variant;

    fn recalculation_count(&self) -> u32;

    fn as_any_mut(&mut self) -> &mut dyn Any;

    fn into_any(self: Box<Self>) -> Box<dyn Any>;
}

/// The aspects of one AI, keyed by id
#[derive(Default)]
pub struct AspectSet {
    aspects: Vec<Box<dyn Aspect>>,
}

impl AspectSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert, replacing an aspect with the same id
    pub fn insert(&mut self, aspect: Box<dyn Aspect>) {
        match self.aspects.iter().position(|a| a.id() == aspect.id()) {
            Some(i) => self.aspects[i] = aspect,
            None => self.aspects.push(aspect),
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.aspects.iter().any(|a| a.id() == id)
    }

    pub fn get(&self, id: &str) -> Option<&dyn Aspect> {
        self.aspects.iter().find(|a| a.id() == id).map(|a| a.as_ref())
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Box<dyn Aspect>> {
        self.aspects.iter_mut().find(|a| a.id() == id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.aspects.iter().map(|a| a.id())
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn Aspect> {
        self.aspects.iter().map(|a| a.as_ref())
    }

    pub fn len(&self) -> usize {
        self.aspects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.aspects.is_empty()
    }

    /// Typed handle on an aspect
    ///
    /// # Panics
    /// When the aspect is missing or holds another type. Both mean the
    /// caller and the aspect registry disagree, which is a programming error.
    pub fn typed_mut<T: AspectValue>(&mut self, id: &str) -> &mut TypedAspect<T> {
        let aspect = self
            .aspects
            .iter_mut()
            .find(|a| a.id() == id)
            .unwrap_or_else(|| panic!("unknown aspect '{}'", id));
        let held = aspect.type_name();
        aspect
            .as_any_mut()
            .downcast_mut::<TypedAspect<T>>()
            .unwrap_or_else(|| panic!("aspect '{}' holds {} but was read as {}", id, held, T::TYPE_NAME))
    }

    /// Current value of an aspect, recalculating if needed
    pub fn value<T: AspectValue>(&mut self, id: &str, view: &AspectView) -> T {
        self.typed_mut::<T>(id).get(view).clone()
    }

    pub fn variant(&mut self, id: &str, view: &AspectView) -> Option<Variant> {
        self.get_mut(id).map(|a| a.get_variant(view))
    }

    pub fn on_event(&mut self, event: AspectEvent) {
        for aspect in &mut self.aspects {
            aspect.on_event(event);
        }
    }

    pub fn invalidate_all(&mut self) {
        for aspect in &mut self.aspects {
            aspect.invalidate();
        }
    }

    pub(crate) fn boxes_mut(&mut self) -> &mut Vec<Box<dyn Aspect>> {
        &mut self.aspects
    }

    pub(crate) fn boxes(&self) -> &[Box<dyn Aspect>] {
        &self.aspects
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_turn_ranges() {
        let ranges = TurnRanges::parse("1-3, 7, 10-");
        assert!(ranges.contains(2));
        assert!(!ranges.contains(5));
        assert!(ranges.contains(7));
        assert!(ranges.contains(42));
        assert!(TurnRanges::parse("").contains(99));
    }

    #[test]
    fn test_malformed_turn_range_ignored() {
        let ranges = TurnRanges::parse("x-3,4");
        assert!(ranges.contains(4));
        assert!(!ranges.contains(3));
    }

    #[test]
    fn test_all_malformed_turn_range_matches_nothing() {
        let ranges = TurnRanges::parse("x-3, soon");
        assert!(!ranges.is_empty());
        assert!(!ranges.contains(1));
        assert!(!ranges.contains(3));
        assert!(TurnRanges::parse(" , ").contains(1));

        let activation = Activation::from_config(&Config::new().with("turns", "later"));
        let mut cfg = Config::new();
        activation.write_config(&mut cfg);
        assert_eq!(cfg.str_or("turns", ""), "later");
    }

    #[test]
    fn test_invalidation_flags_defaults() {
        let flags = InvalidationFlags::from_config(&Config::new());
        assert!(flags.matches(AspectEvent::TurnStarted));
        assert!(flags.matches(AspectEvent::TimeOfDayChanged));
        assert!(!flags.matches(AspectEvent::GamestateChanged));
        let mut cfg = Config::new();
        flags.write_config(&mut cfg);
        assert!(cfg.is_empty());
    }
}
