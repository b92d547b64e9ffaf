//! Unit types and units
//!
//! Unit types are loaded from TOML into a catalog. Units reference their
//! type by id and carry the per-instance state (position, hitpoints, moves).

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use super::map::Terrain;
use crate::core::error::Result;
use crate::core::types::{MapLocation, Side, UnitId};

/// How time of day modifies a unit's damage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Alignment {
    Lawful,
    Chaotic,
    #[default]
    Neutral,
}

impl Alignment {
    /// Damage bonus in percent for this alignment under a given lawful bonus
    pub fn bonus(&self, lawful_bonus: i32) -> i32 {
        match self {
            Alignment::Lawful => lawful_bonus,
            Alignment::Chaotic => -lawful_bonus,
            Alignment::Neutral => 0,
        }
    }
}

/// Intended role of a unit type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Usage {
    Scout,
    #[default]
    Fighter,
    MixedFighter,
    Archer,
    Healer,
}

impl Usage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Usage::Scout => "scout",
            Usage::Fighter => "fighter",
            Usage::MixedFighter => "mixed fighter",
            Usage::Archer => "archer",
            Usage::Healer => "healer",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttackRange {
    Melee,
    Ranged,
}

/// A weapon of a unit type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attack {
    pub name: String,
    pub damage: u32,
    pub strikes: u32,
    pub range: AttackRange,
}

/// Static description of a recruitable unit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnitType {
    pub id: String,
    pub cost: u32,
    pub hitpoints: u32,
    pub movement: u32,
    #[serde(default = "default_level")]
    pub level: u32,
    #[serde(default)]
    pub alignment: Alignment,
    #[serde(default)]
    pub usage: Usage,
    #[serde(default)]
    pub attacks: Vec<Attack>,
    /// Overrides of the terrain's default movement cost, keyed by terrain name
    #[serde(default)]
    pub movement_costs: HashMap<String, u32>,
    /// Overrides of the terrain's default chance to be hit
    #[serde(default)]
    pub defense: HashMap<String, u32>,
}

fn default_level() -> u32 {
    1
}

impl UnitType {
    pub fn movement_cost(&self, terrain: Terrain) -> u32 {
        self.movement_costs
            .get(terrain.name())
            .copied()
            .unwrap_or_else(|| terrain.default_movement_cost())
    }

    /// Chance to be hit in percent on the given terrain
    pub fn chance_to_be_hit(&self, terrain: Terrain) -> u32 {
        self.defense
            .get(terrain.name())
            .copied()
            .unwrap_or_else(|| terrain.default_defense())
    }

    pub fn attacks_with_range(&self, range: AttackRange) -> impl Iterator<Item = &Attack> {
        self.attacks.iter().filter(move |a| a.range == range)
    }
}

/// Catalog of all known unit types
#[derive(Debug, Clone, Default)]
pub struct UnitTypeCatalog {
    types: BTreeMap<String, UnitType>,
}

/// TOML representation of a unit catalog file
#[derive(Debug, Deserialize)]
struct TomlCatalog {
    #[serde(default)]
    unit_type: Vec<UnitType>,
}

impl UnitTypeCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog shipped with the crate
    pub fn builtin() -> Self {
        // The embedded file is covered by tests; a broken edit shows up there.
        Self::parse_toml(include_str!("../../data/units.toml")).unwrap_or_default()
    }

    /// Parse unit types from TOML string
    pub fn parse_toml(content: &str) -> Result<Self> {
        let parsed: TomlCatalog = toml::from_str(content)?;
        let mut catalog = Self::new();
        for unit_type in parsed.unit_type {
            catalog.add(unit_type);
        }
        Ok(catalog)
    }

    pub fn add(&mut self, unit_type: UnitType) {
        self.types.insert(unit_type.id.clone(), unit_type);
    }

    pub fn get(&self, id: &str) -> Option<&UnitType> {
        self.types.get(id)
    }

    pub fn all(&self) -> impl Iterator<Item = &UnitType> {
        self.types.values()
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

/// A unit on the map or on a recall list
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Unit {
    pub id: UnitId,
    /// Human-readable identifier, used by leader filters
    pub name: String,
    pub type_id: String,
    pub side: Side,
    pub loc: MapLocation,
    pub hitpoints: u32,
    pub max_hitpoints: u32,
    pub moves: u32,
    pub max_moves: u32,
    pub attacks_left: u32,
    pub can_recruit: bool,
    #[serde(default)]
    pub experience: u32,
    /// Types this leader recruits on top of its side's recruit list
    #[serde(default)]
    pub extra_recruit: Vec<String>,
}

impl Unit {
    /// Fresh unit of the given type with full hitpoints and no moves
    pub fn new(id: UnitId, unit_type: &UnitType, side: Side, loc: MapLocation) -> Self {
        Self {
            id,
            name: format!("{}-{}", unit_type.id, id.0),
            type_id: unit_type.id.clone(),
            side,
            loc,
            hitpoints: unit_type.hitpoints,
            max_hitpoints: unit_type.hitpoints,
            moves: 0,
            max_moves: unit_type.movement,
            attacks_left: 0,
            can_recruit: false,
            experience: 0,
            extra_recruit: Vec::new(),
        }
    }

    pub fn recruits_extra(&self, type_id: &str) -> bool {
        self.extra_recruit.iter().any(|r| r == type_id)
    }

    pub fn refresh(&mut self) {
        self.moves = self.max_moves;
        self.attacks_left = 1;
    }

    pub fn is_leader(&self) -> bool {
        self.can_recruit
    }
}
