//! Scenario loading from TOML
//!
//! A scenario describes the map, the time-of-day schedule and the sides
//! with their starting units, recall lists, owned villages and optional
//! per-side AI configuration.

use serde::Deserialize;
use std::fs;
use std::path::Path;

use super::map::GameMap;
use super::state::GameState;
use super::team::Team;
use super::unit::{Unit, UnitTypeCatalog};
use crate::config::Config;
use crate::core::error::{AiError, Result};
use crate::core::types::{MapLocation, Side, TimeOfDay, UnitId};

#[derive(Debug, Clone, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub name: String,
    #[serde(default = "default_turns")]
    pub turns: u32,
    pub map: MapDef,
    #[serde(default)]
    pub time_of_day: Vec<TimeOfDay>,
    #[serde(default)]
    pub side: Vec<SideDef>,
}

fn default_turns() -> u32 {
    10
}

#[derive(Debug, Clone, Deserialize)]
pub struct MapDef {
    /// Terrain codes, one map row per line
    pub rows: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SideDef {
    pub side: Side,
    #[serde(default = "default_gold")]
    pub gold: i32,
    #[serde(default = "default_base_income")]
    pub base_income: i32,
    #[serde(default)]
    pub recruit: Vec<String>,
    #[serde(default)]
    pub enemies: Vec<Side>,
    #[serde(default)]
    pub recall_cost: Option<i32>,
    /// Villages owned at start, as [x, y] pairs
    #[serde(default)]
    pub villages: Vec<[i32; 2]>,
    #[serde(default)]
    pub unit: Vec<UnitDef>,
    #[serde(default)]
    pub recall: Vec<UnitDef>,
    /// AI overrides merged over the default AI for this side
    #[serde(default)]
    pub ai: Option<toml::value::Table>,
}

fn default_gold() -> i32 {
    100
}

fn default_base_income() -> i32 {
    2
}

#[derive(Debug, Clone, Deserialize)]
pub struct UnitDef {
    #[serde(rename = "type")]
    pub unit_type: String,
    #[serde(default)]
    pub x: i32,
    #[serde(default)]
    pub y: i32,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub id: Option<u32>,
    #[serde(default)]
    pub leader: bool,
    /// Leader-only recruits on top of the side's list
    #[serde(default)]
    pub extra_recruit: Vec<String>,
}

impl Scenario {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Two-sided demo scenario shipped with the crate
    pub fn demo() -> Result<Self> {
        Self::from_toml_str(include_str!("../../data/scenario_demo.toml"))
    }

    /// Build the initial game state
    pub fn build(&self, catalog: UnitTypeCatalog) -> Result<GameState> {
        let map = GameMap::from_rows(&self.map.rows)?;
        let mut state = GameState::new(map, catalog);
        if !self.time_of_day.is_empty() {
            state.schedule = self.time_of_day.clone();
        }

        for def in &self.side {
            let mut team = Team::new(def.side);
            team.gold = def.gold;
            team.base_income = def.base_income;
            team.recruits = def.recruit.clone();
            team.enemies = def.enemies.clone();
            if let Some(cost) = def.recall_cost {
                team.recall_cost = cost;
            }
            if let Some(unknown) = def.recruit.iter().find(|r| state.catalog.get(r).is_none()) {
                return Err(AiError::Scenario(format!(
                    "side {} recruits unknown unit type '{}'",
                    def.side, unknown
                )));
            }
            for [x, y] in &def.villages {
                let loc = MapLocation::new(*x, *y);
                if !state.map.is_village(&loc) {
                    return Err(AiError::Scenario(format!("{} is not a village", loc)));
                }
                state.map.set_village_owner(loc, Some(def.side));
            }
            state.teams.push(team);
        }

        for def in &self.side {
            for unit_def in &def.unit {
                let unit = Self::make_unit(&mut state, def.side, unit_def)?;
                if !state.map.on_board(&unit.loc) {
                    return Err(AiError::Scenario(format!("unit {} placed off the map", unit.name)));
                }
                if state.is_occupied(&unit.loc) {
                    return Err(AiError::Scenario(format!("{} is occupied twice", unit.loc)));
                }
                state.add_unit(unit);
            }
            for unit_def in &def.recall {
                let unit = Self::make_unit(&mut state, def.side, unit_def)?;
                state.reserve_unit_id(unit.id);
                if let Some(team) = state.team_mut(def.side) {
                    team.recall_list.push(unit);
                }
            }
        }
        Ok(state)
    }

    fn make_unit(state: &mut GameState, side: Side, def: &UnitDef) -> Result<Unit> {
        let unit_type = state
            .catalog
            .get(&def.unit_type)
            .cloned()
            .ok_or_else(|| AiError::Scenario(format!("unknown unit type '{}'", def.unit_type)))?;
        let id = match def.id {
            Some(n) => {
                state.reserve_unit_id(UnitId(n));
                UnitId(n)
            }
            None => state.allocate_unit_id(),
        };
        let mut unit = Unit::new(id, &unit_type, side, MapLocation::new(def.x, def.y));
        if let Some(name) = &def.name {
            unit.name = name.clone();
        }
        if let Some(unknown) = def.extra_recruit.iter().find(|r| state.catalog.get(r).is_none()) {
            return Err(AiError::Scenario(format!(
                "unit {} recruits unknown unit type '{}'",
                unit.name, unknown
            )));
        }
        unit.can_recruit = def.leader;
        unit.extra_recruit = def.extra_recruit.clone();
        Ok(unit)
    }

    /// Per-side AI overrides as configuration trees
    pub fn side_ai_configs(&self) -> Vec<(Side, Config)> {
        self.side
            .iter()
            .filter_map(|s| s.ai.as_ref().map(|t| (s.side, Config::from_toml_table(t))))
            .collect()
    }

    pub fn sides(&self) -> Vec<Side> {
        self.side.iter().map(|s| s.side).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SMALL: &str = r#"
        name = "small"
        turns = 3

        [map]
        rows = """
        c k . v
        . . . .
        """

        [[side]]
        side = 1
        gold = 50
        recruit = ["Spearman"]
        enemies = [2]
        villages = [[3, 0]]

        [[side.unit]]
        type = "Lieutenant"
        x = 1
        y = 0
        leader = true
        name = "Kalenz"
        extra_recruit = ["Mage"]

        [[side.recall]]
        type = "Bowman"
        name = "Veteran"

        [side.ai]
        aggression = 0.8

        [[side]]
        side = 2
        enemies = [1]

        [[side.unit]]
        type = "Grunt"
        x = 3
        y = 1
    "#;

    #[test]
    fn test_build_state() {
        let scenario = Scenario::from_toml_str(SMALL).unwrap();
        let state = scenario.build(UnitTypeCatalog::builtin()).unwrap();
        assert_eq!(state.teams.len(), 2);
        assert_eq!(state.gold(1), 50);
        assert_eq!(state.map.village_owner(&MapLocation::new(3, 0)), Some(1));
        let leader = state.leaders(1).next().unwrap();
        assert_eq!(leader.name, "Kalenz");
        assert_eq!(leader.extra_recruit, vec!["Mage".to_string()]);
        let recruits: Vec<&str> = state.leader_recruits(leader).iter().map(|t| t.id.as_str()).collect();
        assert_eq!(recruits, vec!["Spearman", "Mage"]);
        assert_eq!(state.team(1).unwrap().recall_list.len(), 1);
        assert_eq!(state.units.len(), 2);
    }

    #[test]
    fn test_side_ai_overrides() {
        let scenario = Scenario::from_toml_str(SMALL).unwrap();
        let configs = scenario.side_ai_configs();
        assert_eq!(configs.len(), 1);
        assert_eq!(configs[0].0, 1);
        assert_eq!(configs[0].1.float_or("aggression", 0.0), 0.8);
    }

    #[test]
    fn test_unknown_unit_type_rejected() {
        let bad = SMALL.replace("Grunt", "Dragon");
        let scenario = Scenario::from_toml_str(&bad).unwrap();
        assert!(scenario.build(UnitTypeCatalog::builtin()).is_err());
    }

    #[test]
    fn test_demo_scenario_builds() {
        let scenario = Scenario::demo().unwrap();
        let state = scenario.build(UnitTypeCatalog::builtin()).unwrap();
        assert!(state.teams.len() >= 2);
        assert!(state.units.iter().any(|u| u.can_recruit));
    }
}
