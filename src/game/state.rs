//! Game state - the read model every AI component queries
//!
//! Mutation goes through `GameWorld::execute`; every successful change
//! bumps the change counter that gamestate observers compare against.

use super::map::GameMap;
use super::team::Team;
use super::unit::{Unit, UnitType, UnitTypeCatalog};
use crate::core::types::{MapLocation, Side, TimeOfDay, Turn, UnitId};

#[derive(Debug, Clone)]
pub struct GameState {
    pub map: GameMap,
    pub units: Vec<Unit>,
    pub teams: Vec<Team>,
    pub catalog: UnitTypeCatalog,
    pub turn: Turn,
    pub schedule: Vec<TimeOfDay>,
    change_count: u64,
    next_unit_id: u32,
}

impl GameState {
    pub fn new(map: GameMap, catalog: UnitTypeCatalog) -> Self {
        Self {
            map,
            units: Vec::new(),
            teams: Vec::new(),
            catalog,
            turn: 1,
            schedule: TimeOfDay::default_schedule(),
            change_count: 0,
            next_unit_id: 1,
        }
    }

    // === CHANGE TRACKING ===

    pub fn change_count(&self) -> u64 {
        self.change_count
    }

    pub fn mark_changed(&mut self) {
        self.change_count += 1;
    }

    pub fn allocate_unit_id(&mut self) -> UnitId {
        let id = UnitId(self.next_unit_id);
        self.next_unit_id += 1;
        id
    }

    /// Keep the id allocator ahead of explicitly numbered units
    pub fn reserve_unit_id(&mut self, id: UnitId) {
        if id.0 >= self.next_unit_id {
            self.next_unit_id = id.0 + 1;
        }
    }

    // === TIME ===

    pub fn time_of_day(&self) -> TimeOfDay {
        self.time_of_day_at(self.turn)
    }

    pub fn time_of_day_at(&self, turn: Turn) -> TimeOfDay {
        if self.schedule.is_empty() {
            return TimeOfDay::default();
        }
        let index = (turn.max(1) - 1) as usize % self.schedule.len();
        self.schedule[index].clone()
    }

    // === TEAMS ===

    pub fn team(&self, side: Side) -> Option<&Team> {
        self.teams.iter().find(|t| t.side == side)
    }

    pub fn team_mut(&mut self, side: Side) -> Option<&mut Team> {
        self.teams.iter_mut().find(|t| t.side == side)
    }

    pub fn is_enemy(&self, side: Side, other: Side) -> bool {
        self.team(side).map_or(false, |t| t.is_enemy(other))
    }

    pub fn enemy_sides(&self, side: Side) -> Vec<Side> {
        self.team(side).map(|t| t.enemies.clone()).unwrap_or_default()
    }

    /// Sum of unit levels that count toward upkeep (leaders are free)
    pub fn upkeep_levels(&self, side: Side) -> i32 {
        self.units_of(side)
            .filter(|u| !u.can_recruit)
            .map(|u| self.catalog.get(&u.type_id).map_or(1, |t| t.level as i32))
            .sum()
    }

    pub fn income(&self, side: Side) -> i32 {
        match self.team(side) {
            Some(team) => team.income(self.map.village_count(side), self.upkeep_levels(side)),
            None => 0,
        }
    }

    pub fn gold(&self, side: Side) -> i32 {
        self.team(side).map_or(0, |t| t.gold)
    }

    // === UNITS ===

    pub fn unit(&self, id: UnitId) -> Option<&Unit> {
        self.units.iter().find(|u| u.id == id)
    }

    pub fn unit_mut(&mut self, id: UnitId) -> Option<&mut Unit> {
        self.units.iter_mut().find(|u| u.id == id)
    }

    pub fn unit_at(&self, loc: &MapLocation) -> Option<&Unit> {
        self.units.iter().find(|u| u.loc == *loc)
    }

    pub fn is_occupied(&self, loc: &MapLocation) -> bool {
        self.unit_at(loc).is_some()
    }

    pub fn units_of(&self, side: Side) -> impl Iterator<Item = &Unit> {
        self.units.iter().filter(move |u| u.side == side)
    }

    pub fn leaders(&self, side: Side) -> impl Iterator<Item = &Unit> {
        self.units_of(side).filter(|u| u.can_recruit)
    }

    pub fn enemy_units(&self, side: Side) -> impl Iterator<Item = &Unit> {
        let enemies = self.enemy_sides(side);
        self.units.iter().filter(move |u| enemies.contains(&u.side))
    }

    /// Types `leader` may recruit: its side's list followed by the
    /// leader's own extras, unknown types skipped
    pub fn leader_recruits(&self, leader: &Unit) -> Vec<&UnitType> {
        let side_list = self.team(leader.side).map(|t| t.recruits.as_slice()).unwrap_or_default();
        let mut ids: Vec<&String> = side_list.iter().collect();
        for extra in &leader.extra_recruit {
            if !ids.contains(&extra) {
                ids.push(extra);
            }
        }
        ids.into_iter().filter_map(|id| self.catalog.get(id)).collect()
    }

    pub fn unit_type_of(&self, unit: &Unit) -> Option<&UnitType> {
        self.catalog.get(&unit.type_id)
    }

    /// Vacant castle hexes a leader standing on a keep can recruit into
    pub fn vacant_castle(&self, keep: &MapLocation) -> Vec<MapLocation> {
        self.map
            .castle_of(keep)
            .into_iter()
            .filter(|l| !self.is_occupied(l))
            .collect()
    }

    pub fn add_unit(&mut self, unit: Unit) {
        self.reserve_unit_id(unit.id);
        self.units.push(unit);
    }
}
