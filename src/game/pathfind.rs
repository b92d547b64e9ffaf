//! Movement-cost maps and routes
//!
//! Dijkstra over the hex map using a unit type's movement costs. Hexes
//! held by units of enemy sides block movement; friendly units can be
//! passed through but not stopped on.

use ahash::AHashMap;
use std::cmp::Reverse;
use std::collections::BinaryHeap;

use super::state::GameState;
use super::unit::{Unit, UnitType};
use crate::core::types::{MapLocation, Side};

/// Movement costs of this size or more mean "impassable"
pub const UNREACHABLE: u32 = 99;

/// Result of a single-source cost search
#[derive(Debug, Clone)]
pub struct CostMap {
    pub origin: MapLocation,
    costs: AHashMap<MapLocation, u32>,
    came_from: AHashMap<MapLocation, MapLocation>,
}

impl CostMap {
    pub fn cost(&self, loc: &MapLocation) -> Option<u32> {
        self.costs.get(loc).copied()
    }

    pub fn reached(&self) -> impl Iterator<Item = (&MapLocation, &u32)> {
        self.costs.iter()
    }

    pub fn len(&self) -> usize {
        self.costs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.costs.is_empty()
    }

    /// Route from the origin to `goal`, both ends included
    pub fn path_to(&self, goal: &MapLocation) -> Option<Vec<MapLocation>> {
        if !self.costs.contains_key(goal) {
            return None;
        }
        let mut path = vec![*goal];
        let mut current = *goal;
        while let Some(&prev) = self.came_from.get(&current) {
            path.push(prev);
            current = prev;
        }
        path.reverse();
        Some(path)
    }
}

/// Build a cost map for `unit_type` moving as `side` from `origin`
///
/// `budget` limits the search to hexes reachable within that many
/// movement points; `None` explores the whole connected map.
pub fn cost_map(
    state: &GameState,
    unit_type: &UnitType,
    side: Side,
    origin: MapLocation,
    budget: Option<u32>,
) -> CostMap {
    let mut costs: AHashMap<MapLocation, u32> = AHashMap::new();
    let mut came_from: AHashMap<MapLocation, MapLocation> = AHashMap::new();
    let mut open = BinaryHeap::new();

    costs.insert(origin, 0);
    open.push(Reverse((0u32, origin)));

    while let Some(Reverse((cost, current))) = open.pop() {
        if costs.get(&current).map_or(false, |&c| c < cost) {
            continue;
        }
        for neighbor in state.map.on_board_neighbors(&current) {
            let Some(terrain) = state.map.terrain(&neighbor) else {
                continue;
            };
            let step = unit_type.movement_cost(terrain);
            if step >= UNREACHABLE {
                continue;
            }
            if let Some(occupant) = state.unit_at(&neighbor) {
                if state.is_enemy(side, occupant.side) {
                    continue;
                }
            }
            let tentative = cost + step;
            if budget.map_or(false, |b| tentative > b) {
                continue;
            }
            if tentative < *costs.get(&neighbor).unwrap_or(&u32::MAX) {
                costs.insert(neighbor, tentative);
                came_from.insert(neighbor, current);
                open.push(Reverse((tentative, neighbor)));
            }
        }
    }

    CostMap {
        origin,
        costs,
        came_from,
    }
}

/// Hexes a unit can end its move on this turn, with their cost
pub fn reachable_locations(state: &GameState, unit: &Unit) -> Vec<(MapLocation, u32)> {
    let Some(unit_type) = state.unit_type_of(unit) else {
        return Vec::new();
    };
    let map = cost_map(state, unit_type, unit.side, unit.loc, Some(unit.moves));
    let mut reachable: Vec<(MapLocation, u32)> = map
        .reached()
        .filter(|(loc, _)| **loc == unit.loc || !state.is_occupied(loc))
        .map(|(loc, cost)| (*loc, *cost))
        .collect();
    reachable.sort();
    reachable
}

/// Furthest vacant hex along the route to `goal` the unit reaches this turn
pub fn step_towards(state: &GameState, unit: &Unit, goal: &MapLocation) -> Option<MapLocation> {
    let unit_type = state.unit_type_of(unit)?;
    let full = cost_map(state, unit_type, unit.side, unit.loc, None);
    let path = full.path_to(goal)?;
    path.iter()
        .skip(1)
        .take_while(|loc| full.cost(loc).map_or(false, |c| c <= unit.moves))
        .filter(|loc| !state.is_occupied(loc))
        .last()
        .copied()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::map::GameMap;
    use crate::game::team::Team;
    use crate::game::unit::UnitTypeCatalog;

    fn open_state(rows: &str) -> GameState {
        let mut state = GameState::new(GameMap::from_rows(rows).unwrap(), UnitTypeCatalog::builtin());
        let mut t1 = Team::new(1);
        t1.enemies.push(2);
        let mut t2 = Team::new(2);
        t2.enemies.push(1);
        state.teams = vec![t1, t2];
        state
    }

    fn place(state: &mut GameState, type_id: &str, side: Side, loc: MapLocation) -> Unit {
        let unit_type = state.catalog.get(type_id).unwrap().clone();
        let id = state.allocate_unit_id();
        let mut unit = Unit::new(id, &unit_type, side, loc);
        unit.refresh();
        state.add_unit(unit.clone());
        unit
    }

    #[test]
    fn test_cost_map_respects_terrain() {
        let state = open_state(". . f .");
        let spearman = state.catalog.get("Spearman").unwrap();
        let map = cost_map(&state, spearman, 1, MapLocation::new(0, 0), None);
        assert_eq!(map.cost(&MapLocation::new(1, 0)), Some(1));
        assert_eq!(map.cost(&MapLocation::new(2, 0)), Some(3));
        assert_eq!(map.cost(&MapLocation::new(3, 0)), Some(4));
    }

    #[test]
    fn test_path_reconstruction() {
        let state = open_state(". . . .");
        let spearman = state.catalog.get("Spearman").unwrap();
        let map = cost_map(&state, spearman, 1, MapLocation::new(0, 0), None);
        let path = map.path_to(&MapLocation::new(3, 0)).unwrap();
        assert_eq!(path.first(), Some(&MapLocation::new(0, 0)));
        assert_eq!(path.last(), Some(&MapLocation::new(3, 0)));
        assert_eq!(path.len(), 4);
    }

    #[test]
    fn test_enemies_block_movement() {
        let mut state = open_state(". . .");
        place(&mut state, "Grunt", 2, MapLocation::new(1, 0));
        let spearman = state.catalog.get("Spearman").unwrap();
        let map = cost_map(&state, spearman, 1, MapLocation::new(0, 0), None);
        assert_eq!(map.cost(&MapLocation::new(1, 0)), None);
        assert_eq!(map.cost(&MapLocation::new(2, 0)), None);
    }

    #[test]
    fn test_step_towards_stops_at_move_limit() {
        let mut state = open_state(". . . . . . . . . .");
        let unit = place(&mut state, "Spearman", 1, MapLocation::new(0, 0));
        let step = step_towards(&state, &unit, &MapLocation::new(9, 0)).unwrap();
        assert_eq!(step, MapLocation::new(5, 0));
    }

    #[test]
    fn test_reachable_excludes_occupied() {
        let mut state = open_state(". . .");
        let unit = place(&mut state, "Spearman", 1, MapLocation::new(0, 0));
        place(&mut state, "Bowman", 1, MapLocation::new(1, 0));
        let reachable = reachable_locations(&state, &unit);
        assert!(reachable.iter().any(|(l, _)| *l == MapLocation::new(2, 0)));
        assert!(!reachable.iter().any(|(l, _)| *l == MapLocation::new(1, 0)));
        assert!(reachable.iter().any(|(l, _)| *l == unit.loc));
    }
}
