//! Map analysis for recruitment
//!
//! Important hexes are where both sides arrive at about the same time, the
//! likely front line. Their terrain mix drives the defense and movement
//! estimates of every recruit candidate.

use ahash::AHashMap;
use std::collections::BTreeMap;

use crate::core::config::RecruitmentSettings;
use crate::core::types::{MapLocation, Side};
use crate::game::map::Terrain;
use crate::game::pathfind::{cost_map, UNREACHABLE};
use crate::game::state::GameState;
use crate::game::unit::{Unit, UnitType};

#[derive(Debug, Clone, Default)]
pub struct MapAnalysis {
    /// Sorted, so every consumer sees them in the same order
    pub important_hexes: Vec<MapLocation>,
    pub terrain_counts: BTreeMap<Terrain, usize>,
    /// Mean lawful bonus over the look-ahead window
    pub average_lawful_bonus: f64,
}

/// Minimal number of turns any unit of the given sides needs to reach each hex
fn turns_to_reach<'a>(state: &GameState, units: impl Iterator<Item = &'a Unit>) -> AHashMap<MapLocation, f64> {
    let mut turns: AHashMap<MapLocation, f64> = AHashMap::new();
    for unit in units {
        let Some(unit_type) = state.unit_type_of(unit) else {
            continue;
        };
        let movement = unit_type.movement.max(1) as f64;
        let costs = cost_map(state, unit_type, unit.side, unit.loc, None);
        for (loc, cost) in costs.reached() {
            let t = *cost as f64 / movement;
            turns
                .entry(*loc)
                .and_modify(|best| {
                    if t < *best {
                        *best = t;
                    }
                })
                .or_insert(t);
        }
    }
    turns
}

impl MapAnalysis {
    pub fn analyze(state: &GameState, side: Side, settings: &RecruitmentSettings) -> Self {
        let own = turns_to_reach(state, state.units_of(side));
        let enemy = turns_to_reach(state, state.enemy_units(side));

        let mut important_hexes: Vec<MapLocation> = own
            .iter()
            .filter_map(|(loc, own_turns)| {
                let enemy_turns = enemy.get(loc)?;
                ((own_turns - enemy_turns).abs() <= settings.important_hex_tolerance).then_some(*loc)
            })
            .collect();
        important_hexes.sort();

        let lookahead = settings.tod_lookahead.max(1);
        let average_lawful_bonus = (0..lookahead)
            .map(|i| state.time_of_day_at(state.turn + i).lawful_bonus as f64)
            .sum::<f64>()
            / lookahead as f64;

        Self {
            terrain_counts: Self::count_terrain(state, &important_hexes),
            important_hexes,
            average_lawful_bonus,
        }
    }

    fn count_terrain(state: &GameState, hexes: &[MapLocation]) -> BTreeMap<Terrain, usize> {
        let mut terrain_counts = BTreeMap::new();
        for loc in hexes {
            if let Some(terrain) = state.map.terrain(loc) {
                *terrain_counts.entry(terrain).or_insert(0) += 1;
            }
        }
        terrain_counts
    }

    /// The `count` important hexes nearest to `from`, ties broken by
    /// location; everything when `count` is 0 or covers all of them
    pub fn local(&self, state: &GameState, from: MapLocation, count: usize) -> Self {
        if count == 0 || count >= self.important_hexes.len() {
            return self.clone();
        }
        let mut nearest = self.important_hexes.clone();
        nearest.sort_by_key(|h| (from.distance(h), *h));
        nearest.truncate(count);
        nearest.sort();
        Self {
            terrain_counts: Self::count_terrain(state, &nearest),
            important_hexes: nearest,
            average_lawful_bonus: self.average_lawful_bonus,
        }
    }

    fn total(&self) -> usize {
        self.terrain_counts.values().sum()
    }

    /// Chance to be hit averaged over the important terrain, flat when none
    pub fn average_cth(&self, unit_type: &UnitType) -> u32 {
        let total = self.total();
        if total == 0 {
            return unit_type.chance_to_be_hit(Terrain::Flat);
        }
        let sum: usize = self
            .terrain_counts
            .iter()
            .map(|(terrain, count)| unit_type.chance_to_be_hit(*terrain) as usize * count)
            .sum();
        ((sum as f64 / total as f64).round()) as u32
    }

    /// Mean movement cost over the important terrain; impassable hexes count
    /// as the unreachable cost
    pub fn average_movement_cost(&self, unit_type: &UnitType) -> f64 {
        let total = self.total();
        if total == 0 {
            return unit_type.movement_cost(Terrain::Flat) as f64;
        }
        let sum: f64 = self
            .terrain_counts
            .iter()
            .map(|(terrain, count)| unit_type.movement_cost(*terrain).min(UNREACHABLE) as f64 * *count as f64)
            .sum();
        sum / total as f64
    }

    pub fn lawful_bonus(&self) -> i32 {
        self.average_lawful_bonus.round() as i32
    }

    /// Distance from `loc` to the nearest important hex
    pub fn distance_to_front(&self, loc: &MapLocation) -> Option<u32> {
        self.important_hexes.iter().map(|h| loc.distance(h)).min()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::map::GameMap;
    use crate::game::team::Team;
    use crate::game::unit::UnitTypeCatalog;

    fn place(state: &mut GameState, type_id: &str, side: Side, loc: MapLocation) {
        let unit_type = state.catalog.get(type_id).unwrap().clone();
        let id = state.allocate_unit_id();
        state.add_unit(Unit::new(id, &unit_type, side, loc));
    }

    fn duel() -> GameState {
        let map = GameMap::from_rows(
            "
            . . . . . . . .
            . . . h h . . .
            . . . h h . . .
            . . . . . . . .
            ",
        )
        .unwrap();
        let mut state = GameState::new(map, UnitTypeCatalog::builtin());
        let mut t1 = Team::new(1);
        t1.enemies.push(2);
        let mut t2 = Team::new(2);
        t2.enemies.push(1);
        state.teams = vec![t1, t2];
        place(&mut state, "Spearman", 1, MapLocation::new(0, 1));
        place(&mut state, "Grunt", 2, MapLocation::new(7, 1));
        state
    }

    #[test]
    fn test_front_line_lies_between_armies() {
        let state = duel();
        let analysis = MapAnalysis::analyze(&state, 1, &RecruitmentSettings::default());
        assert!(!analysis.important_hexes.is_empty());
        assert!(!analysis.important_hexes.contains(&MapLocation::new(0, 1)));
        assert!(!analysis.important_hexes.contains(&MapLocation::new(7, 1)));
        let mean_x = analysis.important_hexes.iter().map(|h| h.x as f64).sum::<f64>()
            / analysis.important_hexes.len() as f64;
        assert!((2.0..=5.0).contains(&mean_x), "front centered at x={}", mean_x);
    }

    #[test]
    fn test_local_view_keeps_nearest_hexes() {
        let state = duel();
        let analysis = MapAnalysis::analyze(&state, 1, &RecruitmentSettings::default());
        let from = MapLocation::new(0, 0);
        let local = analysis.local(&state, from, 2);
        let kept = analysis.important_hexes.len().min(2);
        assert_eq!(local.important_hexes.len(), kept);
        let farthest_kept = local.important_hexes.iter().map(|h| from.distance(h)).max().unwrap();
        let dropped = analysis.important_hexes.iter().filter(|h| !local.important_hexes.contains(h));
        for hex in dropped {
            assert!(from.distance(hex) >= farthest_kept);
        }
        assert_eq!(local.terrain_counts.values().sum::<usize>(), kept);
        assert_eq!(analysis.local(&state, from, 0).important_hexes, analysis.important_hexes);
    }

    #[test]
    fn test_no_enemies_means_no_front() {
        let mut state = duel();
        state.units.retain(|u| u.side == 1);
        let analysis = MapAnalysis::analyze(&state, 1, &RecruitmentSettings::default());
        assert!(analysis.important_hexes.is_empty());
        let spearman = state.catalog.get("Spearman").unwrap();
        assert_eq!(analysis.average_cth(spearman), spearman.chance_to_be_hit(Terrain::Flat));
    }
}
