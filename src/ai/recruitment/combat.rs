//! Combat analysis for recruitment
//!
//! Every recruit candidate is matched against the enemy units on the map
//! and the types enemies can still recruit. Exchanges are memoized per
//! evaluation by unit-type pair and terrain defenses.

use ahash::AHashMap;
use std::collections::BTreeMap;
use tracing::trace;

use super::analysis::MapAnalysis;
use crate::core::types::Side;
use crate::game::combat::{best_exchange, Exchange};
use crate::game::state::GameState;
use crate::game::unit::UnitType;

/// Weight of an enemy type that could be recruited but is not on the map
const POTENTIAL_ENEMY_WEIGHT: f64 = 0.5;

type ExchangeKey = (String, String, u32, u32, i32);

/// Memoized attacker-initiated exchanges
#[derive(Debug, Default)]
pub struct CombatCache {
    exchanges: AHashMap<ExchangeKey, Exchange>,
    hits: u64,
    misses: u64,
}

impl CombatCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn exchange(
        &mut self,
        attacker: &UnitType,
        defender: &UnitType,
        attacker_cth: u32,
        defender_cth: u32,
        lawful_bonus: i32,
    ) -> Exchange {
        let key = (attacker.id.clone(), defender.id.clone(), attacker_cth, defender_cth, lawful_bonus);
        if let Some(exchange) = self.exchanges.get(&key) {
            self.hits += 1;
            return *exchange;
        }
        self.misses += 1;
        let exchange = best_exchange(attacker, defender, attacker_cth, defender_cth, lawful_bonus);
        self.exchanges.insert(key, exchange);
        exchange
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn misses(&self) -> u64 {
        self.misses
    }
}

/// An opposing unit type and how much it matters
#[derive(Debug, Clone)]
pub struct EnemyPresence<'a> {
    pub unit_type: &'a UnitType,
    pub weight: f64,
}

/// Enemy units on the map weighted by remaining health, plus every type an
/// enemy leader can recruit at a reduced weight
pub fn enemy_presence(state: &GameState, side: Side) -> Vec<EnemyPresence<'_>> {
    let mut presence = Vec::new();
    for unit in state.enemy_units(side) {
        if let Some(unit_type) = state.unit_type_of(unit) {
            let health = unit.hitpoints as f64 / unit.max_hitpoints.max(1) as f64;
            presence.push(EnemyPresence { unit_type, weight: health });
        }
    }
    let mut potential: Vec<&UnitType> = Vec::new();
    for enemy in state.enemy_sides(side) {
        for leader in state.leaders(enemy) {
            for unit_type in state.leader_recruits(leader) {
                if !potential.iter().any(|t| t.id == unit_type.id) {
                    potential.push(unit_type);
                }
            }
        }
    }
    presence.extend(potential.into_iter().map(|unit_type| EnemyPresence {
        unit_type,
        weight: POTENTIAL_ENEMY_WEIGHT,
    }));
    presence
}

/// Gold-weighted value of fighting `enemy` as `own`, per gold spent on `own`
///
/// Both directions of attack are simulated on the average front terrain
/// and averaged.
pub fn matchup_value(
    cache: &mut CombatCache,
    own: &UnitType,
    enemy: &UnitType,
    analysis: &MapAnalysis,
) -> f64 {
    let own_cth = analysis.average_cth(own);
    let enemy_cth = analysis.average_cth(enemy);
    let lawful_bonus = analysis.lawful_bonus();

    let attacking = cache.exchange(own, enemy, own_cth, enemy_cth, lawful_bonus);
    let defending = cache.exchange(enemy, own, enemy_cth, own_cth, lawful_bonus);
    let dealt = (attacking.dealt + defending.taken) / 2.0;
    let taken = (attacking.taken + defending.dealt) / 2.0;

    let inflicted = dealt.min(enemy.hitpoints as f64) / enemy.hitpoints.max(1) as f64 * enemy.cost as f64;
    let suffered = taken.min(own.hitpoints as f64) / own.hitpoints.max(1) as f64 * own.cost as f64;
    (inflicted - suffered) / own.cost.max(1) as f64
}

/// Raw combat score of each candidate type against the whole enemy presence
pub fn combat_scores(
    cache: &mut CombatCache,
    candidates: &[&UnitType],
    enemies: &[EnemyPresence],
    analysis: &MapAnalysis,
) -> BTreeMap<String, f64> {
    let mut scores = BTreeMap::new();
    for own in candidates {
        let score: f64 = enemies
            .iter()
            .map(|e| e.weight * matchup_value(cache, own, e.unit_type, analysis))
            .sum();
        trace!("Combat score of {}: {:.3}", own.id, score);
        scores.insert(own.id.clone(), score);
    }
    scores
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::unit::UnitTypeCatalog;

    #[test]
    fn test_cache_counts_hits() {
        let catalog = UnitTypeCatalog::builtin();
        let spearman = catalog.get("Spearman").unwrap();
        let grunt = catalog.get("Grunt").unwrap();
        let mut cache = CombatCache::new();
        let first = cache.exchange(spearman, grunt, 60, 60, 0);
        let second = cache.exchange(spearman, grunt, 60, 60, 0);
        assert_eq!(first, second);
        assert_eq!(cache.misses(), 1);
        assert_eq!(cache.hits(), 1);
        cache.exchange(spearman, grunt, 40, 60, 0);
        assert_eq!(cache.misses(), 2);
    }

    #[test]
    fn test_archer_beats_melee_only_enemy() {
        let catalog = UnitTypeCatalog::builtin();
        let bowman = catalog.get("Bowman").unwrap();
        let grunt = catalog.get("Grunt").unwrap();
        let analysis = MapAnalysis::default();
        let mut cache = CombatCache::new();
        assert!(matchup_value(&mut cache, bowman, grunt, &analysis) > 0.0);
    }
}
