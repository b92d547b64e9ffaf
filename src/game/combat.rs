//! Expected-damage combat estimate
//!
//! Deterministic stand-in for the game's combat resolution: each strike
//! lands with the defender's chance to be hit, damage is modified by time
//! of day and alignment. Used by the simulated world and by AI rating code.

use super::unit::{Alignment, Attack, AttackRange, UnitType};

/// Damage of one strike after the time-of-day modifier
pub fn modified_damage(base: u32, alignment: Alignment, lawful_bonus: i32) -> f64 {
    let bonus = alignment.bonus(lawful_bonus);
    (base as f64 * (100 + bonus) as f64 / 100.0).max(1.0)
}

/// Expected damage of a full attack sequence
pub fn expected_damage(attack: &Attack, alignment: Alignment, lawful_bonus: i32, chance_to_hit: u32) -> f64 {
    modified_damage(attack.damage, alignment, lawful_bonus) * attack.strikes as f64 * chance_to_hit as f64 / 100.0
}

/// Outcome of one attacker-initiated exchange
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Exchange {
    /// Expected damage dealt by the attacker
    pub dealt: f64,
    /// Expected damage taken from retaliation
    pub taken: f64,
    pub range: Option<AttackRange>,
}

/// Pick the attacker weapon with the best dealt-minus-taken balance
///
/// `attacker_cth` / `defender_cth` are each side's chance to be hit on the
/// hex it stands on.
pub fn best_exchange(
    attacker: &UnitType,
    defender: &UnitType,
    attacker_cth: u32,
    defender_cth: u32,
    lawful_bonus: i32,
) -> Exchange {
    let mut best: Option<Exchange> = None;
    for attack in &attacker.attacks {
        let dealt = expected_damage(attack, attacker.alignment, lawful_bonus, defender_cth);
        let taken = defender
            .attacks_with_range(attack.range)
            .map(|a| expected_damage(a, defender.alignment, lawful_bonus, attacker_cth))
            .fold(0.0, f64::max);
        let candidate = Exchange {
            dealt,
            taken,
            range: Some(attack.range),
        };
        if best.map_or(true, |b| candidate.dealt - candidate.taken > b.dealt - b.taken) {
            best = Some(candidate);
        }
    }
    best.unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::unit::UnitTypeCatalog;

    #[test]
    fn test_tod_modifies_damage() {
        assert_eq!(modified_damage(8, Alignment::Lawful, 25), 10.0);
        assert_eq!(modified_damage(8, Alignment::Chaotic, 25), 6.0);
        assert_eq!(modified_damage(8, Alignment::Neutral, 25), 8.0);
    }

    #[test]
    fn test_archer_prefers_ranged_against_melee_only() {
        let catalog = UnitTypeCatalog::builtin();
        let bowman = catalog.get("Bowman").unwrap();
        let grunt = catalog.get("Grunt").unwrap();
        let exchange = best_exchange(bowman, grunt, 60, 60, 0);
        assert_eq!(exchange.range, Some(AttackRange::Ranged));
        assert_eq!(exchange.taken, 0.0);
        assert!(exchange.dealt > 0.0);
    }

    #[test]
    fn test_no_weapons_no_exchange() {
        let catalog = UnitTypeCatalog::builtin();
        let mut pacifist = catalog.get("Spearman").unwrap().clone();
        pacifist.attacks.clear();
        let grunt = catalog.get("Grunt").unwrap();
        assert_eq!(best_exchange(&pacifist, grunt, 60, 60, 0), Exchange::default());
    }
}
