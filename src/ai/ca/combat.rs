//! Attack the enemy where the expected exchange pays off

use tracing::debug;

use super::issue;
use crate::ai::aspect::LocationFilter;
use crate::ai::candidate_action::{CaBehavior, CaInfo, BAD_SCORE};
use crate::ai::context::{DecisionContext, ReadGameInfo};
use crate::core::types::{MapLocation, UnitId};
use crate::game::actions::ActionRequest;
use crate::game::combat::{best_exchange, Exchange};
use crate::game::map::Terrain;
use crate::game::pathfind::reachable_locations;
use crate::game::unit::{Unit, UnitType};

#[derive(Debug, Clone, Copy, PartialEq)]
struct AttackChoice {
    attacker: UnitId,
    defender: UnitId,
    from: MapLocation,
    origin: MapLocation,
    rating: f64,
}

/// Attitude knobs read from aspects
#[derive(Debug, Clone, Copy)]
struct Attitude {
    aggression: f64,
    caution: f64,
    leader_value: f64,
}

/// Gold value of an exchange: damage inflicted on the defender minus damage
/// suffered, the latter discounted by aggression
fn rate_attack(
    exchange: &Exchange,
    attacker: &Unit,
    attacker_type: &UnitType,
    defender: &Unit,
    defender_type: &UnitType,
    attitude: Attitude,
) -> f64 {
    let kills = exchange.dealt >= defender.hitpoints as f64;
    let mut value = exchange.dealt.min(defender.hitpoints as f64) / defender.max_hitpoints.max(1) as f64
        * defender_type.cost as f64;
    if kills {
        value += defender_type.cost as f64 * 0.5;
    }
    if defender.is_leader() {
        value *= attitude.leader_value;
    }

    let taken = if kills { 0.0 } else { exchange.taken };
    let mut loss = taken.min(attacker.hitpoints as f64) / attacker.max_hitpoints.max(1) as f64 * attacker_type.cost as f64;
    let remaining = attacker.hitpoints as f64 - taken;
    if remaining < attacker.max_hitpoints as f64 * attitude.caution {
        loss *= 1.0 + attitude.caution;
    }
    value - loss * (1.0 - attitude.aggression)
}

#[derive(Debug, Default)]
pub struct CombatPhase {
    choice: Option<AttackChoice>,
}

impl CombatPhase {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CaBehavior for CombatPhase {
    fn evaluate(&mut self, info: &CaInfo, ctx: &mut DecisionContext) -> f64 {
        self.choice = None;
        let attitude = Attitude {
            aggression: ctx.aspect("aggression"),
            caution: ctx.aspect("caution"),
            leader_value: ctx.aspect("leader_value"),
        };
        let passive_leader: bool = ctx.aspect("passive_leader");
        let avoid: LocationFilter = ctx.aspect("avoid");
        let side = ctx.side();
        let state = ctx.state();
        let lawful_bonus = state.time_of_day().lawful_bonus;

        let mut best: Option<AttackChoice> = None;
        for attacker in state.units_of(side).filter(|u| u.attacks_left > 0) {
            if passive_leader && attacker.is_leader() {
                continue;
            }
            let Some(attacker_type) = state.unit_type_of(attacker) else {
                continue;
            };
            let hexes: Vec<MapLocation> = reachable_locations(state, attacker)
                .into_iter()
                .map(|(loc, _)| loc)
                .filter(|loc| *loc == attacker.loc || !avoid.matches(&state.map, loc))
                .collect();

            for defender in state.enemy_units(side) {
                let Some(defender_type) = state.unit_type_of(defender) else {
                    continue;
                };
                let defender_terrain = state.map.terrain(&defender.loc).unwrap_or(Terrain::Flat);
                for from in hexes.iter().filter(|h| h.is_adjacent(&defender.loc)) {
                    let from_terrain = state.map.terrain(from).unwrap_or(Terrain::Flat);
                    let exchange = best_exchange(
                        attacker_type,
                        defender_type,
                        attacker_type.chance_to_be_hit(from_terrain),
                        defender_type.chance_to_be_hit(defender_terrain),
                        lawful_bonus,
                    );
                    let rating = rate_attack(&exchange, attacker, attacker_type, defender, defender_type, attitude);
                    if best.map_or(true, |b| rating > b.rating) {
                        best = Some(AttackChoice {
                            attacker: attacker.id,
                            defender: defender.id,
                            from: *from,
                            origin: attacker.loc,
                            rating,
                        });
                    }
                }
            }
        }

        match best {
            Some(choice) if choice.rating > 0.0 => {
                debug!(
                    "Best attack: {} on {} from {} (rating {:.2})",
                    choice.attacker, choice.defender, choice.from, choice.rating
                );
                self.choice = Some(choice);
                info.default_score
            }
            _ => BAD_SCORE,
        }
    }

    fn execute(&mut self, _info: &CaInfo, ctx: &mut DecisionContext) {
        let Some(choice) = self.choice.take() else {
            return;
        };
        issue(
            ctx,
            ActionRequest::Attack {
                attacker: choice.attacker,
                defender: choice.defender,
                from: (choice.from != choice.origin).then_some(choice.from),
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::{aspects, place, world};
    use super::*;
    use crate::config::Config;
    use crate::core::config::EngineSettings;
    use crate::game::actions::GameWorld;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    const ROWS: &str = "
        . . . . .
        . . . . .
        . . . . .
        ";

    fn evaluate(world: &mut crate::game::sim::SimWorld, overrides: &[(&str, Config)]) -> (f64, CombatPhase) {
        let mut set = aspects(overrides);
        let settings = EngineSettings::default();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let mut ctx = DecisionContext::new(1, world, &mut set, &[], &mut rng, &settings);
        let mut phase = CombatPhase::new();
        let info = CaInfo::new("combat", "combat", "native", 100_000.0);
        let score = phase.evaluate(&info, &mut ctx);
        (score, phase)
    }

    #[test]
    fn test_attacks_weak_enemy() {
        let mut w = world(ROWS);
        let bowman = place(&mut w, "Bowman", 1, MapLocation::new(0, 1), false);
        let grunt = place(&mut w, "Grunt", 2, MapLocation::new(2, 1), false);
        let (score, mut phase) = evaluate(&mut w, &[]);
        assert_eq!(score, 100_000.0);
        let choice = phase.choice.unwrap();
        assert_eq!(choice.attacker, bowman);
        assert_eq!(choice.defender, grunt);

        let mut set = aspects(&[]);
        let settings = EngineSettings::default();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let mut ctx = DecisionContext::new(1, &mut w, &mut set, &[], &mut rng, &settings);
        let info = CaInfo::new("combat", "combat", "native", 100_000.0);
        phase.execute(&info, &mut ctx);
        drop(ctx);
        assert!(w.state().unit(grunt).unwrap().hitpoints < 38);
        assert_eq!(w.state().unit(bowman).unwrap().attacks_left, 0);
    }

    #[test]
    fn test_passive_leader_does_not_attack() {
        let mut w = world(ROWS);
        place(&mut w, "Lieutenant", 1, MapLocation::new(0, 1), true);
        place(&mut w, "Grunt", 2, MapLocation::new(1, 1), false);
        let passive = Config::new().with("value", true);
        let (score, _) = evaluate(&mut w, &[("passive_leader", passive)]);
        assert_eq!(score, BAD_SCORE);
    }

    #[test]
    fn test_no_enemies_no_attack() {
        let mut w = world(ROWS);
        place(&mut w, "Spearman", 1, MapLocation::new(0, 1), false);
        let (score, phase) = evaluate(&mut w, &[]);
        assert_eq!(score, BAD_SCORE);
        assert!(phase.choice.is_none());
    }
}
