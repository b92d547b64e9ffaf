//! Simulated world - applies action requests to a `GameState`
//!
//! Validates every request the way the rules engine of a real game would,
//! resolves combat with expected damage, and counts successful changes so
//! gamestate observers can verify an action had an effect.

use tracing::{debug, trace};

use super::actions::{ActionError, ActionRequest, ActionResult, GameWorld};
use super::combat::best_exchange;
use super::pathfind::reachable_locations;
use super::state::GameState;
use super::unit::Unit;
use crate::core::types::{MapLocation, Side, UnitId};

/// Experience gained per level of a killed unit
const KILL_EXPERIENCE: u32 = 8;

pub struct SimWorld {
    state: GameState,
}

impl SimWorld {
    pub fn new(state: GameState) -> Self {
        Self { state }
    }

    pub fn state_mut(&mut self) -> &mut GameState {
        &mut self.state
    }

    pub fn into_state(self) -> GameState {
        self.state
    }

    /// Prepare `side` for its turn: restore moves and collect income
    ///
    /// Income is paid from turn 2 on, matching the usual starting gold rule.
    pub fn begin_side_turn(&mut self, side: Side) {
        for unit in self.state.units.iter_mut().filter(|u| u.side == side) {
            unit.refresh();
        }
        if self.state.turn > 1 {
            let income = self.state.income(side);
            if let Some(team) = self.state.team_mut(side) {
                team.gold += income;
                debug!("Side {} collects {} gold (now {})", side, income, team.gold);
            }
        }
    }

    /// Advance the turn counter once every side has played
    pub fn end_turn(&mut self) {
        self.state.turn += 1;
    }

    fn own_unit(&self, side: Side, id: UnitId) -> Result<&Unit, ActionError> {
        let unit = self.state.unit(id).ok_or(ActionError::NoSuchUnit(id))?;
        if unit.side != side {
            return Err(ActionError::NotOwnUnit(id));
        }
        Ok(unit)
    }

    fn do_move(&mut self, side: Side, id: UnitId, to: MapLocation) -> Result<(), ActionError> {
        let unit = self.own_unit(side, id)?;
        if unit.loc == to {
            return Err(ActionError::Occupied(to));
        }
        if unit.moves == 0 {
            return Err(ActionError::NoMovesLeft(id));
        }
        if self.state.is_occupied(&to) {
            return Err(ActionError::Occupied(to));
        }
        let cost = reachable_locations(&self.state, unit)
            .into_iter()
            .find(|(loc, _)| *loc == to)
            .map(|(_, cost)| cost)
            .ok_or(ActionError::Unreachable(to))?;

        let captures = self.state.map.is_village(&to) && self.state.map.village_owner(&to) != Some(side);
        if let Some(unit) = self.state.unit_mut(id) {
            unit.loc = to;
            unit.moves = if captures { 0 } else { unit.moves.saturating_sub(cost) };
        }
        if captures {
            self.state.map.set_village_owner(to, Some(side));
            debug!("Side {} captures village at {}", side, to);
        }
        Ok(())
    }

    fn do_attack(
        &mut self,
        side: Side,
        attacker_id: UnitId,
        defender_id: UnitId,
        from: Option<MapLocation>,
    ) -> Result<(), ActionError> {
        let attacker = self.own_unit(side, attacker_id)?;
        if attacker.attacks_left == 0 {
            return Err(ActionError::NoAttacksLeft(attacker_id));
        }
        let defender = self.state.unit(defender_id).ok_or(ActionError::NoSuchUnit(defender_id))?;
        if !self.state.is_enemy(side, defender.side) {
            return Err(ActionError::NotOwnUnit(defender_id));
        }
        let defender_loc = defender.loc;

        if let Some(from) = from {
            if from != attacker.loc {
                self.do_move(side, attacker_id, from)?;
            }
        }

        let (Some(attacker), Some(defender)) = (self.state.unit(attacker_id), self.state.unit(defender_id)) else {
            return Err(ActionError::NoSuchUnit(attacker_id));
        };
        if !attacker.loc.is_adjacent(&defender_loc) {
            return Err(ActionError::NotAdjacent);
        }
        let (Some(attacker_type), Some(defender_type)) =
            (self.state.unit_type_of(attacker), self.state.unit_type_of(defender))
        else {
            return Err(ActionError::NoSuchUnit(attacker_id));
        };
        let attacker_terrain = self.state.map.terrain(&attacker.loc).unwrap_or(super::map::Terrain::Flat);
        let defender_terrain = self.state.map.terrain(&defender.loc).unwrap_or(super::map::Terrain::Flat);
        let exchange = best_exchange(
            attacker_type,
            defender_type,
            attacker_type.chance_to_be_hit(attacker_terrain),
            defender_type.chance_to_be_hit(defender_terrain),
            self.state.time_of_day().lawful_bonus,
        );
        let attacker_level = attacker_type.level;
        let defender_level = defender_type.level;

        let dealt = exchange.dealt.round() as u32;
        let taken = exchange.taken.round() as u32;
        trace!("{} attacks {}: dealt {} taken {}", attacker_id, defender_id, dealt, taken);

        if let Some(defender) = self.state.unit_mut(defender_id) {
            defender.hitpoints = defender.hitpoints.saturating_sub(dealt);
        }
        let defender_killed = self.state.unit(defender_id).map_or(false, |u| u.hitpoints == 0);
        if let Some(attacker) = self.state.unit_mut(attacker_id) {
            if !defender_killed {
                attacker.hitpoints = attacker.hitpoints.saturating_sub(taken);
            }
            attacker.attacks_left = 0;
            attacker.moves = 0;
            attacker.experience += if defender_killed {
                KILL_EXPERIENCE * defender_level.max(1)
            } else {
                defender_level
            };
        }
        if let Some(defender) = self.state.unit_mut(defender_id) {
            defender.experience += attacker_level;
        }
        self.state.units.retain(|u| u.hitpoints > 0);
        Ok(())
    }

    /// Resolve which castle hex a recruit or recall lands on
    fn recruit_site(
        &self,
        side: Side,
        leader: Option<UnitId>,
        location: Option<MapLocation>,
    ) -> Result<MapLocation, ActionError> {
        let candidates: Vec<&Unit> = match leader {
            Some(id) => {
                let unit = self.own_unit(side, id)?;
                if !unit.can_recruit {
                    return Err(ActionError::NoLeaderOnKeep);
                }
                vec![unit]
            }
            None => self.state.leaders(side).collect(),
        };
        for leader in candidates {
            if !self.state.map.is_keep(&leader.loc) {
                continue;
            }
            let vacant = self.state.vacant_castle(&leader.loc);
            match location {
                Some(loc) if vacant.contains(&loc) => return Ok(loc),
                Some(_) => continue,
                None => {
                    if let Some(first) = vacant.first() {
                        return Ok(*first);
                    }
                }
            }
        }
        Err(ActionError::NoLeaderOnKeep)
    }

    fn do_recruit(
        &mut self,
        side: Side,
        unit_type: &str,
        location: Option<MapLocation>,
        leader: Option<UnitId>,
    ) -> Result<(), ActionError> {
        let team = self.state.team(side).ok_or(ActionError::UnknownSide(side))?;
        let leader = match leader {
            None if !team.can_recruit_type(unit_type) => self
                .state
                .leaders(side)
                .find(|l| l.recruits_extra(unit_type))
                .map(|l| l.id),
            given => given,
        };
        let leader_allows = leader
            .and_then(|id| self.state.unit(id))
            .map_or(false, |l| l.side == side && l.recruits_extra(unit_type));
        if !team.can_recruit_type(unit_type) && !leader_allows {
            return Err(ActionError::NotRecruitable(unit_type.to_string()));
        }
        let recruit_type = self
            .state
            .catalog
            .get(unit_type)
            .cloned()
            .ok_or_else(|| ActionError::NotRecruitable(unit_type.to_string()))?;
        let cost = recruit_type.cost as i32;
        if cost > team.gold {
            return Err(ActionError::NotEnoughGold {
                needed: cost,
                available: team.gold,
            });
        }
        let site = self.recruit_site(side, leader, location)?;

        let id = self.state.allocate_unit_id();
        self.state.add_unit(Unit::new(id, &recruit_type, side, site));
        if let Some(team) = self.state.team_mut(side) {
            team.gold -= cost;
        }
        debug!("Side {} recruits {} at {}", side, unit_type, site);
        Ok(())
    }

    fn do_recall(
        &mut self,
        side: Side,
        id: UnitId,
        location: Option<MapLocation>,
        leader: Option<UnitId>,
    ) -> Result<(), ActionError> {
        let team = self.state.team(side).ok_or(ActionError::UnknownSide(side))?;
        if !team.recall_list.iter().any(|u| u.id == id) {
            return Err(ActionError::NotOnRecallList(id));
        }
        if team.recall_cost > team.gold {
            return Err(ActionError::NotEnoughGold {
                needed: team.recall_cost,
                available: team.gold,
            });
        }
        let site = self.recruit_site(side, leader, location)?;

        let Some(team) = self.state.team_mut(side) else {
            return Err(ActionError::UnknownSide(side));
        };
        let Some(index) = team.recall_list.iter().position(|u| u.id == id) else {
            return Err(ActionError::NotOnRecallList(id));
        };
        let mut unit = team.recall_list.remove(index);
        team.gold -= team.recall_cost;
        unit.loc = site;
        unit.side = side;
        unit.moves = 0;
        unit.attacks_left = 0;
        debug!("Side {} recalls {} at {}", side, unit.name, site);
        self.state.add_unit(unit);
        Ok(())
    }
}

impl GameWorld for SimWorld {
    fn state(&self) -> &GameState {
        &self.state
    }

    fn execute(&mut self, side: Side, action: &ActionRequest) -> ActionResult {
        let outcome = match action {
            ActionRequest::Move { unit, to } => self.do_move(side, *unit, *to),
            ActionRequest::Attack {
                attacker,
                defender,
                from,
            } => self.do_attack(side, *attacker, *defender, *from),
            ActionRequest::Recruit {
                unit_type,
                location,
                leader,
            } => self.do_recruit(side, unit_type, *location, *leader),
            ActionRequest::Recall { unit, location, leader } => self.do_recall(side, *unit, *location, *leader),
        };
        match outcome {
            Ok(()) => {
                self.state.mark_changed();
                ActionResult::success()
            }
            Err(e) => {
                debug!("Side {} action {:?} rejected: {}", side, action, e);
                ActionResult::failure(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::map::GameMap;
    use crate::game::team::Team;
    use crate::game::unit::UnitTypeCatalog;

    fn world(rows: &str) -> SimWorld {
        let mut state = GameState::new(GameMap::from_rows(rows).unwrap(), UnitTypeCatalog::builtin());
        let mut t1 = Team::new(1);
        t1.enemies.push(2);
        t1.recruits = vec!["Spearman".into(), "Bowman".into()];
        let mut t2 = Team::new(2);
        t2.enemies.push(1);
        state.teams = vec![t1, t2];
        SimWorld::new(state)
    }

    fn place(world: &mut SimWorld, type_id: &str, side: Side, loc: MapLocation, leader: bool) -> UnitId {
        let state = world.state_mut();
        let unit_type = state.catalog.get(type_id).unwrap().clone();
        let id = state.allocate_unit_id();
        let mut unit = Unit::new(id, &unit_type, side, loc);
        unit.can_recruit = leader;
        unit.refresh();
        state.add_unit(unit);
        id
    }

    #[test]
    fn test_recruit_needs_leader_on_keep() {
        let mut world = world("c k . .");
        let leader = place(&mut world, "Lieutenant", 1, MapLocation::new(2, 0), true);
        let recruit = ActionRequest::Recruit {
            unit_type: "Spearman".into(),
            location: None,
            leader: None,
        };
        let result = world.execute(1, &recruit);
        assert_eq!(result.outcome, Err(ActionError::NoLeaderOnKeep));
        assert!(!result.gamestate_changed);

        world.state_mut().unit_mut(leader).unwrap().loc = MapLocation::new(1, 0);
        let before = world.state().change_count();
        let result = world.execute(1, &recruit);
        assert!(result.is_ok());
        assert_eq!(world.state().change_count(), before + 1);
        assert_eq!(world.state().gold(1), 100 - 14);
        assert!(world.state().unit_at(&MapLocation::new(0, 0)).is_some());
    }

    #[test]
    fn test_recruit_rejects_unaffordable_and_unknown() {
        let mut world = world("c k");
        place(&mut world, "Lieutenant", 1, MapLocation::new(1, 0), true);
        world.state_mut().team_mut(1).unwrap().gold = 5;
        let result = world.execute(
            1,
            &ActionRequest::Recruit {
                unit_type: "Spearman".into(),
                location: None,
                leader: None,
            },
        );
        assert!(matches!(result.outcome, Err(ActionError::NotEnoughGold { .. })));
        let result = world.execute(
            1,
            &ActionRequest::Recruit {
                unit_type: "Grunt".into(),
                location: None,
                leader: None,
            },
        );
        assert_eq!(result.outcome, Err(ActionError::NotRecruitable("Grunt".into())));
    }

    #[test]
    fn test_leader_extra_recruits() {
        let mut world = world("c k . . c k");
        let plain = place(&mut world, "Lieutenant", 1, MapLocation::new(1, 0), true);
        let mage_leader = place(&mut world, "Lieutenant", 1, MapLocation::new(5, 0), true);
        world.state_mut().unit_mut(mage_leader).unwrap().extra_recruit = vec!["Mage".into()];
        let recruit_mage = |leader| ActionRequest::Recruit {
            unit_type: "Mage".into(),
            location: None,
            leader,
        };

        let result = world.execute(1, &recruit_mage(Some(plain)));
        assert_eq!(result.outcome, Err(ActionError::NotRecruitable("Mage".into())));
        assert!(world.execute(1, &recruit_mage(None)).is_ok());
        assert_eq!(world.state().unit_at(&MapLocation::new(4, 0)).unwrap().type_id, "Mage");
    }

    #[test]
    fn test_move_captures_village() {
        let mut world = world(". v . .");
        let id = place(&mut world, "Spearman", 1, MapLocation::new(0, 0), false);
        let result = world.execute(
            1,
            &ActionRequest::Move {
                unit: id,
                to: MapLocation::new(1, 0),
            },
        );
        assert!(result.is_ok());
        assert_eq!(world.state().map.village_owner(&MapLocation::new(1, 0)), Some(1));
        assert_eq!(world.state().unit(id).unwrap().moves, 0);
    }

    #[test]
    fn test_attack_damages_defender() {
        let mut world = world(". . .");
        let attacker = place(&mut world, "Spearman", 1, MapLocation::new(0, 0), false);
        let defender = place(&mut world, "Grunt", 2, MapLocation::new(1, 0), false);
        let hp_before = world.state().unit(defender).unwrap().hitpoints;
        let result = world.execute(
            1,
            &ActionRequest::Attack {
                attacker,
                defender,
                from: None,
            },
        );
        assert!(result.is_ok());
        assert!(world.state().unit(defender).unwrap().hitpoints < hp_before);
        assert_eq!(world.state().unit(attacker).unwrap().attacks_left, 0);
    }

    #[test]
    fn test_recall_moves_unit_from_list() {
        let mut world = world("c k");
        place(&mut world, "Lieutenant", 1, MapLocation::new(1, 0), true);
        let spearman = world.state().catalog.get("Spearman").unwrap().clone();
        let veteran = Unit::new(UnitId(50), &spearman, 1, MapLocation::new(0, 0));
        world.state_mut().team_mut(1).unwrap().recall_list.push(veteran);
        let result = world.execute(
            1,
            &ActionRequest::Recall {
                unit: UnitId(50),
                location: None,
                leader: None,
            },
        );
        assert!(result.is_ok());
        assert!(world.state().unit(UnitId(50)).is_some());
        assert_eq!(world.state().gold(1), 80);
        assert!(world.state().team(1).unwrap().recall_list.is_empty());
    }

    #[test]
    fn test_begin_side_turn_collects_income_after_first_turn() {
        let mut world = world("v .");
        world.state_mut().map.set_village_owner(MapLocation::new(0, 0), Some(1));
        world.begin_side_turn(1);
        assert_eq!(world.state().gold(1), 100);
        world.end_turn();
        world.begin_side_turn(1);
        assert_eq!(world.state().gold(1), 104);
    }
}
