//! Goals and the move targets derived from them
//!
//! Goals are configured hints (`target_unit`, `target_location`,
//! `protect_location`, `protect_unit`). Each turn they are turned into
//! weighted [`Target`]s, together with targets the AI finds on its own
//! (villages, enemy leaders, threats, fights in progress). Move selection
//! consumes the targets and lowers their value as units are sent.

use tracing::warn;

use super::aspect::Activation;
use super::component::Component;
use super::engine::NATIVE_ENGINE;
use crate::config::Config;
use crate::core::error::{AiError, Result};
use crate::core::types::{MapLocation, Side};
use crate::game::state::GameState;
use crate::game::unit::Unit;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetKind {
    Village,
    Leader,
    Explicit,
    Threat,
    BattleAid,
    Mass,
    Support,
}

impl TargetKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetKind::Village => "village",
            TargetKind::Leader => "leader",
            TargetKind::Explicit => "explicit",
            TargetKind::Threat => "threat",
            TargetKind::BattleAid => "battle_aid",
            TargetKind::Mass => "mass",
            TargetKind::Support => "support",
        }
    }
}

/// A weighted location units should move towards
#[derive(Debug, Clone, PartialEq)]
pub struct Target {
    pub loc: MapLocation,
    pub value: f64,
    pub kind: TargetKind,
}

impl Target {
    pub fn new(loc: MapLocation, value: f64, kind: TargetKind) -> Self {
        Self { loc, value, kind }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GoalKind {
    TargetUnit,
    TargetLocation,
    ProtectLocation,
    ProtectUnit,
}

impl GoalKind {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "target" | "target_unit" => Some(GoalKind::TargetUnit),
            "target_location" => Some(GoalKind::TargetLocation),
            "protect_location" => Some(GoalKind::ProtectLocation),
            "protect_unit" => Some(GoalKind::ProtectUnit),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            GoalKind::TargetUnit => "target_unit",
            GoalKind::TargetLocation => "target_location",
            GoalKind::ProtectLocation => "protect_location",
            GoalKind::ProtectUnit => "protect_unit",
        }
    }

    fn is_protect(&self) -> bool {
        matches!(self, GoalKind::ProtectLocation | GoalKind::ProtectUnit)
    }
}

/// Default radius a protect goal watches
const DEFAULT_PROTECT_RADIUS: i64 = 6;

#[derive(Debug, Clone)]
pub struct Goal {
    id: String,
    kind: GoalKind,
    value: f64,
    activation: Activation,
    /// `[criteria]`: unit id/type/side or x/y lists
    criteria: Config,
    protect_radius: u32,
}

impl Goal {
    pub fn new(id: &str, kind: GoalKind, value: f64, criteria: Config) -> Self {
        Self {
            id: id.to_string(),
            kind,
            value,
            activation: Activation::default(),
            criteria,
            protect_radius: DEFAULT_PROTECT_RADIUS as u32,
        }
    }

    pub fn from_config(cfg: &Config) -> Result<Self> {
        let name = cfg.str_or("name", "target");
        let kind = GoalKind::from_name(&name).ok_or_else(|| AiError::UnknownComponent {
            kind: "goal",
            name: name.clone(),
            engine: NATIVE_ENGINE.to_string(),
        })?;
        let id = cfg.str_or("id", kind.as_str());
        let mut goal = Self::new(
            &id,
            kind,
            cfg.float_or("value", 0.0),
            cfg.child("criteria").cloned().unwrap_or_default(),
        );
        goal.activation = Activation::from_config(cfg);
        goal.protect_radius = cfg.int_or("protect_radius", DEFAULT_PROTECT_RADIUS).max(0) as u32;
        Ok(goal)
    }

    pub fn kind(&self) -> GoalKind {
        self.kind
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn is_active(&self, state: &GameState) -> bool {
        self.activation.is_active(state)
    }

    fn unit_matches(&self, unit: &Unit) -> bool {
        if let Some(id) = self.criteria.string("id") {
            if id != unit.name && id != unit.id.to_string() {
                return false;
            }
        }
        if let Some(type_id) = self.criteria.string("type") {
            if !type_id.split(',').any(|t| t.trim() == unit.type_id) {
                return false;
            }
        }
        if let Some(side) = self.criteria.get("side").and_then(|s| s.to_int()) {
            if i64::from(unit.side) != side {
                return false;
            }
        }
        true
    }

    fn locations(&self) -> Vec<MapLocation> {
        let xs = self.criteria.list("x");
        let ys = self.criteria.list("y");
        xs.iter()
            .zip(ys.iter())
            .filter_map(|(x, y)| Some(MapLocation::new(x.parse().ok()?, y.parse().ok()?)))
            .collect()
    }

    /// Append this goal's targets for `side`
    pub fn add_targets(&self, state: &GameState, side: Side, out: &mut Vec<Target>) {
        if !self.is_active(state) || self.value <= 0.0 {
            return;
        }
        match self.kind {
            GoalKind::TargetUnit => {
                for unit in state.enemy_units(side).filter(|u| self.unit_matches(u)) {
                    out.push(Target::new(unit.loc, self.value, TargetKind::Explicit));
                }
            }
            GoalKind::TargetLocation => {
                for loc in self.locations().into_iter().filter(|l| state.map.on_board(l)) {
                    out.push(Target::new(loc, self.value, TargetKind::Explicit));
                }
            }
            GoalKind::ProtectLocation | GoalKind::ProtectUnit => {
                let guarded: Vec<MapLocation> = if self.kind == GoalKind::ProtectLocation {
                    self.locations()
                } else {
                    state
                        .units_of(side)
                        .filter(|u| self.unit_matches(u))
                        .map(|u| u.loc)
                        .collect()
                };
                for loc in guarded {
                    let threats: Vec<&Unit> = state
                        .enemy_units(side)
                        .filter(|e| e.loc.distance(&loc) <= self.protect_radius)
                        .collect();
                    if threats.is_empty() {
                        let guarded_already = state
                            .units_of(side)
                            .any(|u| u.loc != loc && u.loc.distance(&loc) <= self.protect_radius / 2);
                        if !guarded_already {
                            out.push(Target::new(loc, self.value / 2.0, TargetKind::Support));
                        }
                    }
                    for enemy in threats {
                        out.push(Target::new(enemy.loc, self.value, TargetKind::Threat));
                    }
                }
            }
        }
    }
}

impl Component for Goal {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        self.kind.as_str()
    }

    fn engine(&self) -> &str {
        NATIVE_ENGINE
    }

    fn to_config(&self) -> Config {
        let mut cfg = Config::new()
            .with("id", self.id.as_str())
            .with("name", self.kind.as_str())
            .with("engine", NATIVE_ENGINE)
            .with("value", self.value);
        self.activation.write_config(&mut cfg);
        if self.kind.is_protect() {
            cfg.set("protect_radius", self.protect_radius);
        }
        if !self.criteria.is_empty() {
            cfg.add_child("criteria", self.criteria.clone());
        }
        cfg
    }
}

/// Tunables for the targets the AI finds without goals
#[derive(Debug, Clone, Copy)]
pub struct TargetWeights {
    pub village_value: f64,
    pub leader_value: f64,
    pub caution: f64,
}

/// Every target for `side` this turn: configured goals first, then villages,
/// enemy leaders, threats to own leaders and fights in progress. When none
/// exist, one mass target at the enemy unit closest to the enemy centroid.
pub fn find_targets(state: &GameState, side: Side, goals: &[Box<Goal>], weights: TargetWeights) -> Vec<Target> {
    let mut targets = Vec::new();
    for goal in goals {
        goal.add_targets(state, side, &mut targets);
    }

    if weights.village_value > 0.0 {
        for village in state.map.villages() {
            if state.map.village_owner(&village) != Some(side) {
                targets.push(Target::new(village, weights.village_value, TargetKind::Village));
            }
        }
    }

    if weights.leader_value > 0.0 {
        for leader in state.enemy_units(side).filter(|u| u.is_leader()) {
            targets.push(Target::new(leader.loc, weights.leader_value, TargetKind::Leader));
        }
    }

    for own_leader in state.leaders(side) {
        for enemy in state.enemy_units(side) {
            if enemy.loc.distance(&own_leader.loc) <= enemy.max_moves + 1 {
                let value = weights.leader_value * (1.0 + weights.caution);
                targets.push(Target::new(enemy.loc, value, TargetKind::Threat));
            }
        }
    }

    for enemy in state.enemy_units(side) {
        if state.units_of(side).any(|u| u.loc.is_adjacent(&enemy.loc)) {
            targets.push(Target::new(enemy.loc, 1.0, TargetKind::BattleAid));
        }
    }

    if targets.is_empty() {
        if let Some(mass) = mass_target(state, side) {
            targets.push(mass);
        }
    }
    targets
}

fn mass_target(state: &GameState, side: Side) -> Option<Target> {
    let enemies: Vec<&Unit> = state.enemy_units(side).collect();
    if enemies.is_empty() {
        return None;
    }
    let n = enemies.len() as i32;
    let centroid = MapLocation::new(
        enemies.iter().map(|u| u.loc.x).sum::<i32>() / n,
        enemies.iter().map(|u| u.loc.y).sum::<i32>() / n,
    );
    let closest = enemies.iter().min_by_key(|u| u.loc.distance(&centroid))?;
    Some(Target::new(closest.loc, 1.0, TargetKind::Mass))
}

/// Build goals from `[goal]` configs, logging the ones that fail
pub fn parse_goal_config(cfg: &Config, out: &mut Vec<Box<Goal>>) {
    match Goal::from_config(cfg) {
        Ok(goal) => out.push(Box::new(goal)),
        Err(e) => warn!("Skipping goal: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::UnitId;
    use crate::game::map::GameMap;
    use crate::game::team::Team;
    use crate::game::unit::UnitTypeCatalog;

    fn state() -> GameState {
        let catalog = UnitTypeCatalog::builtin();
        let mut state = GameState::new(GameMap::from_rows(". . . . . .\n. . v . . .\n. . . . . .").unwrap(), catalog.clone());
        let mut one = Team::new(1);
        one.enemies = vec![2];
        let mut two = Team::new(2);
        two.enemies = vec![1];
        state.teams = vec![one, two];
        let spearman = catalog.get("Spearman").unwrap();
        let grunt = catalog.get("Grunt").unwrap();
        state.add_unit(Unit::new(UnitId(1), spearman, 1, MapLocation::new(0, 0)));
        let mut boss = Unit::new(UnitId(2), grunt, 2, MapLocation::new(5, 2));
        boss.name = "Boss".into();
        state.add_unit(boss);
        state
    }

    #[test]
    fn test_target_unit_goal() {
        let state = state();
        let goal = Goal::from_config(
            &Config::new()
                .with("name", "target_unit")
                .with("value", 5.0)
                .with_child("criteria", Config::new().with("id", "Boss")),
        )
        .unwrap();
        let mut targets = Vec::new();
        goal.add_targets(&state, 1, &mut targets);
        assert_eq!(targets, vec![Target::new(MapLocation::new(5, 2), 5.0, TargetKind::Explicit)]);
    }

    #[test]
    fn test_protect_location_reports_threats() {
        let state = state();
        let goal = Goal::from_config(
            &Config::new()
                .with("name", "protect_location")
                .with("value", 4.0)
                .with("protect_radius", 3)
                .with_child("criteria", Config::new().with("x", "3").with("y", "2")),
        )
        .unwrap();
        let mut targets = Vec::new();
        goal.add_targets(&state, 1, &mut targets);
        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].kind, TargetKind::Threat);
        assert_eq!(targets[0].loc, MapLocation::new(5, 2));
    }

    #[test]
    fn test_unknown_goal_rejected() {
        assert!(Goal::from_config(&Config::new().with("name", "conquer_world")).is_err());
    }

    #[test]
    fn test_generated_targets_include_villages() {
        let state = state();
        let weights = TargetWeights {
            village_value: 1.0,
            leader_value: 3.0,
            caution: 0.25,
        };
        let targets = find_targets(&state, 1, &[], weights);
        assert!(targets.iter().any(|t| t.kind == TargetKind::Village && t.loc == MapLocation::new(2, 1)));
        assert!(!targets.iter().any(|t| t.kind == TargetKind::Leader));
    }
}
