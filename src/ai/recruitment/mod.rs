//! Recruitment candidate action
//!
//! Decides what to recruit (or recall), with which leader and where. The
//! decision runs in four steps:
//! 1. pick a mode: normal, saving gold, spending everything or defending a
//!    leader in danger
//! 2. analyze the map for contested hexes, then give every recruiting
//!    leader its own score map over its own recruit list, measured on the
//!    contested hexes nearest to it
//! 3. walk the recruitment instructions by importance to find the job to
//!    fill and the leader to fill it, leaders sharing the work by ratio
//! 4. choose the unit type, balancing score, diversity and randomness
//!
//! Per-turn tallies (recruits per job and per leader) reset at turn start.

pub mod analysis;
pub mod combat;
pub mod instructions;

use ahash::AHashMap;
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

use self::analysis::MapAnalysis;
use self::combat::{combat_scores, enemy_presence, CombatCache};
use self::instructions::{type_matches, RecruitJob, RecruitmentInstructions};
use crate::ai::candidate_action::{CaBehavior, CaInfo, BAD_SCORE};
use crate::ai::context::{DecisionContext, IssueActions, ReadGameInfo};
use crate::config::Config;
use crate::core::config::RecruitmentSettings;
use crate::core::types::{MapLocation, Side, Turn, UnitId};
use crate::game::actions::ActionRequest;
use crate::game::state::GameState;
use crate::game::team::Team;
use crate::game::unit::{Unit, UnitType};

pub const RECRUITMENT_CA: &str = "recruitment";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecruitMode {
    Normal,
    SaveGold,
    SpendAllGold,
    LeaderInDanger,
}

/// What the last evaluation decided to do
#[derive(Debug, Clone, PartialEq)]
pub struct RecruitDecision {
    pub leader: UnitId,
    pub unit_type: String,
    /// Recall list unit used instead of a fresh recruit
    pub recall: Option<UnitId>,
    pub location: MapLocation,
    pub job: String,
    pub mode: RecruitMode,
}

impl RecruitDecision {
    pub fn to_action(&self) -> ActionRequest {
        match self.recall {
            Some(unit) => ActionRequest::Recall {
                unit,
                location: Some(self.location),
                leader: Some(self.leader),
            },
            None => ActionRequest::Recruit {
                unit_type: self.unit_type.clone(),
                location: Some(self.location),
                leader: Some(self.leader),
            },
        }
    }
}

/// `recruitment_save_gold` aspect contents
#[derive(Debug, Clone, PartialEq)]
pub struct SaveGold {
    /// First turn saving may start; 0 disables saving
    pub active: Turn,
    /// Own/enemy strength ratio at which saving starts
    pub begin: f64,
    /// Ratio below which saving stops again
    pub end: f64,
    /// Gold at which everything is spent regardless; negative disables
    pub spend_all_gold: i64,
    pub save_on_negative_income: bool,
}

impl SaveGold {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            active: cfg.int_or("active", 2).max(0) as Turn,
            begin: cfg.float_or("begin", 1.5),
            end: cfg.float_or("end", 1.1),
            spend_all_gold: cfg.int_or("spend_all_gold", -1),
            save_on_negative_income: cfg.bool_or("save_on_negative_income", false),
        }
    }
}

/// Aspect values read once per evaluation
struct Params {
    instructions: RecruitmentInstructions,
    more: Vec<String>,
    diversity: f64,
    randomness: i64,
    save_gold: SaveGold,
    ignore_bad_movement: bool,
    ignore_bad_combat: bool,
    villages_per_scout: i64,
    settings: RecruitmentSettings,
}

impl Params {
    fn read(ctx: &mut DecisionContext) -> Self {
        Self {
            instructions: ctx.aspect("recruitment_instructions"),
            more: ctx.aspect("recruitment_more"),
            diversity: ctx.aspect("recruitment_diversity"),
            randomness: ctx.aspect("recruitment_randomness"),
            save_gold: SaveGold::from_config(&ctx.aspect::<Config>("recruitment_save_gold")),
            ignore_bad_movement: ctx.aspect("recruitment_ignore_bad_movement"),
            ignore_bad_combat: ctx.aspect("recruitment_ignore_bad_combat"),
            villages_per_scout: ctx.aspect("villages_per_scout"),
            settings: ctx.settings().recruitment.clone(),
        }
    }
}

/// A leader standing on a keep with room to recruit
struct RecruitingLeader<'a> {
    unit: &'a Unit,
    castle: Vec<MapLocation>,
    in_danger: bool,
    /// Side recruit list plus the leader's extras
    recruits: Vec<&'a UnitType>,
    /// Map analysis restricted to the contested hexes nearest this leader
    analysis: MapAnalysis,
    raw_scores: BTreeMap<String, f64>,
    /// Sums to 1 over `recruits`
    scores: BTreeMap<String, f64>,
    /// Share of the side's recruiting this leader should do; all leaders sum to 1
    ratio_score: f64,
}

impl RecruitingLeader<'_> {
    fn matches(&self, leader_id: &Option<String>) -> bool {
        match leader_id {
            None => true,
            Some(id) => self.unit.name == *id || self.unit.id.to_string() == *id,
        }
    }
}

/// Sum of unit costs scaled by remaining health
fn army_value<'a>(state: &GameState, units: impl Iterator<Item = &'a Unit>) -> f64 {
    units
        .filter_map(|u| {
            let unit_type = state.unit_type_of(u)?;
            Some(unit_type.cost as f64 * u.hitpoints as f64 / u.max_hitpoints.max(1) as f64)
        })
        .sum()
}

fn own_count(state: &GameState, side: Side, patterns: &[String]) -> u32 {
    state
        .units_of(side)
        .filter(|u| !u.is_leader())
        .filter(|u| state.unit_type_of(u).map_or(false, |t| type_matches(patterns, t)))
        .count() as u32
}

#[derive(Debug, Default)]
pub struct Recruitment {
    save_gold_active: bool,
    save_gold_checked: Option<Turn>,
    job_counts: AHashMap<String, u32>,
    leader_counts: AHashMap<UnitId, u32>,
    decision: Option<RecruitDecision>,
}

impl Recruitment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(_cfg: &Config) -> Self {
        Self::new()
    }

    pub fn decision(&self) -> Option<&RecruitDecision> {
        self.decision.as_ref()
    }

    /// Work out the next recruit without executing it
    pub fn decide(&mut self, ctx: &mut DecisionContext) -> Option<RecruitDecision> {
        let params = Params::read(ctx);
        let side = ctx.side();
        let (state, rng) = ctx.state_and_rng();
        let team = state.team(side)?;

        let mut leaders = recruiting_leaders(state, side, &params.settings);
        if leaders.is_empty() {
            debug!("Side {} has no leader able to recruit", side);
            return None;
        }

        let mode = self.mode(state, side, &leaders, &params.save_gold);
        if mode == RecruitMode::SaveGold {
            info!("Side {} is saving gold", side);
            return None;
        }

        if leaders.iter().all(|l| l.recruits.is_empty()) {
            return None;
        }
        let analysis = MapAnalysis::analyze(state, side, &params.settings);
        score_leaders(state, side, &mut leaders, &analysis, &params);

        for job in params.instructions.jobs_by_importance() {
            if self.is_exhausted(state, side, job) {
                continue;
            }
            let eligible: Vec<(&RecruitingLeader, Vec<&UnitType>)> = leaders
                .iter()
                .filter(|l| l.matches(&job.leader_id))
                .map(|l| {
                    let types: Vec<&UnitType> = l
                        .recruits
                        .iter()
                        .copied()
                        .filter(|t| job.matches(t))
                        .filter(|t| t.cost as i32 <= team.gold || recall_candidate(team, t).is_some())
                        .filter(|t| within_limits(state, side, &params.instructions, t))
                        .collect();
                    (l, types)
                })
                .filter(|(_, types)| !types.is_empty())
                .collect();

            if eligible.is_empty() {
                if job.blocker && mode != RecruitMode::LeaderInDanger {
                    debug!("Recruitment blocked by job {}", job.key());
                    return None;
                }
                continue;
            }

            let (leader, types) = self.choose_leader(&eligible);
            let unit_type = choose_unit(state, side, types, &leader.scores, &params, rng)?;
            let location = choose_location(leader)?;
            let recall = recall_candidate(team, unit_type).map(|u| u.id);

            return Some(RecruitDecision {
                leader: leader.unit.id,
                unit_type: unit_type.id.clone(),
                recall,
                location,
                job: job.key(),
                mode,
            });
        }
        None
    }

    fn mode(&mut self, state: &GameState, side: Side, leaders: &[RecruitingLeader], save_gold: &SaveGold) -> RecruitMode {
        if leaders.iter().any(|l| l.in_danger) {
            return RecruitMode::LeaderInDanger;
        }
        let gold = state.gold(side) as i64;
        if save_gold.spend_all_gold >= 0 && gold >= save_gold.spend_all_gold {
            return RecruitMode::SpendAllGold;
        }
        if self.update_save_gold(state, side, save_gold) {
            RecruitMode::SaveGold
        } else {
            RecruitMode::Normal
        }
    }

    /// Hysteresis between `begin` and `end`, checked once per turn
    fn update_save_gold(&mut self, state: &GameState, side: Side, save_gold: &SaveGold) -> bool {
        if self.save_gold_checked == Some(state.turn) {
            return self.save_gold_active;
        }
        self.save_gold_checked = Some(state.turn);

        if save_gold.active == 0 || state.turn < save_gold.active {
            self.save_gold_active = false;
            return false;
        }
        if state.income(side) < 0 && !save_gold.save_on_negative_income {
            self.save_gold_active = false;
            return false;
        }
        let own = army_value(state, state.units_of(side));
        let enemy = army_value(state, state.enemy_units(side));
        let ratio = if enemy > 0.0 { own / enemy } else { f64::INFINITY };

        if self.save_gold_active {
            if ratio < save_gold.end {
                self.save_gold_active = false;
            }
        } else if ratio >= save_gold.begin {
            self.save_gold_active = true;
        }
        debug!("Side {} strength ratio {:.2}, saving gold: {}", side, ratio, self.save_gold_active);
        self.save_gold_active
    }

    fn is_exhausted(&self, state: &GameState, side: Side, job: &RecruitJob) -> bool {
        let Some(number) = job.number else {
            return false;
        };
        let count = if job.total {
            own_count(state, side, &job.types)
        } else {
            self.job_counts.get(&job.key()).copied().unwrap_or(0)
        };
        count >= number
    }

    /// Leaders in danger first, then whoever is furthest behind its
    /// `ratio_score` share of this turn's recruits
    fn choose_leader<'l, 'a>(
        &self,
        eligible: &'l [(&'l RecruitingLeader<'a>, Vec<&'a UnitType>)],
    ) -> (&'l RecruitingLeader<'a>, &'l [&'a UnitType]) {
        let load = |leader: &RecruitingLeader| {
            let count = self.leader_counts.get(&leader.unit.id).copied().unwrap_or(0);
            (count + 1) as f64 / leader.ratio_score.max(f64::EPSILON)
        };
        let mut best = &eligible[0];
        for candidate in &eligible[1..] {
            let better_danger = candidate.0.in_danger && !best.0.in_danger;
            let same_danger = candidate.0.in_danger == best.0.in_danger;
            if better_danger || (same_danger && load(candidate.0) < load(best.0)) {
                best = candidate;
            }
        }
        (best.0, &best.1)
    }
}

fn recruiting_leaders<'a>(state: &'a GameState, side: Side, settings: &RecruitmentSettings) -> Vec<RecruitingLeader<'a>> {
    state
        .leaders(side)
        .filter(|l| state.map.is_keep(&l.loc))
        .filter_map(|unit| {
            let castle = state.vacant_castle(&unit.loc);
            if castle.is_empty() {
                return None;
            }
            let in_danger = state
                .enemy_units(side)
                .any(|e| e.loc.distance(&unit.loc) <= settings.danger_radius);
            Some(RecruitingLeader {
                unit,
                castle,
                in_danger,
                recruits: state.leader_recruits(unit),
                analysis: MapAnalysis::default(),
                raw_scores: BTreeMap::new(),
                scores: BTreeMap::new(),
                ratio_score: 0.0,
            })
        })
        .collect()
}

/// Fill in every leader's score maps and ratio; one combat cache serves
/// all of them
fn score_leaders(
    state: &GameState,
    side: Side,
    leaders: &mut [RecruitingLeader],
    analysis: &MapAnalysis,
    params: &Params,
) {
    let enemies = enemy_presence(state, side);
    let mut cache = CombatCache::new();
    for leader in leaders.iter_mut() {
        leader.analysis = analysis.local(state, leader.unit.loc, params.settings.local_hexes);
        leader.raw_scores = if enemies.is_empty() {
            leader.recruits.iter().map(|t| (t.id.clone(), 1.0)).collect()
        } else {
            combat_scores(&mut cache, &leader.recruits, &enemies, &leader.analysis)
        };
        leader.scores = type_scores(&leader.recruits, &leader.raw_scores, &leader.analysis, params);
    }
    debug!("Combat cache: {} hits, {} misses", cache.hits(), cache.misses());

    // a leader's weight is the best matchup it can field, shifted so the
    // weakest leader keeps a small share
    let best: Vec<f64> = leaders
        .iter()
        .map(|l| l.raw_scores.values().copied().fold(f64::NEG_INFINITY, f64::max))
        .collect();
    let known = best.iter().copied().filter(|b| b.is_finite());
    let min = known.clone().fold(f64::INFINITY, f64::min);
    let max = known.fold(f64::NEG_INFINITY, f64::max);
    let spread = max - min;
    let mass: Vec<f64> = best
        .iter()
        .map(|b| {
            if !b.is_finite() {
                0.0
            } else if spread > 0.0 {
                b - min + spread * 0.1
            } else {
                1.0
            }
        })
        .collect();
    let total: f64 = mass.iter().sum();
    for (leader, mass) in leaders.iter_mut().zip(mass) {
        leader.ratio_score = if total > 0.0 { mass / total } else { 0.0 };
        debug!("Leader {} recruit ratio {:.3}", leader.unit.name, leader.ratio_score);
    }
}

/// Best recall list unit of this type, when recalling is affordable and no
/// dearer than a fresh recruit
fn recall_candidate<'t>(team: &'t Team, unit_type: &UnitType) -> Option<&'t Unit> {
    if team.recall_cost > team.gold || team.recall_cost > unit_type.cost as i32 {
        return None;
    }
    team.recall_list
        .iter()
        .filter(|u| u.type_id == unit_type.id)
        .fold(None::<&Unit>, |best, u| match best {
            Some(b) if b.experience >= u.experience => Some(b),
            _ => Some(u),
        })
}

fn within_limits(state: &GameState, side: Side, instructions: &RecruitmentInstructions, unit_type: &UnitType) -> bool {
    instructions
        .limits
        .iter()
        .filter(|limit| type_matches(&limit.types, unit_type))
        .all(|limit| own_count(state, side, &limit.types) < limit.max)
}

/// Normalized desirability of each candidate type, summing to 1
fn type_scores(
    candidates: &[&UnitType],
    raw: &BTreeMap<String, f64>,
    analysis: &MapAnalysis,
    params: &Params,
) -> BTreeMap<String, f64> {
    let min = raw.values().copied().fold(f64::INFINITY, f64::min);
    let max = raw.values().copied().fold(f64::NEG_INFINITY, f64::max);
    let spread = max - min;
    let best_movement = candidates
        .iter()
        .map(|t| analysis.average_movement_cost(t))
        .fold(f64::INFINITY, f64::min);

    let mut scores = BTreeMap::new();
    for unit_type in candidates {
        let combat = raw.get(&unit_type.id).copied().unwrap_or(0.0);
        let mut score = if spread > 0.0 { combat - min + spread * 0.1 } else { 1.0 };
        if !params.ignore_bad_combat && combat < 0.0 && max > 0.0 {
            score = 0.0;
        }
        if !params.ignore_bad_movement {
            let movement = analysis.average_movement_cost(unit_type);
            if movement > 0.0 {
                score *= best_movement / movement;
            }
        }
        scores.insert(unit_type.id.clone(), score);
    }

    let top = scores.values().copied().fold(0.0, f64::max);
    for entry in &params.more {
        let wanted = [entry.clone()];
        for unit_type in candidates.iter().filter(|t| type_matches(&wanted, t)) {
            if let Some(score) = scores.get_mut(&unit_type.id) {
                *score += top.max(1.0) * 0.5;
            }
        }
    }

    let sum: f64 = scores.values().sum();
    let count = scores.len().max(1) as f64;
    for score in scores.values_mut() {
        *score = if sum > 0.0 { *score / sum } else { 1.0 / count };
    }
    scores
}

/// Highest perturbed score, damped by how common the type already is;
/// ties go to the earlier type in the recruit list
fn choose_unit<'a>(
    state: &GameState,
    side: Side,
    types: &[&'a UnitType],
    scores: &BTreeMap<String, f64>,
    params: &Params,
    rng: &mut ChaCha8Rng,
) -> Option<&'a UnitType> {
    let army: Vec<&Unit> = state.units_of(side).filter(|u| !u.is_leader()).collect();
    let army_size = army.len() as f64;
    let scouts = army
        .iter()
        .filter(|u| state.unit_type_of(u).map_or(false, |t| t.usage.as_str() == "scout"))
        .count() as i64;
    let unowned_villages = state
        .map
        .villages()
        .iter()
        .filter(|v| state.map.village_owner(v) != Some(side))
        .count() as i64;
    let wanted_scouts = if params.villages_per_scout > 0 {
        unowned_villages / params.villages_per_scout
    } else {
        0
    };

    let mut best: Option<(&UnitType, f64)> = None;
    for unit_type in types {
        let share = army.iter().filter(|u| u.type_id == unit_type.id).count() as f64 / (army_size + 1.0);
        let perturb = if params.randomness > 0 {
            rng.gen_range(-params.randomness..=params.randomness) as f64 / 100.0
        } else {
            0.0
        };
        let base = scores.get(&unit_type.id).copied().unwrap_or(0.0);
        let mut value = base * (1.0 + perturb) / (1.0 + params.diversity * share);
        if unit_type.usage.as_str() == "scout" && scouts < wanted_scouts {
            value += params.settings.scout_bonus / types.len() as f64;
        }
        debug!("Recruit candidate {}: {:.4}", unit_type.id, value);
        if best.map_or(true, |(_, b)| value > b) {
            best = Some((unit_type, value));
        }
    }
    best.map(|(t, _)| t)
}

/// Vacant castle hex closest to the leader's front; the first one when there is no front
fn choose_location(leader: &RecruitingLeader) -> Option<MapLocation> {
    leader
        .castle
        .iter()
        .min_by_key(|loc| leader.analysis.distance_to_front(loc).unwrap_or(0))
        .copied()
}

impl CaBehavior for Recruitment {
    fn evaluate(&mut self, info: &CaInfo, ctx: &mut DecisionContext) -> f64 {
        self.decision = self.decide(ctx);
        match &self.decision {
            Some(_) => info.default_score,
            None => BAD_SCORE,
        }
    }

    fn execute(&mut self, info: &CaInfo, ctx: &mut DecisionContext) {
        let Some(decision) = self.decision.take() else {
            warn!("Candidate action '{}' executed without a decision", info.id);
            return;
        };
        let result = ctx.execute_action(&decision.to_action());
        if result.is_ok() {
            info!(
                "Side {} {} {} at {} ({:?})",
                ctx.side(),
                if decision.recall.is_some() { "recalls" } else { "recruits" },
                decision.unit_type,
                decision.location,
                decision.mode
            );
            *self.job_counts.entry(decision.job).or_insert(0) += 1;
            *self.leader_counts.entry(decision.leader).or_insert(0) += 1;
        }
    }

    fn on_turn_start(&mut self) {
        self.job_counts.clear();
        self.leader_counts.clear();
        self.decision = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::aspect::{registry::AspectRegistry, AspectSet};
    use crate::core::config::EngineSettings;
    use crate::game::actions::GameWorld;
    use crate::game::map::GameMap;
    use crate::game::sim::SimWorld;
    use crate::game::team::Team;
    use crate::game::unit::UnitTypeCatalog;
    use rand::SeedableRng;

    fn scenario() -> SimWorld {
        let map = GameMap::from_rows(
            "
            . . . . . . . .
            c k c . . v . .
            c c . . . . c c
            . . v . . c k c
            ",
        )
        .unwrap();
        let mut state = GameState::new(map, UnitTypeCatalog::builtin());
        let mut t1 = Team::new(1);
        t1.enemies.push(2);
        t1.recruits = vec!["Spearman".into(), "Bowman".into(), "Cavalryman".into(), "Mage".into()];
        let mut t2 = Team::new(2);
        t2.enemies.push(1);
        t2.recruits = vec!["Grunt".into(), "Orcish Archer".into()];
        state.teams = vec![t1, t2];
        for (type_id, side, loc) in [("Lieutenant", 1, MapLocation::new(1, 1)), ("Grunt", 2, MapLocation::new(6, 3))] {
            let unit_type = state.catalog.get(type_id).unwrap().clone();
            let id = state.allocate_unit_id();
            let mut unit = Unit::new(id, &unit_type, side, loc);
            unit.can_recruit = type_id == "Lieutenant";
            state.add_unit(unit);
        }
        SimWorld::new(state)
    }

    fn aspects(overrides: &[(&str, Config)]) -> AspectSet {
        let registry = AspectRegistry::builtin();
        let mut set = AspectSet::new();
        for id in registry.ids() {
            if let Some(factory) = registry.factory(id) {
                set.insert(factory.builtin(id));
            }
        }
        for (id, cfg) in overrides {
            if let Some(factory) = registry.factory(id) {
                set.insert(factory.standard(id, cfg));
            }
        }
        set
    }

    fn decide(world: &mut SimWorld, aspects: &mut AspectSet, seed: u64) -> Option<RecruitDecision> {
        let settings = EngineSettings::default();
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut ctx = DecisionContext::new(1, world, aspects, &[], &mut rng, &settings);
        Recruitment::new().decide(&mut ctx)
    }

    #[test]
    fn test_recruits_into_castle_of_leader() {
        let mut world = scenario();
        let mut set = aspects(&[]);
        let decision = decide(&mut world, &mut set, 7).unwrap();
        assert_eq!(decision.mode, RecruitMode::Normal);
        assert!(world.state().map.castle_of(&MapLocation::new(1, 1)).contains(&decision.location));
        assert!(world.state().team(1).unwrap().can_recruit_type(&decision.unit_type));
    }

    #[test]
    fn test_same_seed_same_choice() {
        let mut world = scenario();
        let mut set = aspects(&[]);
        let first = decide(&mut world, &mut set, 11);
        let second = decide(&mut world, &mut set, 11);
        assert_eq!(first, second);
    }

    #[test]
    fn test_blocking_job_stops_recruitment() {
        let mut world = scenario();
        let instructions = Config::new().with_child(
            "value",
            Config::new()
                .with_child("recruit", Config::new().with("type", "Heavy Infantryman").with("importance", 5))
                .with_child("recruit", Config::new().with("importance", 0)),
        );
        let mut set = aspects(&[("recruitment_instructions", instructions)]);
        assert!(decide(&mut world, &mut set, 1).is_none());
    }

    #[test]
    fn test_non_blocking_job_falls_through() {
        let mut world = scenario();
        let instructions = Config::new().with_child(
            "value",
            Config::new()
                .with_child(
                    "recruit",
                    Config::new()
                        .with("type", "Heavy Infantryman")
                        .with("importance", 5)
                        .with("blocker", false),
                )
                .with_child("recruit", Config::new().with("type", "archer").with("importance", 0)),
        );
        let mut set = aspects(&[("recruitment_instructions", instructions)]);
        let decision = decide(&mut world, &mut set, 1).unwrap();
        assert_eq!(decision.unit_type, "Bowman");
    }

    #[test]
    fn test_leader_in_danger_overrides_mode() {
        let mut world = scenario();
        if let Some(grunt) = world.state_mut().units.iter_mut().find(|u| u.side == 2) {
            grunt.loc = MapLocation::new(3, 1);
        }
        let mut set = aspects(&[]);
        let decision = decide(&mut world, &mut set, 3).unwrap();
        assert_eq!(decision.mode, RecruitMode::LeaderInDanger);
    }

    #[test]
    fn test_recall_preferred_when_cheaper() {
        let mut world = scenario();
        let mage_type = world.state().catalog.get("Mage").unwrap().clone();
        let veteran = Unit::new(UnitId(90), &mage_type, 1, MapLocation::new(0, 0));
        if let Some(team) = world.state_mut().team_mut(1) {
            team.recruits = vec!["Mage".into()];
            team.recall_list.push(veteran);
        }
        let mut set = aspects(&[]);
        let decision = decide(&mut world, &mut set, 5).unwrap();
        assert_eq!(decision.recall, Some(UnitId(90)));
    }

    #[test]
    fn test_recall_when_recruit_unaffordable() {
        let mut world = scenario();
        let mage_type = world.state().catalog.get("Mage").unwrap().clone();
        let veteran = Unit::new(UnitId(90), &mage_type, 1, MapLocation::new(0, 0));
        if let Some(team) = world.state_mut().team_mut(1) {
            team.recruits = vec!["Mage".into()];
            team.recall_list.push(veteran);
            team.recall_cost = 15;
            team.gold = 18;
        }
        let mut set = aspects(&[]);
        let decision = decide(&mut world, &mut set, 5).unwrap();
        assert_eq!(decision.recall, Some(UnitId(90)));

        world.state_mut().team_mut(1).unwrap().gold = 14;
        assert!(decide(&mut world, &mut set, 5).is_none());
    }

    /// Side 1 has no shared recruit list; each leader brings its own
    fn two_leaders() -> SimWorld {
        let map = GameMap::from_rows(
            "
            c k c . . . . . . . . c k c
            c c . . . . . . . . . . c c
            . . . . . v . . v . . . . .
            . . . . . . . . . . . . . .
            . . . . . . . . . . . . . .
            . . . . . . . . . . . . . .
            ",
        )
        .unwrap();
        let mut state = GameState::new(map, UnitTypeCatalog::builtin());
        let mut t1 = Team::new(1);
        t1.enemies.push(2);
        let mut t2 = Team::new(2);
        t2.enemies.push(1);
        t2.recruits = vec!["Grunt".into()];
        state.teams = vec![t1, t2];
        let leaders = [
            ("West", MapLocation::new(1, 0), vec!["Spearman".to_string()]),
            ("East", MapLocation::new(12, 0), vec!["Bowman".to_string(), "Mage".to_string()]),
        ];
        for (name, loc, extra) in leaders {
            let unit_type = state.catalog.get("Lieutenant").unwrap().clone();
            let id = state.allocate_unit_id();
            let mut unit = Unit::new(id, &unit_type, 1, loc);
            unit.name = name.into();
            unit.can_recruit = true;
            unit.extra_recruit = extra;
            state.add_unit(unit);
        }
        let grunt = state.catalog.get("Grunt").unwrap().clone();
        let id = state.allocate_unit_id();
        state.add_unit(Unit::new(id, &grunt, 2, MapLocation::new(7, 5)));
        SimWorld::new(state)
    }

    fn leader_ratios(world: &mut SimWorld) -> Vec<(String, Vec<String>, f64, f64)> {
        let settings = EngineSettings::default();
        let mut set = aspects(&[]);
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let mut ctx = DecisionContext::new(1, world, &mut set, &[], &mut rng, &settings);
        let params = Params::read(&mut ctx);
        let (state, _) = ctx.state_and_rng();
        let mut leaders = recruiting_leaders(state, 1, &params.settings);
        let analysis = MapAnalysis::analyze(state, 1, &params.settings);
        score_leaders(state, 1, &mut leaders, &analysis, &params);
        leaders
            .iter()
            .map(|l| {
                let scored: Vec<String> = l.scores.keys().cloned().collect();
                (l.unit.name.clone(), scored, l.scores.values().sum::<f64>(), l.ratio_score)
            })
            .collect()
    }

    #[test]
    fn test_each_leader_scores_its_own_recruits() {
        let mut world = two_leaders();
        let records = leader_ratios(&mut world);
        assert_eq!(records.len(), 2);
        let (west, east) = (&records[0], &records[1]);
        assert_eq!(west.0, "West");
        assert_eq!(west.1, vec!["Spearman"]);
        assert_eq!(east.1, vec!["Bowman", "Mage"]);
        for (_, _, score_sum, ratio) in &records {
            assert!((score_sum - 1.0).abs() < 1e-9);
            assert!(*ratio > 0.0);
        }
        assert!((west.3 + east.3 - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_busy_leader_hands_over_to_the_other() {
        let mut world = two_leaders();
        let mut set = aspects(&[]);
        let settings = EngineSettings::default();
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let mut recruitment = Recruitment::new();

        let mut ctx = DecisionContext::new(1, &mut world, &mut set, &[], &mut rng, &settings);
        let first = recruitment.decide(&mut ctx).unwrap();
        let first_leader = ctx.state_and_rng().0.unit(first.leader).unwrap().clone();
        assert!(ctx.state_and_rng().0.leader_recruits(&first_leader).iter().any(|t| t.id == first.unit_type));

        recruitment.leader_counts.insert(first.leader, 100);
        let second = recruitment.decide(&mut ctx).unwrap();
        assert_ne!(second.leader, first.leader);
        let second_leader = ctx.state_and_rng().0.unit(second.leader).unwrap().clone();
        let allowed: Vec<String> = second_leader.extra_recruit.clone();
        assert!(allowed.contains(&second.unit_type));
        assert!(second_leader.loc.distance(&second.location) <= 2);
    }

    #[test]
    fn test_save_gold_when_ahead() {
        let mut world = scenario();
        world.state_mut().turn = 3;
        world.state_mut().units.retain(|u| u.side == 1);
        let mut set = aspects(&[]);
        let decision = decide(&mut world, &mut set, 5);
        assert!(decision.is_none());
    }
}
