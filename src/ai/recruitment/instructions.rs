//! Recruitment instructions: prioritized jobs and unit limits
//!
//! A `[recruit]` job says what to recruit (type ids or usages, empty means
//! anything), how many, how important it is and whether an unfulfillable job
//! blocks the less important ones. A `[limit]` caps how many own units of
//! some types may be on the map.

use crate::ai::aspect::AspectValue;
use crate::ai::variant::Variant;
use crate::config::Config;
use crate::game::unit::UnitType;

/// Does `unit_type` match any of `patterns` (type id or usage)?
/// An empty pattern list matches everything.
pub fn type_matches(patterns: &[String], unit_type: &UnitType) -> bool {
    patterns.is_empty()
        || patterns.iter().any(|p| {
            p == &unit_type.id || p == unit_type.usage.as_str() || p.replace('_', " ") == unit_type.usage.as_str()
        })
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecruitJob {
    pub types: Vec<String>,
    pub importance: i64,
    /// How many to recruit; `None` is unlimited
    pub number: Option<u32>,
    /// Count own units already on the map towards `number`
    pub total: bool,
    /// An unfulfillable job stops recruitment for this evaluation
    pub blocker: bool,
    pub leader_id: Option<String>,
}

impl Default for RecruitJob {
    fn default() -> Self {
        Self {
            types: Vec::new(),
            importance: 1,
            number: None,
            total: false,
            blocker: true,
            leader_id: None,
        }
    }
}

impl RecruitJob {
    pub fn from_config(cfg: &Config) -> Self {
        let number = cfg.int_or("number", -1);
        Self {
            types: cfg.list("type"),
            importance: cfg.int_or("importance", 1),
            number: (number >= 0).then_some(number as u32),
            total: cfg.bool_or("total", false),
            blocker: cfg.bool_or("blocker", true),
            leader_id: cfg.string("leader_id"),
        }
    }

    pub fn to_config(&self) -> Config {
        let mut cfg = Config::new()
            .with("importance", self.importance)
            .with("total", self.total)
            .with("blocker", self.blocker);
        if !self.types.is_empty() {
            cfg.set("type", self.types.join(","));
        }
        if let Some(number) = self.number {
            cfg.set("number", number);
        }
        if let Some(leader) = &self.leader_id {
            cfg.set("leader_id", leader.as_str());
        }
        cfg
    }

    /// Key for per-turn bookkeeping
    pub fn key(&self) -> String {
        format!(
            "{}|{}|{}",
            self.importance,
            self.types.join(","),
            self.leader_id.as_deref().unwrap_or("")
        )
    }

    pub fn matches(&self, unit_type: &UnitType) -> bool {
        type_matches(&self.types, unit_type)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecruitLimit {
    pub types: Vec<String>,
    pub max: u32,
}

impl RecruitLimit {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            types: cfg.list("type"),
            max: cfg.int_or("max", 0).max(0) as u32,
        }
    }

    pub fn to_config(&self) -> Config {
        Config::new().with("type", self.types.join(",")).with("max", self.max)
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct RecruitmentInstructions {
    pub jobs: Vec<RecruitJob>,
    pub limits: Vec<RecruitLimit>,
}

impl RecruitmentInstructions {
    /// Recruit anything, as much as gold allows
    pub fn default_instructions() -> Self {
        Self {
            jobs: vec![RecruitJob {
                importance: 0,
                ..RecruitJob::default()
            }],
            limits: Vec::new(),
        }
    }

    pub fn from_instruction_config(cfg: &Config) -> Self {
        Self {
            jobs: cfg.children("recruit").map(RecruitJob::from_config).collect(),
            limits: cfg.children("limit").map(RecruitLimit::from_config).collect(),
        }
    }

    pub fn to_instruction_config(&self) -> Config {
        let mut cfg = Config::new();
        for job in &self.jobs {
            cfg.add_child("recruit", job.to_config());
        }
        for limit in &self.limits {
            cfg.add_child("limit", limit.to_config());
        }
        cfg
    }

    /// Jobs by descending importance, configuration order among equals
    pub fn jobs_by_importance(&self) -> Vec<&RecruitJob> {
        let mut jobs: Vec<&RecruitJob> = self.jobs.iter().collect();
        jobs.sort_by_key(|j| std::cmp::Reverse(j.importance));
        jobs
    }
}

impl AspectValue for RecruitmentInstructions {
    const TYPE_NAME: &'static str = "recruitment_instructions";

    fn from_config(cfg: &Config) -> Option<Self> {
        cfg.child("value").map(Self::from_instruction_config)
    }

    fn write_config(&self, cfg: &mut Config) {
        cfg.add_child("value", self.to_instruction_config());
    }

    fn from_variant(variant: &Variant) -> Option<Self> {
        match variant {
            Variant::Config(c) => Some(Self::from_instruction_config(c)),
            _ => None,
        }
    }

    fn to_variant(&self) -> Variant {
        Variant::Config(self.to_instruction_config())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::unit::UnitTypeCatalog;

    #[test]
    fn test_patterns_match_id_and_usage() {
        let catalog = UnitTypeCatalog::builtin();
        let cavalry = catalog.get("Cavalryman").unwrap();
        let mage = catalog.get("Mage").unwrap();
        assert!(type_matches(&[], cavalry));
        assert!(type_matches(&["scout".to_string()], cavalry));
        assert!(type_matches(&["Cavalryman".to_string()], cavalry));
        assert!(type_matches(&["mixed_fighter".to_string()], mage));
        assert!(!type_matches(&["archer".to_string()], mage));
    }

    #[test]
    fn test_jobs_sorted_by_importance() {
        let cfg = Config::new()
            .with_child("recruit", Config::new().with("type", "scout").with("importance", 1).with("number", 1))
            .with_child("recruit", Config::new().with("importance", 5).with("blocker", false))
            .with_child("limit", Config::new().with("type", "Mage").with("max", 2));
        let instructions = RecruitmentInstructions::from_instruction_config(&cfg);
        let jobs = instructions.jobs_by_importance();
        assert_eq!(jobs[0].importance, 5);
        assert!(!jobs[0].blocker);
        assert_eq!(jobs[1].number, Some(1));
        assert_eq!(instructions.limits[0].max, 2);
        assert_eq!(
            RecruitmentInstructions::from_instruction_config(&instructions.to_instruction_config()),
            instructions
        );
    }

    #[test]
    fn test_default_is_single_unlimited_job() {
        let instructions = RecruitmentInstructions::default_instructions();
        assert_eq!(instructions.jobs.len(), 1);
        assert_eq!(instructions.jobs[0].number, None);
        assert!(instructions.jobs[0].types.is_empty());
    }
}
