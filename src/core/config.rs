//! Engine settings with documented constants
//!
//! All tuning numbers of the decision engine are collected here with
//! explanations of their purpose and how they interact with each other.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::core::error::{AiError, Result};

/// Tuning constants for the recruitment subsystem
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecruitmentSettings {
    /// Radius (hexes) around a leader in which an enemy puts it in danger
    ///
    /// When an enemy stands this close, recruitment ignores gold saving
    /// and blocker instructions so the leader gets defenders.
    pub danger_radius: u32,

    /// Maximum difference (in turns) between own and enemy reach times
    /// for a hex to count as an important, contested hex
    pub important_hex_tolerance: f64,

    /// Score bonus given to scout-usage types while the scout quota is unmet
    pub scout_bonus: f64,

    /// Number of upcoming turns averaged for the lawful bonus estimate
    pub tod_lookahead: u32,

    /// Number of important hexes nearest to a leader used for that
    /// leader's terrain and combat estimates; 0 uses all of them
    pub local_hexes: usize,
}

impl Default for RecruitmentSettings {
    fn default() -> Self {
        Self {
            danger_radius: 4,
            important_hex_tolerance: 1.0,
            scout_bonus: 0.5,
            tod_lookahead: 3,
            local_hexes: 12,
        }
    }
}

/// Configuration for the decision engine
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Maximum nesting depth of turn decisions
    ///
    /// A fallback stage or script that re-enters the turn machinery counts
    /// one level. Exceeding it aborts only the nested branch.
    pub max_recursion_depth: u32,

    /// Skip evaluating candidate actions whose max_score cannot beat the
    /// current best. Never changes the winner, only the evaluation count.
    pub pruning: bool,

    /// Seed for the per-side random number generators
    pub seed: u64,

    /// Hard cap on executions per stage call, protecting against a
    /// candidate action that keeps changing state without progressing
    pub max_executions_per_stage: u32,

    pub recruitment: RecruitmentSettings,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            max_recursion_depth: 100,
            pruning: true,
            seed: 42,
            max_executions_per_stage: 1000,
            recruitment: RecruitmentSettings::default(),
        }
    }
}

impl EngineSettings {
    /// Create settings with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse settings from a TOML string
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let settings: EngineSettings = toml::from_str(content)?;
        settings.validate().map_err(AiError::Config)?;
        Ok(settings)
    }

    /// Load settings from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Validate configuration for internal consistency
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.max_recursion_depth == 0 {
            return Err("max_recursion_depth must be at least 1".into());
        }

        if self.max_executions_per_stage == 0 {
            return Err("max_executions_per_stage must be at least 1".into());
        }

        if self.recruitment.important_hex_tolerance < 0.0 {
            return Err(format!(
                "important_hex_tolerance ({}) must not be negative",
                self.recruitment.important_hex_tolerance
            ));
        }

        if self.recruitment.tod_lookahead == 0 {
            return Err("tod_lookahead must be at least 1".into());
        }

        Ok(())
    }
}
