//! Teams (sides) - gold, income, recruit and recall lists

use serde::{Deserialize, Serialize};

use super::unit::Unit;
use crate::core::types::Side;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Team {
    pub side: Side,
    pub gold: i32,
    pub base_income: i32,
    /// Gold per owned village per turn
    pub village_income: i32,
    /// Upkeep levels each owned village supports for free
    pub village_support: i32,
    /// Unit types this side may recruit
    pub recruits: Vec<String>,
    pub recall_list: Vec<Unit>,
    pub recall_cost: i32,
    pub enemies: Vec<Side>,
}

impl Team {
    pub fn new(side: Side) -> Self {
        Self {
            side,
            gold: 100,
            base_income: 2,
            village_income: 2,
            village_support: 1,
            recruits: Vec::new(),
            recall_list: Vec::new(),
            recall_cost: 20,
            enemies: Vec::new(),
        }
    }

    pub fn is_enemy(&self, other: Side) -> bool {
        self.enemies.contains(&other)
    }

    pub fn can_recruit_type(&self, type_id: &str) -> bool {
        self.recruits.iter().any(|r| r == type_id)
    }

    /// Income for one turn given village count and total upkeep levels
    pub fn income(&self, villages: usize, upkeep_levels: i32) -> i32 {
        let villages = villages as i32;
        let upkeep = (upkeep_levels - villages * self.village_support).max(0);
        self.base_income + villages * self.village_income - upkeep
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_income_with_upkeep() {
        let team = Team::new(1);
        // 3 villages support 3 levels, 5 levels of units -> 2 upkeep
        assert_eq!(team.income(3, 5), 2 + 6 - 2);
        // Fully supported
        assert_eq!(team.income(4, 2), 2 + 8);
    }

    #[test]
    fn test_enemy_check() {
        let mut team = Team::new(1);
        team.enemies.push(2);
        assert!(team.is_enemy(2));
        assert!(!team.is_enemy(3));
    }
}
