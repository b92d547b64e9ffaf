//! Core type definitions used throughout the codebase

use serde::{Deserialize, Serialize};
use std::fmt;

/// Side (team) number, starting at 1
pub type Side = u32;

/// Turn counter, starting at 1
pub type Turn = u32;

/// Unique identifier for units on the map or on a recall list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UnitId(pub u32);

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "u{}", self.0)
    }
}

/// Axial hex coordinate (x = column, y = row)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MapLocation {
    pub x: i32,
    pub y: i32,
}

impl MapLocation {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Get all 6 adjacent hexes
    pub fn neighbors(&self) -> [MapLocation; 6] {
        [
            MapLocation::new(self.x + 1, self.y),
            MapLocation::new(self.x + 1, self.y - 1),
            MapLocation::new(self.x, self.y - 1),
            MapLocation::new(self.x - 1, self.y),
            MapLocation::new(self.x - 1, self.y + 1),
            MapLocation::new(self.x, self.y + 1),
        ]
    }

    /// Distance in hex steps using axial coordinate formula
    pub fn distance(&self, other: &MapLocation) -> u32 {
        let dx = (self.x - other.x).abs();
        let dy = (self.y - other.y).abs();
        let ds = ((self.x + self.y) - (other.x + other.y)).abs();
        ((dx + dy + ds) / 2) as u32
    }

    pub fn is_adjacent(&self, other: &MapLocation) -> bool {
        self.distance(other) == 1
    }
}

impl fmt::Display for MapLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{})", self.x, self.y)
    }
}

/// One entry of the time-of-day schedule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeOfDay {
    pub id: String,
    /// Damage bonus in percent for lawful units (negative favours chaotic)
    #[serde(default)]
    pub lawful_bonus: i32,
}

impl TimeOfDay {
    pub fn new(id: &str, lawful_bonus: i32) -> Self {
        Self {
            id: id.to_string(),
            lawful_bonus,
        }
    }

    /// Standard six-step day/night cycle
    pub fn default_schedule() -> Vec<TimeOfDay> {
        vec![
            TimeOfDay::new("dawn", 0),
            TimeOfDay::new("morning", 25),
            TimeOfDay::new("afternoon", 25),
            TimeOfDay::new("dusk", 0),
            TimeOfDay::new("first_watch", -25),
            TimeOfDay::new("second_watch", -25),
        ]
    }
}

impl Default for TimeOfDay {
    fn default() -> Self {
        Self::new("dawn", 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_distance() {
        let a = MapLocation::new(0, 0);
        let b = MapLocation::new(2, 1);
        assert_eq!(a.distance(&b), 3);
        assert_eq!(MapLocation::new(0, 0).distance(&MapLocation::new(0, 3)), 3);
    }

    #[test]
    fn test_neighbors_are_adjacent() {
        let center = MapLocation::new(4, 4);
        for n in center.neighbors() {
            assert!(center.is_adjacent(&n));
        }
    }

    #[test]
    fn test_default_schedule_has_day_and_night() {
        let schedule = TimeOfDay::default_schedule();
        assert_eq!(schedule.len(), 6);
        assert!(schedule.iter().any(|t| t.lawful_bonus > 0));
        assert!(schedule.iter().any(|t| t.lawful_bonus < 0));
    }
}
