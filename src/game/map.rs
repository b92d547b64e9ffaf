//! Hex map - terrain, villages and castles
//!
//! Rectangular map in axial coordinates. Villages carry an owner, and
//! castles are connected groups of castle/keep hexes a leader standing on
//! a keep can recruit into.

use ahash::{AHashMap, AHashSet};
use serde::{Deserialize, Serialize};

use crate::core::error::{AiError, Result};
use crate::core::types::{MapLocation, Side};

/// Terrain types affecting movement and defense
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Terrain {
    Flat,
    Forest,
    Hills,
    Mountains,
    ShallowWater,
    Swamp,
    Sand,
    Cave,
    Village,
    Castle,
    Keep,
}

impl Terrain {
    /// Map code used in scenario files
    pub fn from_code(code: char) -> Option<Self> {
        match code {
            '.' => Some(Self::Flat),
            'f' => Some(Self::Forest),
            'h' => Some(Self::Hills),
            'm' => Some(Self::Mountains),
            'w' => Some(Self::ShallowWater),
            's' => Some(Self::Swamp),
            'd' => Some(Self::Sand),
            'u' => Some(Self::Cave),
            'v' => Some(Self::Village),
            'c' => Some(Self::Castle),
            'k' => Some(Self::Keep),
            _ => None,
        }
    }

    pub fn code(&self) -> char {
        match self {
            Self::Flat => '.',
            Self::Forest => 'f',
            Self::Hills => 'h',
            Self::Mountains => 'm',
            Self::ShallowWater => 'w',
            Self::Swamp => 's',
            Self::Sand => 'd',
            Self::Cave => 'u',
            Self::Village => 'v',
            Self::Castle => 'c',
            Self::Keep => 'k',
        }
    }

    /// Name used as key in unit type tables
    pub fn name(&self) -> &'static str {
        match self {
            Self::Flat => "flat",
            Self::Forest => "forest",
            Self::Hills => "hills",
            Self::Mountains => "mountains",
            Self::ShallowWater => "shallow_water",
            Self::Swamp => "swamp",
            Self::Sand => "sand",
            Self::Cave => "cave",
            Self::Village => "village",
            Self::Castle => "castle",
            Self::Keep => "keep",
        }
    }

    /// Movement cost used when a unit type does not override it
    pub fn default_movement_cost(&self) -> u32 {
        match self {
            Self::Flat | Self::Village | Self::Castle | Self::Keep => 1,
            Self::Forest | Self::Hills | Self::Sand | Self::Cave => 2,
            Self::Mountains | Self::ShallowWater | Self::Swamp => 3,
        }
    }

    /// Chance to be hit (percent) used when a unit type does not override it
    pub fn default_defense(&self) -> u32 {
        match self {
            Self::Flat | Self::Cave => 60,
            Self::Forest | Self::Hills => 50,
            Self::Mountains | Self::Village | Self::Castle | Self::Keep => 40,
            Self::Sand | Self::Swamp => 70,
            Self::ShallowWater => 80,
        }
    }

    pub fn is_castle(&self) -> bool {
        matches!(self, Self::Castle | Self::Keep)
    }
}

/// The game map
#[derive(Debug, Clone)]
pub struct GameMap {
    pub width: i32,
    pub height: i32,
    tiles: Vec<Terrain>,
    village_owners: AHashMap<MapLocation, Side>,
}

impl GameMap {
    /// Create a map filled with flat terrain
    pub fn new(width: i32, height: i32) -> Self {
        let size = (width.max(0) * height.max(0)) as usize;
        Self {
            width,
            height,
            tiles: vec![Terrain::Flat; size],
            village_owners: AHashMap::new(),
        }
    }

    /// Parse rows of terrain codes (whitespace ignored, one row per line)
    pub fn from_rows(rows: &str) -> Result<Self> {
        let parsed: Vec<Vec<Terrain>> = rows
            .lines()
            .map(|line| line.chars().filter(|c| !c.is_whitespace()).collect::<Vec<char>>())
            .filter(|codes| !codes.is_empty())
            .map(|codes| {
                codes
                    .into_iter()
                    .map(|c| {
                        Terrain::from_code(c)
                            .ok_or_else(|| AiError::Scenario(format!("unknown terrain code '{}'", c)))
                    })
                    .collect::<Result<Vec<Terrain>>>()
            })
            .collect::<Result<Vec<_>>>()?;

        let height = parsed.len() as i32;
        let width = parsed.first().map(|r| r.len()).unwrap_or(0) as i32;
        if parsed.iter().any(|r| r.len() as i32 != width) {
            return Err(AiError::Scenario("map rows have different lengths".into()));
        }

        let mut map = Self::new(width, height);
        for (y, row) in parsed.into_iter().enumerate() {
            for (x, terrain) in row.into_iter().enumerate() {
                map.set_terrain(MapLocation::new(x as i32, y as i32), terrain);
            }
        }
        Ok(map)
    }

    pub fn on_board(&self, loc: &MapLocation) -> bool {
        loc.x >= 0 && loc.y >= 0 && loc.x < self.width && loc.y < self.height
    }

    fn index(&self, loc: &MapLocation) -> Option<usize> {
        if self.on_board(loc) {
            Some((loc.y * self.width + loc.x) as usize)
        } else {
            None
        }
    }

    pub fn terrain(&self, loc: &MapLocation) -> Option<Terrain> {
        self.index(loc).map(|i| self.tiles[i])
    }

    pub fn set_terrain(&mut self, loc: MapLocation, terrain: Terrain) {
        if let Some(i) = self.index(&loc) {
            self.tiles[i] = terrain;
        }
    }

    /// All locations on the board, row by row
    pub fn locations(&self) -> impl Iterator<Item = MapLocation> + '_ {
        (0..self.height).flat_map(move |y| (0..self.width).map(move |x| MapLocation::new(x, y)))
    }

    pub fn on_board_neighbors(&self, loc: &MapLocation) -> Vec<MapLocation> {
        loc.neighbors()
            .into_iter()
            .filter(|n| self.on_board(n))
            .collect()
    }

    // === VILLAGES ===

    pub fn is_village(&self, loc: &MapLocation) -> bool {
        self.terrain(loc) == Some(Terrain::Village)
    }

    pub fn villages(&self) -> Vec<MapLocation> {
        self.locations().filter(|l| self.is_village(l)).collect()
    }

    pub fn village_owner(&self, loc: &MapLocation) -> Option<Side> {
        self.village_owners.get(loc).copied()
    }

    pub fn set_village_owner(&mut self, loc: MapLocation, side: Option<Side>) {
        match side {
            Some(s) => {
                self.village_owners.insert(loc, s);
            }
            None => {
                self.village_owners.remove(&loc);
            }
        }
    }

    pub fn village_count(&self, side: Side) -> usize {
        self.village_owners.values().filter(|&&s| s == side).count()
    }

    // === CASTLES ===

    pub fn is_keep(&self, loc: &MapLocation) -> bool {
        self.terrain(loc) == Some(Terrain::Keep)
    }

    pub fn keeps(&self) -> Vec<MapLocation> {
        self.locations().filter(|l| self.is_keep(l)).collect()
    }

    /// Castle hexes connected to a keep (the keep itself excluded)
    pub fn castle_of(&self, keep: &MapLocation) -> Vec<MapLocation> {
        if !self.is_keep(keep) {
            return Vec::new();
        }
        let mut seen = AHashSet::new();
        let mut stack = vec![*keep];
        let mut castle = Vec::new();
        seen.insert(*keep);
        while let Some(current) = stack.pop() {
            for n in self.on_board_neighbors(&current) {
                if seen.contains(&n) {
                    continue;
                }
                if self.terrain(&n).map_or(false, |t| t.is_castle()) {
                    seen.insert(n);
                    stack.push(n);
                    castle.push(n);
                }
            }
        }
        castle.sort();
        castle
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rows() {
        let map = GameMap::from_rows(
            "
            . f v
            c k h
            ",
        )
        .unwrap();
        assert_eq!(map.width, 3);
        assert_eq!(map.height, 2);
        assert_eq!(map.terrain(&MapLocation::new(2, 0)), Some(Terrain::Village));
        assert_eq!(map.terrain(&MapLocation::new(1, 1)), Some(Terrain::Keep));
        assert_eq!(map.terrain(&MapLocation::new(5, 5)), None);
    }

    #[test]
    fn test_unknown_code_rejected() {
        assert!(GameMap::from_rows("..X").is_err());
        assert!(GameMap::from_rows("...\n..").is_err());
    }

    #[test]
    fn test_castle_connectivity() {
        let map = GameMap::from_rows(
            "
            c c . c
            . k . .
            ",
        )
        .unwrap();
        let castle = map.castle_of(&MapLocation::new(1, 1));
        assert_eq!(castle, vec![MapLocation::new(0, 0), MapLocation::new(1, 0)]);
        assert!(!castle.contains(&MapLocation::new(3, 0)));
    }

    #[test]
    fn test_village_ownership() {
        let mut map = GameMap::from_rows("v v .").unwrap();
        map.set_village_owner(MapLocation::new(0, 0), Some(1));
        assert_eq!(map.village_count(1), 1);
        assert_eq!(map.village_owner(&MapLocation::new(1, 0)), None);
        map.set_village_owner(MapLocation::new(0, 0), None);
        assert_eq!(map.village_count(1), 0);
    }
}
