//! Translators between aspect values, config and variants
//!
//! Every type an aspect can hold implements `AspectValue`. The compiler
//! enforces that a translator exists; a variant of the wrong shape is
//! reported by returning `None`.

use std::fmt;

use crate::ai::variant::Variant;
use crate::config::Config;
use crate::core::types::MapLocation;
use crate::game::map::{GameMap, Terrain};

pub trait AspectValue: Clone + Default + fmt::Debug + 'static {
    const TYPE_NAME: &'static str;

    /// Read the value of a standard aspect or facet config
    fn from_config(cfg: &Config) -> Option<Self>;

    fn write_config(&self, cfg: &mut Config);

    fn from_variant(variant: &Variant) -> Option<Self>;

    fn to_variant(&self) -> Variant;
}

impl AspectValue for bool {
    const TYPE_NAME: &'static str = "bool";

    fn from_config(cfg: &Config) -> Option<Self> {
        cfg.get("value")?.to_bool()
    }

    fn write_config(&self, cfg: &mut Config) {
        cfg.set("value", *self);
    }

    fn from_variant(variant: &Variant) -> Option<Self> {
        match variant {
            Variant::Bool(b) => Some(*b),
            Variant::Int(i) => Some(*i != 0),
            Variant::Str(s) => crate::config::AttrValue::Str(s.clone()).to_bool(),
            _ => None,
        }
    }

    fn to_variant(&self) -> Variant {
        Variant::Bool(*self)
    }
}

impl AspectValue for i64 {
    const TYPE_NAME: &'static str = "int";

    fn from_config(cfg: &Config) -> Option<Self> {
        cfg.get("value")?.to_int()
    }

    fn write_config(&self, cfg: &mut Config) {
        cfg.set("value", *self);
    }

    fn from_variant(variant: &Variant) -> Option<Self> {
        variant.as_int()
    }

    fn to_variant(&self) -> Variant {
        Variant::Int(*self)
    }
}

impl AspectValue for f64 {
    const TYPE_NAME: &'static str = "real";

    fn from_config(cfg: &Config) -> Option<Self> {
        cfg.get("value")?.to_float()
    }

    fn write_config(&self, cfg: &mut Config) {
        cfg.set("value", *self);
    }

    fn from_variant(variant: &Variant) -> Option<Self> {
        variant.as_real()
    }

    fn to_variant(&self) -> Variant {
        Variant::Real(*self)
    }
}

impl AspectValue for String {
    const TYPE_NAME: &'static str = "string";

    fn from_config(cfg: &Config) -> Option<Self> {
        cfg.string("value")
    }

    fn write_config(&self, cfg: &mut Config) {
        cfg.set("value", self.as_str());
    }

    fn from_variant(variant: &Variant) -> Option<Self> {
        match variant {
            Variant::Str(s) => Some(s.clone()),
            Variant::Int(_) | Variant::Real(_) | Variant::Bool(_) => Some(variant.to_string()),
            _ => None,
        }
    }

    fn to_variant(&self) -> Variant {
        Variant::Str(self.clone())
    }
}

impl AspectValue for Vec<String> {
    const TYPE_NAME: &'static str = "string_list";

    fn from_config(cfg: &Config) -> Option<Self> {
        cfg.get("value").map(|v| v.to_list())
    }

    fn write_config(&self, cfg: &mut Config) {
        cfg.set("value", self.join(","));
    }

    fn from_variant(variant: &Variant) -> Option<Self> {
        match variant {
            Variant::List(items) => items.iter().map(|i| i.as_str().map(String::from)).collect(),
            Variant::Str(s) => Some(
                s.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(String::from)
                    .collect(),
            ),
            Variant::Null => Some(Vec::new()),
            _ => None,
        }
    }

    fn to_variant(&self) -> Variant {
        Variant::List(self.iter().map(|s| Variant::Str(s.clone())).collect())
    }
}

impl AspectValue for Config {
    const TYPE_NAME: &'static str = "config";

    fn from_config(cfg: &Config) -> Option<Self> {
        cfg.child("value").cloned()
    }

    fn write_config(&self, cfg: &mut Config) {
        cfg.add_child("value", self.clone());
    }

    fn from_variant(variant: &Variant) -> Option<Self> {
        match variant {
            Variant::Config(c) => Some(c.clone()),
            Variant::Map(map) => {
                let mut cfg = Config::new();
                for (k, v) in map {
                    match v {
                        Variant::Bool(b) => cfg.set(k, *b),
                        Variant::Int(i) => cfg.set(k, *i),
                        Variant::Real(r) => cfg.set(k, *r),
                        Variant::Str(s) => cfg.set(k, s.as_str()),
                        Variant::Config(c) => {
                            cfg.add_child(k, c.clone());
                        }
                        _ => return None,
                    }
                }
                Some(cfg)
            }
            _ => None,
        }
    }

    fn to_variant(&self) -> Variant {
        Variant::Config(self.clone())
    }
}

/// A set of map locations, by explicit coordinates and/or terrain
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LocationFilter {
    pub locations: Vec<MapLocation>,
    pub terrain: Vec<Terrain>,
    /// Extra rings around each explicit location
    pub radius: u32,
}

impl LocationFilter {
    /// `x="1,2" y="3,4"` pairs up coordinates; `terrain="swamp,sand"`
    pub fn from_filter_config(cfg: &Config) -> Self {
        let xs = cfg.list("x");
        let ys = cfg.list("y");
        let locations = xs
            .iter()
            .zip(ys.iter())
            .filter_map(|(x, y)| Some(MapLocation::new(x.parse().ok()?, y.parse().ok()?)))
            .collect();
        let terrain = cfg
            .list("terrain")
            .iter()
            .filter_map(|name| terrain_by_name(name))
            .collect();
        Self {
            locations,
            terrain,
            radius: cfg.int_or("radius", 0).max(0) as u32,
        }
    }

    pub fn to_filter_config(&self) -> Config {
        let mut cfg = Config::new();
        if !self.locations.is_empty() {
            let xs: Vec<String> = self.locations.iter().map(|l| l.x.to_string()).collect();
            let ys: Vec<String> = self.locations.iter().map(|l| l.y.to_string()).collect();
            cfg.set("x", xs.join(","));
            cfg.set("y", ys.join(","));
        }
        if !self.terrain.is_empty() {
            let names: Vec<&str> = self.terrain.iter().map(|t| t.name()).collect();
            cfg.set("terrain", names.join(","));
        }
        if self.radius > 0 {
            cfg.set("radius", self.radius);
        }
        cfg
    }

    pub fn is_empty(&self) -> bool {
        self.locations.is_empty() && self.terrain.is_empty()
    }

    pub fn matches(&self, map: &GameMap, loc: &MapLocation) -> bool {
        if self.locations.iter().any(|l| l.distance(loc) <= self.radius) {
            return true;
        }
        map.terrain(loc).map_or(false, |t| self.terrain.contains(&t))
    }
}

fn terrain_by_name(name: &str) -> Option<Terrain> {
    const ALL: [Terrain; 11] = [
        Terrain::Flat,
        Terrain::Forest,
        Terrain::Hills,
        Terrain::Mountains,
        Terrain::ShallowWater,
        Terrain::Swamp,
        Terrain::Sand,
        Terrain::Cave,
        Terrain::Village,
        Terrain::Castle,
        Terrain::Keep,
    ];
    ALL.into_iter().find(|t| t.name() == name)
}

impl AspectValue for LocationFilter {
    const TYPE_NAME: &'static str = "location_filter";

    fn from_config(cfg: &Config) -> Option<Self> {
        cfg.child("value").map(LocationFilter::from_filter_config)
    }

    fn write_config(&self, cfg: &mut Config) {
        cfg.add_child("value", self.to_filter_config());
    }

    fn from_variant(variant: &Variant) -> Option<Self> {
        match variant {
            Variant::Config(c) => Some(LocationFilter::from_filter_config(c)),
            Variant::Null => Some(LocationFilter::default()),
            _ => None,
        }
    }

    fn to_variant(&self) -> Variant {
        Variant::Config(self.to_filter_config())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_translators() {
        let cfg = Config::new().with("value", "yes");
        assert_eq!(bool::from_config(&cfg), Some(true));
        let cfg = Config::new().with("value", 0.75);
        assert_eq!(f64::from_config(&cfg), Some(0.75));
        assert_eq!(i64::from_variant(&Variant::Real(3.9)), Some(3));
        assert_eq!(bool::from_variant(&Variant::List(vec![])), None);
    }

    #[test]
    fn test_string_list_translator() {
        let cfg = Config::new().with("value", "Spearman, Bowman");
        let list = Vec::<String>::from_config(&cfg).unwrap();
        assert_eq!(list, vec!["Spearman".to_string(), "Bowman".to_string()]);
        let variant = list.to_variant();
        assert_eq!(Vec::<String>::from_variant(&variant), Some(list));
    }

    #[test]
    fn test_location_filter_matches() {
        let map = GameMap::from_rows(". . s .\n. . . .").unwrap();
        let cfg = Config::new().with("x", "0").with("y", "0").with("terrain", "swamp");
        let filter = LocationFilter::from_filter_config(&cfg);
        assert!(filter.matches(&map, &MapLocation::new(0, 0)));
        assert!(filter.matches(&map, &MapLocation::new(2, 0)));
        assert!(!filter.matches(&map, &MapLocation::new(3, 1)));
        assert_eq!(LocationFilter::from_filter_config(&filter.to_filter_config()), filter);
    }
}
