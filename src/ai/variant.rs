//! Dynamically typed values
//!
//! `Variant` is the generic representation of an aspect value and the value
//! type of the formula language. It converts to and from JSON so scripted
//! rules and formula action constructors can hand over action requests.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::config::{AttrValue, Config};

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Variant {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Real(f64),
    Str(String),
    List(Vec<Variant>),
    Map(BTreeMap<String, Variant>),
    Config(Config),
}

impl Variant {
    pub fn type_name(&self) -> &'static str {
        match self {
            Variant::Null => "null",
            Variant::Bool(_) => "bool",
            Variant::Int(_) => "int",
            Variant::Real(_) => "real",
            Variant::Str(_) => "string",
            Variant::List(_) => "list",
            Variant::Map(_) => "map",
            Variant::Config(_) => "config",
        }
    }

    /// Truthiness: null, false, zero, empty string and empty list are false
    pub fn as_bool(&self) -> bool {
        match self {
            Variant::Null => false,
            Variant::Bool(b) => *b,
            Variant::Int(i) => *i != 0,
            Variant::Real(r) => *r != 0.0,
            Variant::Str(s) => !s.is_empty(),
            Variant::List(l) => !l.is_empty(),
            Variant::Map(m) => !m.is_empty(),
            Variant::Config(c) => !c.is_empty(),
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Variant::Int(i) => Some(*i),
            Variant::Real(r) => Some(*r as i64),
            Variant::Bool(b) => Some(*b as i64),
            Variant::Str(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_real(&self) -> Option<f64> {
        match self {
            Variant::Int(i) => Some(*i as f64),
            Variant::Real(r) => Some(*r),
            Variant::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Variant::Str(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Variant::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Variant::Null)
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Variant::Null => serde_json::Value::Null,
            Variant::Bool(b) => serde_json::Value::Bool(*b),
            Variant::Int(i) => serde_json::Value::from(*i),
            Variant::Real(r) => serde_json::Value::from(*r),
            Variant::Str(s) => serde_json::Value::String(s.clone()),
            Variant::List(items) => serde_json::Value::Array(items.iter().map(Variant::to_json).collect()),
            Variant::Map(map) => serde_json::Value::Object(map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect()),
            Variant::Config(cfg) => serde_json::to_value(cfg).unwrap_or(serde_json::Value::Null),
        }
    }

    pub fn from_json(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Variant::Null,
            serde_json::Value::Bool(b) => Variant::Bool(*b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Variant::Int(i),
                None => Variant::Real(n.as_f64().unwrap_or(0.0)),
            },
            serde_json::Value::String(s) => Variant::Str(s.clone()),
            serde_json::Value::Array(items) => Variant::List(items.iter().map(Variant::from_json).collect()),
            serde_json::Value::Object(map) => {
                Variant::Map(map.iter().map(|(k, v)| (k.clone(), Variant::from_json(v))).collect())
            }
        }
    }
}

impl From<&AttrValue> for Variant {
    fn from(value: &AttrValue) -> Self {
        match value {
            AttrValue::Bool(b) => Variant::Bool(*b),
            AttrValue::Int(i) => Variant::Int(*i),
            AttrValue::Float(f) => Variant::Real(*f),
            AttrValue::Str(s) => Variant::Str(s.clone()),
        }
    }
}

impl From<bool> for Variant {
    fn from(value: bool) -> Self {
        Variant::Bool(value)
    }
}

impl From<i64> for Variant {
    fn from(value: i64) -> Self {
        Variant::Int(value)
    }
}

impl From<f64> for Variant {
    fn from(value: f64) -> Self {
        Variant::Real(value)
    }
}

impl From<&str> for Variant {
    fn from(value: &str) -> Self {
        Variant::Str(value.to_string())
    }
}

impl From<String> for Variant {
    fn from(value: String) -> Self {
        Variant::Str(value)
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Variant::Null => write!(f, "null"),
            Variant::Bool(b) => write!(f, "{}", b),
            Variant::Int(i) => write!(f, "{}", i),
            Variant::Real(r) => write!(f, "{}", r),
            Variant::Str(s) => write!(f, "'{}'", s),
            Variant::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Variant::Map(map) => {
                write!(f, "[")?;
                for (i, (k, v)) in map.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{} -> {}", k, v)?;
                }
                write!(f, "]")
            }
            Variant::Config(cfg) => write!(f, "{}", cfg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truthiness() {
        assert!(!Variant::Null.as_bool());
        assert!(!Variant::Int(0).as_bool());
        assert!(Variant::Real(0.5).as_bool());
        assert!(!Variant::Str(String::new()).as_bool());
        assert!(Variant::List(vec![Variant::Null]).as_bool());
    }

    #[test]
    fn test_numeric_conversions() {
        assert_eq!(Variant::Str(" 7 ".into()).as_int(), Some(7));
        assert_eq!(Variant::Int(3).as_real(), Some(3.0));
        assert_eq!(Variant::List(vec![]).as_real(), None);
    }

    #[test]
    fn test_json_map_keeps_structure() {
        let mut map = BTreeMap::new();
        map.insert("action".to_string(), Variant::from("recruit"));
        map.insert("unit_type".to_string(), Variant::from("Spearman"));
        let json = Variant::Map(map.clone()).to_json();
        assert_eq!(json["action"], "recruit");
        assert_eq!(Variant::from_json(&json), Variant::Map(map));
    }
}
