//! Scalar attribute values of the configuration tree

use serde::{Deserialize, Serialize};
use std::fmt;

/// A single attribute value
///
/// Values are loosely typed: a string "yes" reads as `true`, an integer
/// reads as a float, and everything can be rendered as a string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl AttrValue {
    pub fn to_bool(&self) -> Option<bool> {
        match self {
            AttrValue::Bool(b) => Some(*b),
            AttrValue::Int(i) => Some(*i != 0),
            AttrValue::Float(f) => Some(*f != 0.0),
            AttrValue::Str(s) => match s.trim() {
                "yes" | "true" | "on" => Some(true),
                "no" | "false" | "off" | "" => Some(false),
                _ => None,
            },
        }
    }

    pub fn to_int(&self) -> Option<i64> {
        match self {
            AttrValue::Bool(b) => Some(i64::from(*b)),
            AttrValue::Int(i) => Some(*i),
            AttrValue::Float(f) => Some(f.trunc() as i64),
            AttrValue::Str(s) => {
                let s = s.trim();
                s.parse::<i64>()
                    .ok()
                    .or_else(|| s.parse::<f64>().ok().map(|f| f.trunc() as i64))
            }
        }
    }

    pub fn to_float(&self) -> Option<f64> {
        match self {
            AttrValue::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            AttrValue::Int(i) => Some(*i as f64),
            AttrValue::Float(f) => Some(*f),
            AttrValue::Str(s) => s.trim().parse::<f64>().ok(),
        }
    }

    /// Split a comma-separated list, trimming blanks
    pub fn to_list(&self) -> Vec<String> {
        self.to_string()
            .split(',')
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect()
    }
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttrValue::Bool(b) => write!(f, "{}", if *b { "yes" } else { "no" }),
            AttrValue::Int(i) => write!(f, "{}", i),
            AttrValue::Float(v) => write!(f, "{}", v),
            AttrValue::Str(s) => write!(f, "{}", s),
        }
    }
}

impl From<bool> for AttrValue {
    fn from(v: bool) -> Self {
        AttrValue::Bool(v)
    }
}

impl From<i64> for AttrValue {
    fn from(v: i64) -> Self {
        AttrValue::Int(v)
    }
}

impl From<i32> for AttrValue {
    fn from(v: i32) -> Self {
        AttrValue::Int(i64::from(v))
    }
}

impl From<u32> for AttrValue {
    fn from(v: u32) -> Self {
        AttrValue::Int(i64::from(v))
    }
}

impl From<f64> for AttrValue {
    fn from(v: f64) -> Self {
        AttrValue::Float(v)
    }
}

impl From<&str> for AttrValue {
    fn from(v: &str) -> Self {
        AttrValue::Str(v.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(v: String) -> Self {
        AttrValue::Str(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bool_from_strings() {
        assert_eq!(AttrValue::from("yes").to_bool(), Some(true));
        assert_eq!(AttrValue::from("no").to_bool(), Some(false));
        assert_eq!(AttrValue::from("maybe").to_bool(), None);
        assert_eq!(AttrValue::Int(0).to_bool(), Some(false));
    }

    #[test]
    fn test_numeric_conversions() {
        assert_eq!(AttrValue::from("12").to_int(), Some(12));
        assert_eq!(AttrValue::from("2.5").to_float(), Some(2.5));
        assert_eq!(AttrValue::Float(3.9).to_int(), Some(3));
        assert_eq!(AttrValue::Int(4).to_float(), Some(4.0));
    }

    #[test]
    fn test_list_split() {
        let v = AttrValue::from("Spearman, Bowman,,Cavalryman");
        assert_eq!(v.to_list(), vec!["Spearman", "Bowman", "Cavalryman"]);
    }
}
