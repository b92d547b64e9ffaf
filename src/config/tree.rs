//! Hierarchical configuration tree
//!
//! A node holds named attributes plus an ordered list of tagged children.
//! Every AI component (`[aspect]`, `[stage]`, `[candidate_action]`, `[goal]`,
//! `[engine]`) is described by such a node, and `to_config()` writes the
//! same shape back out.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use super::value::AttrValue;
use crate::core::error::{AiError, Result};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    attributes: BTreeMap<String, AttrValue>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    children: Vec<(String, Config)>,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style attribute setter
    pub fn with(mut self, key: &str, value: impl Into<AttrValue>) -> Self {
        self.set(key, value);
        self
    }

    /// Builder-style child appender
    pub fn with_child(mut self, tag: &str, child: Config) -> Self {
        self.add_child(tag, child);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty() && self.children.is_empty()
    }

    // === ATTRIBUTES ===

    pub fn get(&self, key: &str) -> Option<&AttrValue> {
        self.attributes.get(key)
    }

    pub fn has_attr(&self, key: &str) -> bool {
        self.attributes.contains_key(key)
    }

    pub fn set(&mut self, key: &str, value: impl Into<AttrValue>) {
        self.attributes.insert(key.to_string(), value.into());
    }

    pub fn remove_attr(&mut self, key: &str) -> Option<AttrValue> {
        self.attributes.remove(key)
    }

    pub fn attributes(&self) -> impl Iterator<Item = (&str, &AttrValue)> {
        self.attributes.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Attribute rendered as a string
    pub fn string(&self, key: &str) -> Option<String> {
        self.get(key).map(|v| v.to_string())
    }

    pub fn str_or(&self, key: &str, default: &str) -> String {
        self.string(key).unwrap_or_else(|| default.to_string())
    }

    pub fn int_or(&self, key: &str, default: i64) -> i64 {
        self.get(key).and_then(AttrValue::to_int).unwrap_or(default)
    }

    pub fn float_or(&self, key: &str, default: f64) -> f64 {
        self.get(key).and_then(AttrValue::to_float).unwrap_or(default)
    }

    pub fn bool_or(&self, key: &str, default: bool) -> bool {
        self.get(key).and_then(AttrValue::to_bool).unwrap_or(default)
    }

    /// Comma-separated list attribute (empty when absent)
    pub fn list(&self, key: &str) -> Vec<String> {
        self.get(key).map(AttrValue::to_list).unwrap_or_default()
    }

    // === CHILDREN ===

    pub fn child(&self, tag: &str) -> Option<&Config> {
        self.children.iter().find(|(t, _)| t == tag).map(|(_, c)| c)
    }

    pub fn child_mut(&mut self, tag: &str) -> Option<&mut Config> {
        self.children
            .iter_mut()
            .find(|(t, _)| t == tag)
            .map(|(_, c)| c)
    }

    pub fn has_child(&self, tag: &str) -> bool {
        self.child(tag).is_some()
    }

    pub fn children<'a>(&'a self, tag: &'a str) -> impl Iterator<Item = &'a Config> + 'a {
        self.children
            .iter()
            .filter(move |(t, _)| t == tag)
            .map(|(_, c)| c)
    }

    pub fn child_count(&self, tag: &str) -> usize {
        self.children.iter().filter(|(t, _)| t == tag).count()
    }

    pub fn all_children(&self) -> impl Iterator<Item = (&str, &Config)> {
        self.children.iter().map(|(t, c)| (t.as_str(), c))
    }

    pub fn add_child(&mut self, tag: &str, child: Config) -> &mut Config {
        self.children.push((tag.to_string(), child));
        let last = self.children.len() - 1;
        &mut self.children[last].1
    }

    /// Insert a child before the `index`-th child with the same tag
    /// (appends when `index` is past the end)
    pub fn add_child_at(&mut self, tag: &str, child: Config, index: usize) {
        let slot = self
            .children
            .iter()
            .enumerate()
            .filter(|(_, (t, _))| t == tag)
            .nth(index)
            .map(|(i, _)| i);
        match slot {
            Some(i) => self.children.insert(i, (tag.to_string(), child)),
            None => self.children.push((tag.to_string(), child)),
        }
    }

    pub fn clear_children(&mut self, tag: &str) {
        self.children.retain(|(t, _)| t != tag);
    }

    /// Merge attributes (overriding) and append children of `other`
    pub fn append(&mut self, other: &Config) {
        for (k, v) in &other.attributes {
            self.attributes.insert(k.clone(), v.clone());
        }
        self.children.extend(other.children.iter().cloned());
    }

    // === TOML ===

    /// Parse a TOML document into a tree
    ///
    /// Tables become child tags, arrays of tables become repeated children
    /// (keeping their order), scalars become attributes and arrays of
    /// scalars become comma-joined attributes.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let value: toml::Value = content.parse()?;
        match value {
            toml::Value::Table(table) => Ok(Self::from_toml_table(&table)),
            _ => Err(AiError::Config("TOML root must be a table".into())),
        }
    }

    pub fn from_toml_table(table: &toml::value::Table) -> Self {
        let mut cfg = Config::new();
        for (key, value) in table {
            match value {
                toml::Value::Table(t) => {
                    cfg.add_child(key, Self::from_toml_table(t));
                }
                toml::Value::Array(items) if !items.is_empty() && items.iter().all(|i| i.is_table()) => {
                    for item in items {
                        if let toml::Value::Table(t) = item {
                            cfg.add_child(key, Self::from_toml_table(t));
                        }
                    }
                }
                toml::Value::Array(items) => {
                    let joined: Vec<String> = items.iter().map(scalar_to_string).collect();
                    cfg.set(key, joined.join(","));
                }
                toml::Value::String(s) => cfg.set(key, s.as_str()),
                toml::Value::Integer(i) => cfg.set(key, *i),
                toml::Value::Float(f) => cfg.set(key, *f),
                toml::Value::Boolean(b) => cfg.set(key, *b),
                toml::Value::Datetime(d) => cfg.set(key, d.to_string()),
            }
        }
        cfg
    }

    /// Render back to a TOML table (children grouped per tag into arrays)
    pub fn to_toml_table(&self) -> toml::value::Table {
        let mut table = toml::value::Table::new();
        for (k, v) in &self.attributes {
            let value = match v {
                AttrValue::Bool(b) => toml::Value::Boolean(*b),
                AttrValue::Int(i) => toml::Value::Integer(*i),
                AttrValue::Float(f) => toml::Value::Float(*f),
                AttrValue::Str(s) => toml::Value::String(s.clone()),
            };
            table.insert(k.clone(), value);
        }
        for (tag, child) in &self.children {
            let entry = table
                .entry(tag.clone())
                .or_insert_with(|| toml::Value::Array(Vec::new()));
            if let toml::Value::Array(items) = entry {
                items.push(toml::Value::Table(child.to_toml_table()));
            }
        }
        table
    }

    fn write_indented(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        let pad = "    ".repeat(depth);
        for (k, v) in &self.attributes {
            writeln!(f, "{}{}=\"{}\"", pad, k, v)?;
        }
        for (tag, child) in &self.children {
            writeln!(f, "{}[{}]", pad, tag)?;
            child.write_indented(f, depth + 1)?;
            writeln!(f, "{}[/{}]", pad, tag)?;
        }
        Ok(())
    }
}

fn scalar_to_string(value: &toml::Value) -> String {
    match value {
        toml::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_indented(f, 0)
    }
}
