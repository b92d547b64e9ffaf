//! Component paths and the live reconfiguration protocol
//!
//! A path such as `stage['main_loop'].candidate_action['combat']` addresses
//! a node of the live decision tree. All segments but the last are walked
//! with `Component::get_child`; the last one is handed to the verb (add,
//! change, delete, get) on the component it belongs to.

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, error};

use super::component::Component;
use super::engine::EngineSet;
use crate::config::Config;
use crate::core::error::{AiError, Result};

/// Wildcard id matching every child
pub const WILDCARD: &str = "*";

/// One segment of a component path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathElement {
    pub property: String,
    pub id: Option<String>,
    pub position: Option<usize>,
}

/// Which children of a property a segment addresses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selector<'a> {
    /// Bare property, no brackets
    Unspecified,
    All,
    Id(&'a str),
    Index(usize),
}

impl PathElement {
    pub fn new(property: &str) -> Self {
        Self {
            property: property.to_string(),
            id: None,
            position: None,
        }
    }

    pub fn with_id(property: &str, id: &str) -> Self {
        Self {
            property: property.to_string(),
            id: Some(id.to_string()),
            position: None,
        }
    }

    pub fn with_position(property: &str, position: usize) -> Self {
        Self {
            property: property.to_string(),
            id: None,
            position: Some(position),
        }
    }

    pub fn selector(&self) -> Selector<'_> {
        match (&self.id, self.position) {
            (Some(id), _) if id == WILDCARD => Selector::All,
            (Some(id), _) => Selector::Id(id),
            (None, Some(p)) => Selector::Index(p),
            (None, None) => Selector::Unspecified,
        }
    }

    /// Indices of the items this segment matches, given their ids
    pub fn matches<'a>(&self, ids: impl Iterator<Item = &'a str>) -> Vec<usize> {
        let ids: Vec<&str> = ids.collect();
        match self.selector() {
            Selector::All => (0..ids.len()).collect(),
            Selector::Id(id) => ids.iter().enumerate().filter(|(_, i)| **i == id).map(|(n, _)| n).collect(),
            Selector::Index(p) if p < ids.len() => vec![p],
            Selector::Index(_) | Selector::Unspecified => Vec::new(),
        }
    }
}

impl fmt::Display for PathElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.id, self.position) {
            (Some(id), _) => write!(f, "{}['{}']", self.property, id),
            (None, Some(p)) => write!(f, "{}[{}]", self.property, p),
            (None, None) => write!(f, "{}", self.property),
        }
    }
}

fn invalid(path: &str, reason: impl Into<String>) -> AiError {
    AiError::InvalidPath {
        path: path.to_string(),
        reason: reason.into(),
    }
}

/// Parse `prop['id'].prop[3].prop` into segments
pub fn parse_path(path: &str) -> Result<Vec<PathElement>> {
    let mut elements = Vec::new();
    let mut chars = path.trim().chars().peekable();

    loop {
        let mut property = String::new();
        while let Some(&c) = chars.peek() {
            if c.is_alphanumeric() || c == '_' {
                property.push(c);
                chars.next();
            } else {
                break;
            }
        }
        if property.is_empty() {
            return Err(invalid(path, "empty property name"));
        }
        let mut element = PathElement::new(&property);

        if chars.peek() == Some(&'[') {
            chars.next();
            match chars.peek() {
                Some(&quote) if quote == '\'' || quote == '"' => {
                    chars.next();
                    let mut id = String::new();
                    loop {
                        match chars.next() {
                            Some(c) if c == quote => break,
                            Some(c) => id.push(c),
                            None => return Err(invalid(path, "unterminated id")),
                        }
                    }
                    element.id = Some(id);
                }
                _ => {
                    let mut digits = String::new();
                    while let Some(&c) = chars.peek() {
                        if c == ']' {
                            break;
                        }
                        digits.push(c);
                        chars.next();
                    }
                    let digits = digits.trim();
                    if digits == WILDCARD {
                        element.id = Some(WILDCARD.to_string());
                    } else {
                        let position = digits
                            .parse::<usize>()
                            .map_err(|_| invalid(path, format!("bad index '{}'", digits)))?;
                        element.position = Some(position);
                    }
                }
            }
            if chars.next() != Some(']') {
                return Err(invalid(path, "expected ']'"));
            }
        }
        elements.push(element);

        match chars.next() {
            None => break,
            Some('.') => continue,
            Some(c) => return Err(invalid(path, format!("unexpected '{}'", c))),
        }
    }
    Ok(elements)
}

/// Verbs of the reconfiguration protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PathAction {
    Add,
    Change,
    Delete,
    /// Like delete, but a missing target is not an error
    TryDelete,
}

impl PathAction {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "add" => Some(Self::Add),
            "change" => Some(Self::Change),
            "delete" => Some(Self::Delete),
            "try_delete" => Some(Self::TryDelete),
            _ => None,
        }
    }
}

/// A live reconfiguration request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModifyRequest {
    pub path: String,
    pub action: PathAction,
    #[serde(default)]
    pub cfg: Option<Config>,
}

impl ModifyRequest {
    pub fn delete(path: &str) -> Self {
        Self {
            path: path.to_string(),
            action: PathAction::Delete,
            cfg: None,
        }
    }

    /// Read a `[modify_ai] path= action= [cfg]...` block
    pub fn from_config(cfg: &Config) -> Result<Self> {
        let path = cfg
            .string("path")
            .ok_or_else(|| AiError::Config("[modify_ai] without path".into()))?;
        let action_name = cfg.str_or("action", "");
        let action = PathAction::parse(&action_name)
            .ok_or_else(|| AiError::Config(format!("[modify_ai] unknown action '{}'", action_name)))?;
        let body = cfg
            .all_children()
            .find(|(tag, _)| *tag != "filter")
            .map(|(_, child)| child.clone());
        Ok(Self { path, action, cfg: body })
    }
}

/// Walk every segment but the last
fn resolve_parent<'a>(root: &'a mut dyn Component, path: &str, elements: &[PathElement]) -> Result<&'a mut dyn Component> {
    let mut current = root;
    for element in &elements[..elements.len().saturating_sub(1)] {
        current = current
            .get_child(element)
            .ok_or_else(|| AiError::PathNotFound(format!("{} (at {})", path, element)))?;
    }
    Ok(current)
}

/// Apply a mutation verb to the tree rooted at `root`
pub fn apply(
    root: &mut dyn Component,
    request: &ModifyRequest,
    engines: &EngineSet,
) -> Result<()> {
    let elements = parse_path(&request.path)?;
    let tail = elements.last().cloned().ok_or_else(|| invalid(&request.path, "empty path"))?;
    let parent = match resolve_parent(root, &request.path, &elements) {
        Ok(parent) => parent,
        Err(e) if request.action == PathAction::TryDelete => {
            debug!("try_delete on missing path {}: {}", request.path, e);
            return Ok(());
        }
        Err(e) => return Err(e),
    };
    let empty = Config::new();
    let cfg = request.cfg.as_ref().unwrap_or(&empty);

    debug!("modify_ai {:?} {}", request.action, request.path);
    match request.action {
        PathAction::Add => parent.add_child(&tail, cfg, engines),
        PathAction::Change => parent.change_child(&tail, cfg, engines),
        PathAction::Delete => parent.delete_child(&tail),
        PathAction::TryDelete => match parent.delete_child(&tail) {
            Err(AiError::PathNotFound(_)) => Ok(()),
            other => other,
        },
    }
}

/// Apply and log instead of propagating; configuration errors never abort a turn
pub fn apply_logged(root: &mut dyn Component, request: &ModifyRequest, engines: &EngineSet) -> bool {
    match apply(root, request, engines) {
        Ok(()) => true,
        Err(e) => {
            error!("modify_ai {:?} '{}' failed: {}", request.action, request.path, e);
            false
        }
    }
}

/// Read-only lookup: configs of every node the path addresses
pub fn get(root: &mut dyn Component, path: &str) -> Result<Vec<Config>> {
    let elements = parse_path(path)?;
    let tail = elements.last().cloned().ok_or_else(|| invalid(path, "empty path"))?;
    let parent = resolve_parent(root, path, &elements)?;
    let found = parent.child_configs(&tail);
    if found.is_empty() {
        return Err(AiError::PathNotFound(path.to_string()));
    }
    Ok(found)
}
