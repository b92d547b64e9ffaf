//! The component interface shared by every node of the decision tree
//!
//! Aspects, stages, candidate actions, goals and the AI root all implement
//! `Component` so the path protocol can walk and mutate them uniformly.

use super::engine::EngineSet;
use super::path::{PathElement, Selector};
use crate::config::Config;
use crate::core::error::{AiError, Result};

pub trait Component {
    fn id(&self) -> &str;

    /// Implementation key (`candidate_action_loop`, `combat`, ...)
    fn name(&self) -> &str;

    /// Backend that built this component
    fn engine(&self) -> &str;

    fn get_child(&mut self, _element: &PathElement) -> Option<&mut dyn Component> {
        None
    }

    fn add_child(&mut self, element: &PathElement, _cfg: &Config, _engines: &EngineSet) -> Result<()> {
        Err(no_children(self.id(), element))
    }

    /// Replace matching children; the replacement keeps the old id when its
    /// config has none. Adds when nothing matches.
    fn change_child(&mut self, element: &PathElement, _cfg: &Config, _engines: &EngineSet) -> Result<()> {
        Err(no_children(self.id(), element))
    }

    fn delete_child(&mut self, element: &PathElement) -> Result<()> {
        Err(no_children(self.id(), element))
    }

    /// Configs of the children `element` addresses
    fn child_configs(&self, _element: &PathElement) -> Vec<Config> {
        Vec::new()
    }

    fn to_config(&self) -> Config;
}

/// Upcast helper so trait objects of sub-traits can be handed out as
/// `&mut dyn Component`
pub trait AsComponent {
    fn as_component_mut(&mut self) -> &mut dyn Component;
    fn as_component(&self) -> &dyn Component;
}

impl<T: Component> AsComponent for T {
    fn as_component_mut(&mut self) -> &mut dyn Component {
        self
    }

    fn as_component(&self) -> &dyn Component {
        self
    }
}

pub(crate) fn no_children(id: &str, element: &PathElement) -> AiError {
    AiError::InvalidPath {
        path: element.to_string(),
        reason: format!("component '{}' has no children of that kind", id),
    }
}

pub(crate) fn not_found(element: &PathElement) -> AiError {
    AiError::PathNotFound(element.to_string())
}

/// Insertion index for an add request (position or append)
pub(crate) fn insertion_index(element: &PathElement, len: usize) -> usize {
    match element.selector() {
        Selector::Index(p) => p.min(len),
        _ => len,
    }
}

/// Remove the children a delete request addresses
pub(crate) fn delete_matching<C: AsComponent + ?Sized>(items: &mut Vec<Box<C>>, element: &PathElement) -> Result<()> {
    if element.selector() == Selector::Unspecified {
        return Err(AiError::InvalidPath {
            path: element.to_string(),
            reason: "delete needs an id, an index or '*'".into(),
        });
    }
    let mut indices = element.matches(items.iter().map(|c| c.as_component().id()));
    if indices.is_empty() {
        return Err(not_found(element));
    }
    indices.sort_unstable();
    for index in indices.into_iter().rev() {
        items.remove(index);
    }
    Ok(())
}

/// Replace addressed children by freshly built ones, or append when nothing
/// matches. `build` gets the config to construct from.
pub(crate) fn change_matching<C: AsComponent + ?Sized>(
    items: &mut Vec<Box<C>>,
    element: &PathElement,
    cfg: &Config,
    mut build: impl FnMut(&Config) -> Vec<Box<C>>,
) -> Result<()> {
    let indices = element.matches(items.iter().map(|c| c.as_component().id()));
    let Some(&first) = indices.first() else {
        items.extend(build(cfg));
        return Ok(());
    };
    let old_id = items[first].as_component().id().to_string();
    let mut replacement_cfg = cfg.clone();
    if !replacement_cfg.has_attr("id") {
        replacement_cfg.set("id", old_id.as_str());
    }
    let replacements = build(&replacement_cfg);
    if replacements.is_empty() {
        return Err(AiError::Config(format!("could not build replacement for '{}'", old_id)));
    }
    for index in indices.into_iter().rev() {
        items.remove(index);
    }
    let at = first.min(items.len());
    for (offset, item) in replacements.into_iter().enumerate() {
        items.insert(at + offset, item);
    }
    Ok(())
}

/// First child a segment addresses, for walking into it
pub(crate) fn child_mut<'a, C: AsComponent + ?Sized>(
    items: &'a mut [Box<C>],
    element: &PathElement,
) -> Option<&'a mut dyn Component> {
    let index = *element.matches(items.iter().map(|c| c.as_component().id())).first()?;
    Some(items[index].as_component_mut())
}

pub(crate) fn configs_of<C: AsComponent + ?Sized>(items: &[Box<C>], element: &PathElement) -> Vec<Config> {
    let indices = match element.selector() {
        Selector::Unspecified => (0..items.len()).collect(),
        _ => element.matches(items.iter().map(|c| c.as_component().id())),
    };
    indices.into_iter().map(|i| items[i].as_component().to_config()).collect()
}
