//! AI manager: one composite AI per computer-controlled side
//!
//! The manager builds every side's AI from the default configuration with
//! the side's overrides on top, forwards turn-start and time-of-day events,
//! plays turns, and routes live `modify_ai` requests. All AIs share one
//! abort handle so a host can stop a turn in progress between rounds.

use std::collections::BTreeMap;
use std::rc::Rc;
use tracing::{debug, info};

use super::aspect::{AspectEvent, AspectValue};
use super::composite::CompositeAi;
use super::context::AbortHandle;
use super::engine::{EngineSet, Interpreter};
use super::path::ModifyRequest;
use crate::config::Config;
use crate::core::config::EngineSettings;
use crate::core::error::{AiError, Result};
use crate::core::types::Side;
use crate::game::actions::GameWorld;
use crate::game::state::GameState;

/// Configuration every side starts from
pub fn default_ai_config() -> Result<Config> {
    Config::from_toml_str(include_str!("../../data/default_ai.toml"))
}

pub struct Manager {
    settings: EngineSettings,
    default_config: Config,
    interpreter: Option<Rc<dyn Interpreter>>,
    ais: BTreeMap<Side, CompositeAi>,
    abort: AbortHandle,
    /// Time of day seen at the last turn start
    last_time_of_day: Option<String>,
}

impl Manager {
    pub fn new(settings: EngineSettings) -> Result<Self> {
        Ok(Self::with_default_config(settings, default_ai_config()?))
    }

    pub fn with_default_config(settings: EngineSettings, default_config: Config) -> Self {
        Self {
            settings,
            default_config,
            interpreter: None,
            ais: BTreeMap::new(),
            abort: AbortHandle::new(),
            last_time_of_day: None,
        }
    }

    /// Make the embedded-script engine available to AIs added afterwards
    pub fn with_interpreter(mut self, interpreter: Rc<dyn Interpreter>) -> Self {
        self.interpreter = Some(interpreter);
        self
    }

    fn engines(&self) -> EngineSet {
        let engines = EngineSet::new(self.settings.clone());
        match &self.interpreter {
            Some(interpreter) => engines.with_interpreter(Rc::clone(interpreter)),
            None => engines,
        }
    }

    /// Build (or rebuild) the AI of `side`: default config, then `overrides`
    pub fn add_ai(&mut self, side: Side, overrides: &Config) {
        let mut ai = CompositeAi::new(side, &self.default_config, self.engines());
        ai.overlay(overrides);
        ai.set_abort_handle(self.abort.clone());
        info!("AI for side {} ready with {} stage(s)", side, ai.tree().stages().len());
        self.ais.insert(side, ai);
    }

    /// Overlay more configuration on a running AI
    pub fn append_ai(&mut self, side: Side, cfg: &Config) -> Result<()> {
        self.ai_mut(side)?.overlay(cfg);
        Ok(())
    }

    pub fn remove_ai(&mut self, side: Side) -> Option<CompositeAi> {
        self.ais.remove(&side)
    }

    pub fn has_ai(&self, side: Side) -> bool {
        self.ais.contains_key(&side)
    }

    pub fn sides(&self) -> impl Iterator<Item = Side> + '_ {
        self.ais.keys().copied()
    }

    pub fn ai(&self, side: Side) -> Result<&CompositeAi> {
        self.ais.get(&side).ok_or_else(|| no_ai(side))
    }

    pub fn ai_mut(&mut self, side: Side) -> Result<&mut CompositeAi> {
        self.ais.get_mut(&side).ok_or_else(|| no_ai(side))
    }

    pub fn abort_handle(&self) -> AbortHandle {
        self.abort.clone()
    }

    /// Tell every AI a new turn began; also reports a time-of-day change
    pub fn on_turn_start(&mut self, state: &GameState) {
        let time_of_day = state.time_of_day().id;
        let tod_changed = self.last_time_of_day.as_deref() != Some(time_of_day.as_str());
        debug!("Turn {} starts ({}, changed: {})", state.turn, time_of_day, tod_changed);
        for ai in self.ais.values_mut() {
            ai.new_turn();
            if tod_changed {
                ai.notify(AspectEvent::TimeOfDayChanged);
            }
        }
        self.last_time_of_day = Some(time_of_day);
    }

    /// Play one side's turn; true when game state changed
    pub fn play_turn(&mut self, side: Side, world: &mut dyn GameWorld) -> Result<bool> {
        self.abort.reset();
        let ai = self.ai_mut(side)?;
        Ok(ai.play_turn(world))
    }

    /// Apply a live reconfiguration request to one side's AI
    pub fn modify_ai(&mut self, side: Side, request: &ModifyRequest) -> Result<()> {
        self.ai_mut(side)?.modify(request)
    }

    /// Apply a `[modify_ai]` block
    pub fn modify_ai_config(&mut self, side: Side, cfg: &Config) -> Result<()> {
        let request = ModifyRequest::from_config(cfg)?;
        self.modify_ai(side, &request)
    }

    /// Configs of the components `path` addresses in one side's AI
    pub fn get(&mut self, side: Side, path: &str) -> Result<Vec<Config>> {
        self.ai_mut(side)?.get(path)
    }

    pub fn aspect_value<T: AspectValue>(&mut self, side: Side, id: &str, state: &GameState) -> Result<T> {
        Ok(self.ai_mut(side)?.aspect_value(id, state))
    }

    pub fn to_config(&self, side: Side) -> Result<Config> {
        Ok(self.ai(side)?.to_config())
    }
}

fn no_ai(side: Side) -> AiError {
    AiError::Config(format!("no AI for side {}", side))
}
