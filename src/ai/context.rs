//! Decision context handed to stages and candidate actions
//!
//! Bundles what one side's decision needs for the length of a stage call:
//! the world (read access plus action channel), the side's aspects and
//! goals, the random generator, the recursion counter and the abort flag.

use rand_chacha::ChaCha8Rng;
use std::cell::Cell;
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, error};

use super::aspect::{AspectEvent, AspectSet, AspectValue, AspectView};
use super::goal::Goal;
use super::variant::Variant;
use crate::core::config::EngineSettings;
use crate::core::error::{AiError, Result};
use crate::core::types::Side;
use crate::game::actions::{ActionRequest, ActionResult, GameWorld};
use crate::game::state::GameState;

/// Read-only access to the game from one side's point of view
pub trait ReadGameInfo {
    fn side(&self) -> Side;

    fn state(&self) -> &GameState;
}

/// Ability to apply actions to the game
pub trait IssueActions {
    fn execute_action(&mut self, action: &ActionRequest) -> ActionResult;
}

/// Ability to report how deeply decisions are nested
pub trait ReportRecursion {
    fn recursion_depth(&self) -> u32;
}

/// Depth counter shared by a decision and every decision nested in it
#[derive(Debug, Clone)]
pub struct RecursionCounter {
    depth: Rc<Cell<u32>>,
    max_depth: u32,
}

impl RecursionCounter {
    pub fn new(max_depth: u32) -> Self {
        Self {
            depth: Rc::new(Cell::new(0)),
            max_depth,
        }
    }

    pub fn depth(&self) -> u32 {
        self.depth.get()
    }

    /// Enter one nesting level; the guard leaves it again when dropped
    pub fn enter(&self) -> Result<RecursionGuard> {
        let depth = self.depth.get();
        if depth >= self.max_depth {
            return Err(AiError::RecursionLimit(self.max_depth));
        }
        self.depth.set(depth + 1);
        Ok(RecursionGuard {
            depth: Rc::clone(&self.depth),
        })
    }
}

#[derive(Debug)]
pub struct RecursionGuard {
    depth: Rc<Cell<u32>>,
}

impl Drop for RecursionGuard {
    fn drop(&mut self) {
        self.depth.set(self.depth.get().saturating_sub(1));
    }
}

/// External request to stop the current turn
#[derive(Debug, Clone, Default)]
pub struct AbortHandle(Arc<AtomicBool>);

impl AbortHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn abort(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    pub fn is_aborted(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

pub struct DecisionContext<'a> {
    side: Side,
    world: &'a mut dyn GameWorld,
    aspects: &'a mut AspectSet,
    goals: &'a [Box<Goal>],
    rng: &'a mut ChaCha8Rng,
    settings: &'a EngineSettings,
    recursion: RecursionCounter,
    abort: AbortHandle,
    removals: Vec<String>,
}

impl<'a> DecisionContext<'a> {
    pub fn new(
        side: Side,
        world: &'a mut dyn GameWorld,
        aspects: &'a mut AspectSet,
        goals: &'a [Box<Goal>],
        rng: &'a mut ChaCha8Rng,
        settings: &'a EngineSettings,
    ) -> Self {
        Self {
            side,
            world,
            aspects,
            goals,
            rng,
            settings,
            recursion: RecursionCounter::new(settings.max_recursion_depth),
            abort: AbortHandle::new(),
            removals: Vec::new(),
        }
    }

    pub fn with_recursion(mut self, recursion: RecursionCounter) -> Self {
        self.recursion = recursion;
        self
    }

    pub fn with_abort(mut self, abort: AbortHandle) -> Self {
        self.abort = abort;
        self
    }

    /// Context for a decision nested inside this one, sharing world, random
    /// generator and recursion counter but with its own aspects and goals
    pub fn nested<'b>(&'b mut self, aspects: &'b mut AspectSet, goals: &'b [Box<Goal>]) -> DecisionContext<'b> {
        DecisionContext {
            side: self.side,
            world: &mut *self.world,
            aspects,
            goals,
            rng: &mut *self.rng,
            settings: self.settings,
            recursion: self.recursion.clone(),
            abort: self.abort.clone(),
            removals: Vec::new(),
        }
    }

    pub fn settings(&self) -> &EngineSettings {
        self.settings
    }

    pub fn rng(&mut self) -> &mut ChaCha8Rng {
        self.rng
    }

    /// Read the state while drawing random numbers
    pub fn state_and_rng(&mut self) -> (&GameState, &mut ChaCha8Rng) {
        (self.world.state(), &mut *self.rng)
    }

    pub fn goals(&self) -> &[Box<Goal>] {
        self.goals
    }

    pub fn recursion(&self) -> &RecursionCounter {
        &self.recursion
    }

    pub fn is_aborted(&self) -> bool {
        self.abort.is_aborted()
    }

    /// Typed aspect value for this side
    pub fn aspect<T: AspectValue>(&mut self, id: &str) -> T {
        let view = AspectView::new(self.world.state(), self.side);
        self.aspects.value::<T>(id, &view)
    }

    pub fn aspect_variant(&mut self, id: &str) -> Option<Variant> {
        let view = AspectView::new(self.world.state(), self.side);
        self.aspects.variant(id, &view)
    }

    pub fn aspects_mut(&mut self) -> &mut AspectSet {
        self.aspects
    }

    /// Queue a path delete request, applied once the stage returns
    pub fn request_removal(&mut self, path: String) {
        debug!("Queued removal of {}", path);
        self.removals.push(path);
    }

    pub fn take_removals(&mut self) -> Vec<String> {
        std::mem::take(&mut self.removals)
    }
}

impl ReadGameInfo for DecisionContext<'_> {
    fn side(&self) -> Side {
        self.side
    }

    fn state(&self) -> &GameState {
        self.world.state()
    }
}

impl IssueActions for DecisionContext<'_> {
    /// Apply an action and notify aspects of the state change
    fn execute_action(&mut self, action: &ActionRequest) -> ActionResult {
        let result = self.world.execute(self.side, action);
        match &result.outcome {
            Ok(()) => debug!("Side {} executed {:?}", self.side, action),
            Err(e) => error!("Side {} failed to execute {:?}: {}", self.side, action, e),
        }
        if result.gamestate_changed {
            if action.is_major() {
                self.aspects.on_event(AspectEvent::GamestateChanged);
            }
            self.aspects.on_event(AspectEvent::MinorGamestateChanged);
        }
        result
    }
}

impl ReportRecursion for DecisionContext<'_> {
    fn recursion_depth(&self) -> u32 {
        self.recursion.depth()
    }
}
