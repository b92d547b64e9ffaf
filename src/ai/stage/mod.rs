//! Stages: the ordered phases of one side's turn

pub mod fallback;
pub mod rca;

use super::aspect::AspectEvent;
use super::component::{AsComponent, Component};
use super::context::DecisionContext;

pub use fallback::FallbackStage;
pub use rca::{evaluation_pass, sort_by_max_score, CandidateActionLoop};

pub const CA_LOOP_STAGE: &str = "candidate_action_loop";
pub const FALLBACK_STAGE: &str = "fallback";
pub const SCRIPT_STAGE: &str = "script_stage";

pub trait Stage: Component + AsComponent {
    /// Play this phase; true when game state changed
    fn play_stage(&mut self, ctx: &mut DecisionContext) -> bool;

    fn on_turn_start(&mut self) {}

    /// Aspect events for aspects the stage owns itself
    fn on_aspect_event(&mut self, _event: AspectEvent) {}
}

/// Play stages in order until one is interrupted by an abort
pub fn play_stages(stages: &mut [Box<dyn Stage>], ctx: &mut DecisionContext) -> bool {
    let mut changed = false;
    for stage in stages.iter_mut() {
        if ctx.is_aborted() {
            break;
        }
        changed |= stage.play_stage(ctx);
    }
    changed
}
