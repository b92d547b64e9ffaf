//! Composite rule-based AI
//!
//! A side's AI is a tree of components built from configuration:
//! - Aspects: cached, tunable decision parameters
//! - Stages: the ordered phases of a turn
//! - Candidate actions: scored, executable behaviors arbitrated by the
//!   candidate-action loop
//! - Goals: sources of movement targets
//!
//! Engines (native, formula, embedded-script) turn config into components,
//! and component paths let a running tree be reconfigured in place.

pub mod aspect;
pub mod ca;
pub mod candidate_action;
pub mod component;
pub mod composite;
pub mod context;
pub mod engine;
pub mod goal;
pub mod manager;
pub mod path;
pub mod recruitment;
pub mod stage;
pub mod variant;

// Re-exports for convenient access
pub use aspect::{AspectEvent, AspectSet, AspectValue, AspectView, LocationFilter};
pub use candidate_action::{CaBehavior, CaInfo, CandidateAction, BAD_SCORE, HIGH_SCORE};
pub use component::Component;
pub use composite::{AiTree, CompositeAi};
pub use context::{AbortHandle, DecisionContext, IssueActions, ReadGameInfo};
pub use engine::{Engine, EngineSet, FormulaEngine, Interpreter, NativeEngine, ScriptEngine, ScriptHost};
pub use goal::{Goal, Target, TargetKind};
pub use manager::{default_ai_config, Manager};
pub use path::{ModifyRequest, PathAction};
pub use recruitment::{RecruitDecision, RecruitMode, Recruitment};
pub use stage::{CandidateActionLoop, FallbackStage, Stage};
pub use variant::Variant;
