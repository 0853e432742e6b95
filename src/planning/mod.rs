//! Planning
//!
//! Plan/stage/step model, confidence ratings, clarifying questions, and
//! multi-plan generation with deterministic selection.

pub mod alternatives;
mod artifact;
pub mod clarification;
pub mod confidence;
pub mod error;
pub mod generator;
pub mod model;
pub mod selector;

pub use alternatives::{
    AlternativePlan, MultiPlanResult, OutcomeProbabilities, PlanStrategy, DEFAULT_QUALITY,
    DEFAULT_TIME_OVERRUN,
};
pub use clarification::{ClarificationResponse, ClarifyingQuestion};
pub use confidence::{ConfidenceLevel, ConfidenceRating};
pub use error::{PlanError, SelectionError};
pub use generator::{CandidateSource, HeuristicCandidateSource, MultiPlanGenerator, TaskDimensions};
pub use model::{
    CheckpointKind, ExecutionBatch, ExecutionPlan, ExecutionStrategy, PlanDraft, PlanningMode,
    Stage, Step, StepPriority, StepSpec, DEFAULT_STEP_TOKENS,
};
pub use selector::{select, MAX_CANDIDATES};
