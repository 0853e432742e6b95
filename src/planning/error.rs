//! Planning errors.
//!
//! Every variant names a specific cause so callers never see a generic
//! failure from plan construction or selection.

use thiserror::Error;

use super::model::PlanningMode;

/// Plan construction and lifecycle errors.
#[derive(Error, Debug)]
pub enum PlanError {
    #[error("Stage ordinal {0} is already used")]
    DuplicateStageOrdinal(u32),

    #[error("Step ordinal {0} is already used in this plan")]
    DuplicateStepOrdinal(u32),

    #[error("No stage with ordinal {0}")]
    UnknownStage(u32),

    #[error("Step {0} cannot depend on itself")]
    SelfDependency(u32),

    #[error("Step {step} depends on step {missing}, which does not exist")]
    UnresolvedDependency { step: u32, missing: u32 },

    #[error("Dependency cycle among steps {steps:?}")]
    CyclicDependency { steps: Vec<u32> },

    #[error("No ordinal left after {0}")]
    OrdinalExhausted(u32),

    #[error("Step {0} must have a positive token estimate")]
    InvalidTokenEstimate(u32),

    #[error("Cannot move plan from {from} back to {to}")]
    InvalidModeTransition { from: PlanningMode, to: PlanningMode },

    #[error("Failed to persist plan artifact: {0}")]
    Io(#[from] std::io::Error),
}

/// Multi-plan selection errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SelectionError {
    #[error("No candidate plans to select from")]
    EmptyCandidateSet,

    #[error("Too many candidate plans: {count} (at most {max})")]
    TooManyCandidates { count: usize, max: usize },
}
