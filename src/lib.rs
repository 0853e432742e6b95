//! devpilot - Coding-Assistant Orchestration Core
//!
//! This library drives an autonomous coding assistant. It includes:
//! - Structured plans (stages, steps, confidence, clarifications) and
//!   multi-plan generation with deterministic selection
//! - Intent routing between up-front planning and direct execution
//! - A turn-bounded ReAct loop over a guarded tool executor
//! - Agent configuration and logging setup
//!
//! Tools, safety classification and the executor live in `devpilot_tools`;
//! the completion-service boundary lives in `devpilot_llm`.

pub mod config;
pub mod error;
pub mod logging;
pub mod orchestrator;
pub mod planning;
pub mod react;
pub mod routing;

pub use config::{AgentConfig, ConfigError, SafetyConfig};
pub use error::{OrchestratorError, OrchestratorResult};
pub use orchestrator::{Handled, Orchestrator};
pub use planning::{
    select, AlternativePlan, ExecutionPlan, MultiPlanGenerator, MultiPlanResult,
    OutcomeProbabilities, PlanDraft, PlanError, PlanStrategy, SelectionError,
};
pub use react::{LoopOutcome, LoopSettings, LoopState, LoopStatus, ReActLoop, ToolCallRecord};
pub use routing::{IntentRouter, Route};

// Workspace crates
pub use devpilot_core::{StreamEvent, Tool, ToolContext, ToolDescriptor};
pub use devpilot_llm::{CompletionService, Message, MessageRole};
pub use devpilot_tools::{
    builtin_tools, register_builtin_tools, SafetyClassifier, SafetyTier, ToolExecutor, ToolRegistry,
    ToolResult,
};
