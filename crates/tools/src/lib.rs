//! devpilot Tools
//!
//! Everything between a parsed tool-call directive and a `ToolResult`:
//! - `ToolRegistry` - name-addressed catalog with schema-validated invocation
//! - `FunctionTool` - closure-based tool creation
//! - `SafetyClassifier` - risk tier of a raw command string
//! - `ConfirmationHandler` - approval callbacks (auto, deny, channel-backed)
//! - `ToolExecutor` - safety gate, confirmation, bounded retry with fallback
//! - `parse_directive` - the `TOOL: name(key=value, ...)` wire syntax
//! - `builtin` - file, search, git and shell tools for a working directory
//!
//! Tools themselves implement `devpilot_core::Tool`.

pub mod builtin;
pub mod confirmation;
pub mod directive;
pub mod executor;
pub mod registry;
pub mod safety;

pub use builtin::{builtin_tools, register_builtin_tools};
pub use confirmation::{
    AutoConfirm, ChannelConfirmation, ConfirmationHandler, ConfirmationRequest, DenyAll,
};
pub use directive::{build_directive_instructions, parse_directive, ToolDirective};
pub use executor::{
    ArgumentFallback, AttemptOutcome, ExecutionAttempt, ExecutorSettings, ToolExecution,
    ToolExecutor, DEFAULT_MAX_ATTEMPTS,
};
pub use registry::{FunctionTool, RegistryError, ToolRegistry, ToolResult};
pub use safety::{SafetyClassifier, SafetyTier};
