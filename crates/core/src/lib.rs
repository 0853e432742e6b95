//! devpilot Core
//!
//! Foundational types shared by every crate in the devpilot workspace. This
//! crate has no dependencies on other workspace crates.
//!
//! ## Module Organization
//!
//! - `error` - Core error types (`CoreError`, `CoreResult`)
//! - `context` - Per-call tool context (`ToolContext`) carrying session identity and cancellation
//! - `tool_trait` - Tool descriptor, parameter schema and the `Tool` trait
//! - `streaming` - Events streamed from a running loop to its caller

pub mod context;
pub mod error;
pub mod streaming;
pub mod tool_trait;

// ── Error Types ────────────────────────────────────────────────────────
pub use error::{CoreError, CoreResult};

// ── Context ────────────────────────────────────────────────────────────
pub use context::ToolContext;

// ── Tool Trait ─────────────────────────────────────────────────────────
pub use tool_trait::{ParamType, Tool, ToolCategory, ToolDescriptor, ToolFailure, ToolParam};

// ── Streaming Types ────────────────────────────────────────────────────
pub use streaming::StreamEvent;
