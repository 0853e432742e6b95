//! devpilot LLM
//!
//! The boundary to the language-model completion service. The core treats
//! the service as an opaque capability: given a message history, produce a
//! stream of text chunks that eventually ends.
//!
//! - `types` - `Message`, `MessageRole`, `LlmError`
//! - `provider` - the `CompletionService` trait
//! - `scripted` - an in-memory service replaying scripted turns

pub mod provider;
pub mod scripted;
pub mod types;

pub use provider::{collect_stream, ChunkStream, CompletionService};
pub use scripted::{ScriptedCompletion, ScriptedTurn};
pub use types::{LlmError, LlmResult, Message, MessageRole};
