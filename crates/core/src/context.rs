//! Tool Context
//!
//! Per-invocation context handed to every tool. Tools are shared across
//! concurrently running sessions, so anything session-specific (identity,
//! working directory, cancellation) must arrive through this context rather
//! than live inside the tool instance.

use std::path::{Component, Path, PathBuf};

use tokio_util::sync::CancellationToken;

use crate::error::{CoreError, CoreResult};

/// Context for tool-level execution.
///
/// Tools receive a `ToolContext` and cannot mutate session state or control
/// the loop. They can only observe their identity and the cancellation
/// signal.
#[derive(Debug, Clone)]
pub struct ToolContext {
    session_id: String,
    working_dir: PathBuf,
    agent_name: String,
    /// Unique identifier for this specific tool call.
    tool_call_id: String,
    cancellation: CancellationToken,
}

impl ToolContext {
    /// Create a new ToolContext with a fresh (never cancelled) token.
    pub fn new(
        session_id: impl Into<String>,
        working_dir: impl Into<PathBuf>,
        agent_name: impl Into<String>,
        tool_call_id: impl Into<String>,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            working_dir: working_dir.into(),
            agent_name: agent_name.into(),
            tool_call_id: tool_call_id.into(),
            cancellation: CancellationToken::new(),
        }
    }

    /// Attach the session's cancellation token.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    /// Derive a context for another call in the same session.
    pub fn for_call(&self, tool_call_id: impl Into<String>) -> Self {
        Self {
            tool_call_id: tool_call_id.into(),
            ..self.clone()
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    pub fn agent_name(&self) -> &str {
        &self.agent_name
    }

    /// Returns the unique tool call identifier.
    pub fn tool_call_id(&self) -> &str {
        &self.tool_call_id
    }

    /// The cancellation token observed at every suspension point.
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// `Err(CoreError::Cancelled)` once the session has been cancelled.
    /// Long-running tools call this between units of work.
    pub fn check_cancelled(&self) -> CoreResult<()> {
        if self.is_cancelled() {
            return Err(CoreError::cancelled(self.session_id.as_str()));
        }
        Ok(())
    }

    /// Join a tool-supplied relative path onto the working directory.
    ///
    /// Lexical only: absolute paths and `..` components are rejected, the
    /// filesystem is not consulted.
    pub fn resolve_path(&self, relative: impl AsRef<Path>) -> CoreResult<PathBuf> {
        let relative = relative.as_ref();
        let contained = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
        if !contained {
            return Err(CoreError::PathEscape(relative.to_path_buf()));
        }
        Ok(self.working_dir.join(relative))
    }
}
