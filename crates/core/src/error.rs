//! Core Error Types
//!
//! Errors a tool implementation hits while working inside a session:
//! filesystem access, payload encoding, paths that escape the session's
//! working directory, and cancellation. Domain crates keep their own enums
//! (registry, planning, selection); this one only travels between a tool and
//! its `ToolContext`.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON payload could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A relative path resolved outside the working directory
    #[error("Path escapes working directory: {}", .0.display())]
    PathEscape(PathBuf),

    /// The session's cancellation token fired
    #[error("Session {session_id} cancelled")]
    Cancelled { session_id: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type CoreResult<T> = Result<T, CoreError>;

impl CoreError {
    pub fn cancelled(session_id: impl Into<String>) -> Self {
        Self::Cancelled {
            session_id: session_id.into(),
        }
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}
