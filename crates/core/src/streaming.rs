//! Stream Event Types
//!
//! Events a running loop pushes to its caller over an `mpsc` channel. Text
//! chunks are forwarded in arrival order, at most once each; tool activity
//! and confirmation requests are interleaved between turns; a stream always
//! ends with either `Complete` or `Error`.

use serde::{Deserialize, Serialize};

/// Event delivered to a streaming consumer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// Text chunk from the completion service
    TextDelta { content: String },

    /// A new model turn has started (1-based)
    TurnStart { turn: usize },

    /// A tool call directive was parsed and is about to run
    ToolStart {
        tool_id: String,
        tool_name: String,
        /// JSON-serialized arguments
        arguments: String,
    },

    /// Tool execution finished
    ToolResult {
        tool_id: String,
        tool_name: String,
        success: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        output: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },

    /// The executor needs human approval before running a command
    ConfirmationRequest {
        /// Unique identifier for this approval request
        request_id: String,
        session_id: String,
        tool_name: String,
        /// Human-readable description of what will run
        description: String,
        /// Safety tier label: "safe", "needs_confirmation" or "dangerous"
        tier: String,
    },

    /// Terminal error marker
    Error {
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        code: Option<String>,
    },

    /// Stream complete
    Complete {
        #[serde(skip_serializing_if = "Option::is_none")]
        stop_reason: Option<String>,
    },
}

impl StreamEvent {
    pub fn text(content: impl Into<String>) -> Self {
        Self::TextDelta {
            content: content.into(),
        }
    }

    pub fn error(message: impl Into<String>, code: Option<&str>) -> Self {
        Self::Error {
            message: message.into(),
            code: code.map(str::to_string),
        }
    }

    /// Whether this event ends the stream.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Error { .. } | Self::Complete { .. })
    }
}
