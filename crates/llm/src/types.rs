//! LLM Types
//!
//! Message and error types for completion-service interactions.

use serde::{Deserialize, Serialize};

/// Message role in a conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
    /// Synthetic message carrying a tool's output back to the model
    Tool,
}

impl std::fmt::Display for MessageRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessageRole::System => write!(f, "system"),
            MessageRole::User => write!(f, "user"),
            MessageRole::Assistant => write!(f, "assistant"),
            MessageRole::Tool => write!(f, "tool"),
        }
    }
}

/// A message in the conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
}

impl Message {
    /// Create a simple text message
    pub fn text(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::text(MessageRole::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::text(MessageRole::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::text(MessageRole::Assistant, content)
    }

    /// Create a tool output message
    pub fn tool(content: impl Into<String>) -> Self {
        Self::text(MessageRole::Tool, content)
    }
}

/// Error types for completion-service operations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LlmError {
    /// The stream broke off after it started
    StreamFailed { message: String },
    /// Network/connection error before any chunk arrived
    NetworkError { message: String },
    /// Invalid request (bad parameters, empty history)
    InvalidRequest { message: String },
    /// Other error
    Other { message: String },
}

impl LlmError {
    pub fn stream_failed(message: impl Into<String>) -> Self {
        Self::StreamFailed {
            message: message.into(),
        }
    }
}

impl std::fmt::Display for LlmError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LlmError::StreamFailed { message } => write!(f, "Stream failed: {}", message),
            LlmError::NetworkError { message } => write!(f, "Network error: {}", message),
            LlmError::InvalidRequest { message } => write!(f, "Invalid request: {}", message),
            LlmError::Other { message } => write!(f, "Error: {}", message),
        }
    }
}

impl std::error::Error for LlmError {}

/// Result type for completion-service operations
pub type LlmResult<T> = Result<T, LlmError>;
