//! Tool Trait
//!
//! Defines the tool abstraction shared by the registry and every tool
//! implementation:
//!
//! - `ToolDescriptor` - Identity, description, declared parameter schema, category
//! - `ToolParam` / `ParamType` - One declared parameter and its type tag
//! - `Tool` - Descriptor access plus async execution
//! - `ToolFailure` - The environmental failure a tool raises
//!
//! Descriptors are plain data assembled by field assignment; the registry
//! owns validation of call arguments against them.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::context::ToolContext;
use crate::error::CoreError;

// ============================================================================
// Parameter Schema
// ============================================================================

/// Type tag of a declared tool parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    String,
    /// Any JSON number (integer or float)
    Number,
    /// A JSON number without a fractional part
    Integer,
    Boolean,
    Array,
    Object,
}

impl ParamType {
    /// JSON-schema name of the type.
    pub fn as_str(&self) -> &'static str {
        match self {
            ParamType::String => "string",
            ParamType::Number => "number",
            ParamType::Integer => "integer",
            ParamType::Boolean => "boolean",
            ParamType::Array => "array",
            ParamType::Object => "object",
        }
    }

    /// Whether `value` is acceptable for this type tag.
    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            ParamType::String => value.is_string(),
            ParamType::Number => value.is_number(),
            ParamType::Integer => value.is_i64() || value.is_u64(),
            ParamType::Boolean => value.is_boolean(),
            ParamType::Array => value.is_array(),
            ParamType::Object => value.is_object(),
        }
    }
}

impl std::fmt::Display for ParamType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A declared tool parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolParam {
    pub name: String,
    #[serde(rename = "type")]
    pub param_type: ParamType,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub required: bool,
    /// Value filled in when the caller omits an optional parameter
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

impl ToolParam {
    pub fn required(name: impl Into<String>, param_type: ParamType, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            param_type,
            description: description.into(),
            required: true,
            default: None,
        }
    }

    pub fn optional(name: impl Into<String>, param_type: ParamType, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            param_type,
            description: description.into(),
            required: false,
            default: None,
        }
    }

    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }
}

/// Category tag of a tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolCategory {
    File,
    Git,
    /// Runs raw command strings; subject to safety classification
    Shell,
    Search,
    Network,
    Custom,
}

impl Default for ToolCategory {
    fn default() -> Self {
        Self::Custom
    }
}

// ============================================================================
// ToolDescriptor
// ============================================================================

/// Identity and declared schema of a tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    /// Unique name within a registry
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub parameters: Vec<ToolParam>,
    #[serde(default)]
    pub category: ToolCategory,
}

impl ToolDescriptor {
    pub fn new(name: impl Into<String>, description: impl Into<String>, category: ToolCategory) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: Vec::new(),
            category,
        }
    }

    /// Append a declared parameter.
    pub fn with_param(mut self, param: ToolParam) -> Self {
        self.parameters.push(param);
        self
    }

    pub fn param(&self, name: &str) -> Option<&ToolParam> {
        self.parameters.iter().find(|p| p.name == name)
    }

    /// Whether arguments to this tool are raw shell-like command strings.
    pub fn is_shell(&self) -> bool {
        self.category == ToolCategory::Shell
    }

    /// JSON schema (draft-07 subset) describing the parameters.
    pub fn parameters_schema(&self) -> Value {
        let mut properties = Map::new();
        let mut required = Vec::new();
        for param in &self.parameters {
            let mut prop = Map::new();
            prop.insert("type".to_string(), Value::from(param.param_type.as_str()));
            prop.insert("description".to_string(), Value::from(param.description.clone()));
            if let Some(default) = &param.default {
                prop.insert("default".to_string(), default.clone());
            }
            properties.insert(param.name.clone(), Value::Object(prop));
            if param.required {
                required.push(Value::from(param.name.clone()));
            }
        }
        serde_json::json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }
}

// ============================================================================
// Tool Trait
// ============================================================================

/// Environmental failure raised by a tool implementation.
///
/// Never a caller programming error: the registry captures it into a failed
/// `ToolResult` and the executor may retry it.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{message}")]
pub struct ToolFailure {
    pub message: String,
}

impl ToolFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for ToolFailure {
    fn from(err: std::io::Error) -> Self {
        Self::new(err.to_string())
    }
}

impl From<CoreError> for ToolFailure {
    fn from(err: CoreError) -> Self {
        Self::new(err.to_string())
    }
}

/// Unified tool interface.
///
/// One instance serves every session, so implementations must be stateless
/// with respect to session identity or partition internal state by
/// `ctx.session_id()`.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Identity and declared schema.
    fn descriptor(&self) -> &ToolDescriptor;

    /// Execute with arguments already validated against the descriptor.
    ///
    /// Any JSON value may be returned; the registry wraps non-object results
    /// as `{"output": value}`.
    async fn execute(&self, ctx: &ToolContext, args: Map<String, Value>) -> Result<Value, ToolFailure>;
}
