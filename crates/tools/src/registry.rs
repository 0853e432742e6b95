//! Tool Registry
//!
//! Name-addressed catalog of tools. Arguments are validated against the
//! declared parameter schema before dispatch; a tool's own failure is
//! captured into a failed `ToolResult` instead of propagating.
//!
//! The registry is populated once, then shared behind an `Arc` by every
//! running loop. Nothing mutates it after that point.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use devpilot_core::{Tool, ToolContext, ToolDescriptor, ToolFailure};

/// Caller programming errors. Never retried.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Tool '{0}' is already registered")]
    DuplicateToolName(String),

    #[error("Unknown tool: {0}")]
    ToolNotFound(String),

    #[error("Invalid parameters for '{tool}': {reason}")]
    InvalidParameters { tool: String, reason: String },
}

impl RegistryError {
    fn invalid(tool: &str, reason: impl Into<String>) -> Self {
        Self::InvalidParameters {
            tool: tool.to_string(),
            reason: reason.into(),
        }
    }
}

/// Result of a tool execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    /// Whether the execution was successful
    pub success: bool,
    /// Result payload; always a JSON object
    #[serde(default)]
    pub data: Value,
    /// Error message (if failed)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolResult {
    /// Create a successful result. Non-object payloads are wrapped as
    /// `{"output": value}`.
    pub fn ok(data: Value) -> Self {
        let data = match data {
            Value::Object(_) => data,
            other => serde_json::json!({ "output": other }),
        };
        Self {
            success: true,
            data,
            error: None,
        }
    }

    /// Create an error result
    pub fn err(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: Value::Object(Map::new()),
            error: Some(error.into()),
        }
    }

    /// Text form of the result, as fed back to the model.
    ///
    /// A string `output` field is returned verbatim; any other payload is
    /// rendered as compact JSON.
    pub fn to_content(&self) -> String {
        if !self.success {
            return format!("error: {}", self.error.as_deref().unwrap_or("unknown error"));
        }
        match self.data.get("output") {
            Some(Value::String(s)) if self.data.as_object().map_or(false, |o| o.len() == 1) => {
                s.clone()
            }
            _ => self.data.to_string(),
        }
    }
}

/// Registry of available tools
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
    /// Insertion order for deterministic iteration
    order: Vec<String>,
}

impl ToolRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
            order: Vec::new(),
        }
    }

    /// Register a tool. Names are unique.
    pub fn register(&mut self, tool: Arc<dyn Tool>) -> Result<(), RegistryError> {
        let name = tool.descriptor().name.clone();
        if self.tools.contains_key(&name) {
            return Err(RegistryError::DuplicateToolName(name));
        }
        tracing::debug!(tool = %name, "Registered tool");
        self.order.push(name.clone());
        self.tools.insert(name, tool);
        Ok(())
    }

    /// Look up a tool's descriptor.
    pub fn get(&self, name: &str) -> Option<&ToolDescriptor> {
        self.tools.get(name).map(|tool| tool.descriptor())
    }

    /// Descriptors in registration order.
    pub fn descriptors(&self) -> impl Iterator<Item = &ToolDescriptor> {
        self.order
            .iter()
            .filter_map(move |name| self.tools.get(name))
            .map(|tool| tool.descriptor())
    }

    /// Tool names in registration order.
    pub fn names(&self) -> Vec<String> {
        self.order.clone()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Validate `args` against the named tool's schema and fill declared
    /// defaults. Unknown keys pass through untouched.
    pub fn prepare(
        &self,
        name: &str,
        mut args: Map<String, Value>,
    ) -> Result<Map<String, Value>, RegistryError> {
        let descriptor = self
            .get(name)
            .ok_or_else(|| RegistryError::ToolNotFound(name.to_string()))?;

        for param in &descriptor.parameters {
            match args.get(&param.name) {
                Some(Value::Null) | None => {
                    args.remove(&param.name);
                    if let Some(default) = &param.default {
                        args.insert(param.name.clone(), default.clone());
                    } else if param.required {
                        return Err(RegistryError::invalid(
                            name,
                            format!("missing required parameter '{}'", param.name),
                        ));
                    }
                }
                Some(value) if !param.param_type.accepts(value) => {
                    return Err(RegistryError::invalid(
                        name,
                        format!(
                            "parameter '{}' expects {}, got {}",
                            param.name,
                            param.param_type,
                            json_type_name(value)
                        ),
                    ));
                }
                Some(_) => {}
            }
        }

        Ok(args)
    }

    /// Validate and execute a tool by name.
    ///
    /// Only the contract violations are returned as `Err`; a tool that fails
    /// at runtime yields `Ok(ToolResult { success: false, .. })`.
    pub async fn invoke(
        &self,
        name: &str,
        ctx: &ToolContext,
        args: Map<String, Value>,
    ) -> Result<ToolResult, RegistryError> {
        let args = self.prepare(name, args)?;
        let tool = self
            .tools
            .get(name)
            .ok_or_else(|| RegistryError::ToolNotFound(name.to_string()))?;

        match tool.execute(ctx, args).await {
            Ok(value) => Ok(ToolResult::ok(value)),
            Err(failure) => {
                tracing::debug!(tool = %name, error = %failure, "Tool execution failed");
                Ok(ToolResult::err(failure.message))
            }
        }
    }

    /// Render the catalog for the one-time system message.
    pub fn catalog_prompt(&self) -> String {
        let mut out = String::new();
        for descriptor in self.descriptors() {
            out.push_str(&format!("- {}: {}\n", descriptor.name, descriptor.description));
            for param in &descriptor.parameters {
                let marker = if param.required { "required" } else { "optional" };
                out.push_str(&format!(
                    "    {} ({}, {}): {}\n",
                    param.name, param.param_type, marker, param.description
                ));
            }
        }
        out
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "number",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ── FunctionTool ─────────────────────────────────────────────────────

/// Boxed future returned by a `FunctionTool` handler.
pub type FunctionToolFuture = Pin<Box<dyn Future<Output = Result<Value, ToolFailure>> + Send>>;

type FunctionToolHandler =
    Box<dyn Fn(ToolContext, Map<String, Value>) -> FunctionToolFuture + Send + Sync>;

/// A tool created from an async closure.
///
/// Lets embedders register one-off tools without a dedicated struct:
///
/// ```ignore
/// let echo = FunctionTool::new(
///     ToolDescriptor::new("echo", "Echo the message", ToolCategory::Custom)
///         .with_param(ToolParam::required("message", ParamType::String, "Text")),
///     |_ctx, args| async move { Ok(args["message"].clone()) },
/// );
/// ```
pub struct FunctionTool {
    descriptor: ToolDescriptor,
    handler: FunctionToolHandler,
}

impl FunctionTool {
    pub fn new<F, Fut>(descriptor: ToolDescriptor, handler: F) -> Self
    where
        F: Fn(ToolContext, Map<String, Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, ToolFailure>> + Send + 'static,
    {
        Self {
            descriptor,
            handler: Box::new(move |ctx, args| Box::pin(handler(ctx, args))),
        }
    }
}

#[async_trait]
impl Tool for FunctionTool {
    fn descriptor(&self) -> &ToolDescriptor {
        &self.descriptor
    }

    async fn execute(
        &self,
        ctx: &ToolContext,
        args: Map<String, Value>,
    ) -> Result<Value, ToolFailure> {
        (self.handler)(ctx.clone(), args).await
    }
}
