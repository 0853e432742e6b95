//! Process-backed tools: the shell and git status.
//!
//! Children run in the session's working directory and are killed when the
//! session is cancelled or the per-command timeout expires.

use std::process::Output;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use tokio::process::Command;

use devpilot_core::{CoreError, ParamType, Tool, ToolCategory, ToolContext, ToolDescriptor, ToolFailure, ToolParam};

use super::{cap_output, string_arg};

const DEFAULT_TIMEOUT_MS: u64 = 120_000;
const MAX_TIMEOUT_MS: u64 = 600_000;

/// Run `command` to completion, racing cancellation and `timeout`.
/// `kill_on_drop` reaps the child when either wins.
async fn run(ctx: &ToolContext, mut command: Command, timeout: Duration) -> Result<Output, ToolFailure> {
    command
        .current_dir(ctx.working_dir())
        .stdin(std::process::Stdio::null())
        .kill_on_drop(true);

    tokio::select! {
        biased;
        _ = ctx.cancellation().cancelled() => {
            Err(CoreError::cancelled(ctx.session_id()).into())
        }
        _ = tokio::time::sleep(timeout) => {
            Err(ToolFailure::new(format!("Command timed out after {} ms", timeout.as_millis())))
        }
        output = command.output() => {
            output.map_err(|e| ToolFailure::new(format!("Failed to run command: {e}")))
        }
    }
}

/// stdout, then stderr under a separator when both are present.
fn combined_output(output: &Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    let mut text = stdout.into_owned();
    if !stderr.is_empty() {
        if !text.is_empty() {
            text.push_str("\n--- stderr ---\n");
        }
        text.push_str(&stderr);
    }
    text
}

// ============================================================================
// shell
// ============================================================================

pub struct ShellTool {
    descriptor: ToolDescriptor,
}

impl Default for ShellTool {
    fn default() -> Self {
        Self {
            descriptor: ToolDescriptor::new(
                "shell",
                "Run a shell command in the working directory. Returns stdout and stderr; a non-zero exit fails the call.",
                ToolCategory::Shell,
            )
            .with_param(ToolParam::required("command", ParamType::String, "Command line"))
            .with_param(
                ToolParam::optional("timeout_ms", ParamType::Integer, "Timeout in milliseconds (max 600000)")
                    .with_default(json!(DEFAULT_TIMEOUT_MS)),
            ),
        }
    }
}

#[async_trait]
impl Tool for ShellTool {
    fn descriptor(&self) -> &ToolDescriptor {
        &self.descriptor
    }

    async fn execute(&self, ctx: &ToolContext, args: Map<String, Value>) -> Result<Value, ToolFailure> {
        ctx.check_cancelled()?;
        let line = string_arg(&args, "command")?;
        let timeout_ms = args
            .get("timeout_ms")
            .and_then(Value::as_u64)
            .unwrap_or(DEFAULT_TIMEOUT_MS)
            .min(MAX_TIMEOUT_MS);

        #[cfg(windows)]
        let (shell, flag) = ("cmd", "/C");
        #[cfg(not(windows))]
        let (shell, flag) = ("sh", "-c");

        let mut command = Command::new(shell);
        command.arg(flag).arg(line);
        tracing::debug!(command = line, session = %ctx.session_id(), "Running shell command");
        let output = run(ctx, command, Duration::from_millis(timeout_ms)).await?;

        let text = cap_output(combined_output(&output));
        if output.status.success() {
            if text.is_empty() {
                return Ok(json!("Command completed with no output"));
            }
            return Ok(Value::String(text));
        }
        let code = output
            .status
            .code()
            .map_or_else(|| "signal".to_string(), |c| c.to_string());
        Err(ToolFailure::new(format!("Command failed with exit code {code}\n{text}")))
    }
}

// ============================================================================
// git_status
// ============================================================================

pub struct GitStatusTool {
    descriptor: ToolDescriptor,
}

impl Default for GitStatusTool {
    fn default() -> Self {
        Self {
            descriptor: ToolDescriptor::new(
                "git_status",
                "Show the branch and changed files of the working directory's git repository.",
                ToolCategory::Git,
            ),
        }
    }
}

#[async_trait]
impl Tool for GitStatusTool {
    fn descriptor(&self) -> &ToolDescriptor {
        &self.descriptor
    }

    async fn execute(&self, ctx: &ToolContext, _args: Map<String, Value>) -> Result<Value, ToolFailure> {
        ctx.check_cancelled()?;
        let mut command = Command::new("git");
        command.args(["status", "--porcelain=v1", "--branch"]);
        let output = run(ctx, command, Duration::from_millis(DEFAULT_TIMEOUT_MS)).await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ToolFailure::new(format!("git status failed: {}", stderr.trim())));
        }
        let stdout = String::from_utf8_lossy(&output.stdout);
        let mut lines = stdout.lines();
        let branch = lines
            .next()
            .and_then(|l| l.strip_prefix("## "))
            .unwrap_or("(unknown branch)");
        let changes: Vec<&str> = lines.collect();

        let summary = if changes.is_empty() {
            format!("On {branch}\nWorking tree clean")
        } else {
            format!("On {branch}\n{}", changes.join("\n"))
        };
        Ok(Value::String(cap_output(summary)))
    }
}
