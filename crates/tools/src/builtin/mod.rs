//! Built-in Tools
//!
//! The default tool set a session works with: file access rooted at the
//! session's working directory, regex code search, git status and a shell
//! whose commands pass through the executor's safety gate.
//!
//! Every path argument goes through `ToolContext::resolve_path`, so a
//! built-in never touches anything outside the working directory.

mod fs;
mod search;
mod shell;

use std::sync::Arc;

use serde_json::{Map, Value};

use devpilot_core::{Tool, ToolFailure};

use crate::registry::{RegistryError, ToolRegistry};

pub use fs::{EditFileTool, ListDirTool, ReadFileTool, WriteFileTool};
pub use search::SearchTool;
pub use shell::{GitStatusTool, ShellTool};

/// Longest text a built-in hands back. The loop truncates further before
/// feeding output to the model.
const MAX_OUTPUT_CHARS: usize = 30_000;

/// One instance of every built-in tool.
pub fn builtin_tools() -> Vec<Arc<dyn Tool>> {
    vec![
        Arc::new(ReadFileTool::default()),
        Arc::new(WriteFileTool::default()),
        Arc::new(EditFileTool::default()),
        Arc::new(ListDirTool::default()),
        Arc::new(SearchTool::default()),
        Arc::new(ShellTool::default()),
        Arc::new(GitStatusTool::default()),
    ]
}

/// Register the built-ins. Fails if a name is already taken.
pub fn register_builtin_tools(registry: &mut ToolRegistry) -> Result<(), RegistryError> {
    for tool in builtin_tools() {
        registry.register(tool)?;
    }
    Ok(())
}

/// Required string argument. The registry validates the schema first, so a
/// miss here means the tool was called directly.
fn string_arg<'a>(args: &'a Map<String, Value>, name: &str) -> Result<&'a str, ToolFailure> {
    args.get(name)
        .and_then(Value::as_str)
        .ok_or_else(|| ToolFailure::new(format!("Missing required parameter: {name}")))
}

fn cap_output(mut text: String) -> String {
    if let Some((cut, _)) = text.char_indices().nth(MAX_OUTPUT_CHARS) {
        text.truncate(cut);
        text.push_str("\n\n... (output truncated)");
    }
    text
}
