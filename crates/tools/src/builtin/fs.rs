//! File tools: read, write, edit and list, rooted at the working directory.

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use devpilot_core::{ParamType, Tool, ToolCategory, ToolContext, ToolDescriptor, ToolFailure, ToolParam};

use super::{cap_output, string_arg};

/// Maximum entries shown by `list_dir`.
const MAX_LIST_ENTRIES: usize = 200;

fn io_failure(action: &str, path: &str, err: std::io::Error) -> ToolFailure {
    match err.kind() {
        std::io::ErrorKind::NotFound => ToolFailure::new(format!("File not found: {path}")),
        _ => ToolFailure::new(format!("Failed to {action} {path}: {err}")),
    }
}

fn format_size(size: u64) -> String {
    if size < 1024 {
        format!("{size} B")
    } else if size < 1024 * 1024 {
        format!("{:.1} KB", size as f64 / 1024.0)
    } else {
        format!("{:.1} MB", size as f64 / (1024.0 * 1024.0))
    }
}

// ============================================================================
// read_file
// ============================================================================

pub struct ReadFileTool {
    descriptor: ToolDescriptor,
}

impl Default for ReadFileTool {
    fn default() -> Self {
        Self {
            descriptor: ToolDescriptor::new(
                "read_file",
                "Read a text file. Optional offset (1-based line) and limit select a range of lines.",
                ToolCategory::File,
            )
            .with_param(ToolParam::required("path", ParamType::String, "Path relative to the working directory"))
            .with_param(ToolParam::optional("offset", ParamType::Integer, "First line to return (1-based)"))
            .with_param(ToolParam::optional("limit", ParamType::Integer, "Maximum number of lines")),
        }
    }
}

#[async_trait]
impl Tool for ReadFileTool {
    fn descriptor(&self) -> &ToolDescriptor {
        &self.descriptor
    }

    async fn execute(&self, ctx: &ToolContext, args: Map<String, Value>) -> Result<Value, ToolFailure> {
        ctx.check_cancelled()?;
        let path = string_arg(&args, "path")?;
        let full = ctx.resolve_path(path)?;
        let content = tokio::fs::read_to_string(&full)
            .await
            .map_err(|e| io_failure("read", path, e))?;

        let offset = args.get("offset").and_then(Value::as_u64);
        let limit = args.get("limit").and_then(Value::as_u64);
        let text = if offset.is_none() && limit.is_none() {
            content
        } else {
            let skip = offset.unwrap_or(1).max(1) as usize - 1;
            let take = limit.map_or(usize::MAX, |n| n as usize);
            content.lines().skip(skip).take(take).collect::<Vec<_>>().join("\n")
        };
        Ok(Value::String(cap_output(text)))
    }
}

// ============================================================================
// write_file
// ============================================================================

pub struct WriteFileTool {
    descriptor: ToolDescriptor,
}

impl Default for WriteFileTool {
    fn default() -> Self {
        Self {
            descriptor: ToolDescriptor::new(
                "write_file",
                "Write content to a file, creating it and any parent directories. Overwrites existing files.",
                ToolCategory::File,
            )
            .with_param(ToolParam::required("path", ParamType::String, "Path relative to the working directory"))
            .with_param(ToolParam::required("content", ParamType::String, "Full file content")),
        }
    }
}

#[async_trait]
impl Tool for WriteFileTool {
    fn descriptor(&self) -> &ToolDescriptor {
        &self.descriptor
    }

    async fn execute(&self, ctx: &ToolContext, args: Map<String, Value>) -> Result<Value, ToolFailure> {
        ctx.check_cancelled()?;
        let path = string_arg(&args, "path")?;
        let content = string_arg(&args, "content")?;
        let full = ctx.resolve_path(path)?;

        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ToolFailure::new(format!("Failed to create directories for {path}: {e}")))?;
        }
        tokio::fs::write(&full, content)
            .await
            .map_err(|e| ToolFailure::new(format!("Failed to write {path}: {e}")))?;

        tracing::debug!(path, bytes = content.len(), "File written");
        Ok(json!(format!("Wrote {} lines to {path}", content.lines().count())))
    }
}

// ============================================================================
// edit_file
// ============================================================================

pub struct EditFileTool {
    descriptor: ToolDescriptor,
}

impl Default for EditFileTool {
    fn default() -> Self {
        Self {
            descriptor: ToolDescriptor::new(
                "edit_file",
                "Replace text in a file. old_string must occur exactly once unless replace_all is true.",
                ToolCategory::File,
            )
            .with_param(ToolParam::required("path", ParamType::String, "Path relative to the working directory"))
            .with_param(ToolParam::required("old_string", ParamType::String, "Exact text to replace"))
            .with_param(ToolParam::required("new_string", ParamType::String, "Replacement text"))
            .with_param(
                ToolParam::optional("replace_all", ParamType::Boolean, "Replace every occurrence")
                    .with_default(json!(false)),
            ),
        }
    }
}

#[async_trait]
impl Tool for EditFileTool {
    fn descriptor(&self) -> &ToolDescriptor {
        &self.descriptor
    }

    async fn execute(&self, ctx: &ToolContext, args: Map<String, Value>) -> Result<Value, ToolFailure> {
        ctx.check_cancelled()?;
        let path = string_arg(&args, "path")?;
        let old = string_arg(&args, "old_string")?;
        let new = string_arg(&args, "new_string")?;
        let replace_all = args.get("replace_all").and_then(Value::as_bool).unwrap_or(false);
        if old.is_empty() {
            return Err(ToolFailure::new("old_string must not be empty"));
        }

        let full = ctx.resolve_path(path)?;
        let content = tokio::fs::read_to_string(&full)
            .await
            .map_err(|e| io_failure("read", path, e))?;

        let occurrences = content.matches(old).count();
        if occurrences == 0 {
            return Err(ToolFailure::new(format!("old_string not found in {path}")));
        }
        if occurrences > 1 && !replace_all {
            return Err(ToolFailure::new(format!(
                "old_string appears {occurrences} times in {path}; add context or set replace_all"
            )));
        }

        let updated = if replace_all {
            content.replace(old, new)
        } else {
            content.replacen(old, new, 1)
        };
        tokio::fs::write(&full, updated)
            .await
            .map_err(|e| ToolFailure::new(format!("Failed to write {path}: {e}")))?;

        Ok(json!(format!("Replaced {occurrences} occurrence(s) in {path}")))
    }
}

// ============================================================================
// list_dir
// ============================================================================

pub struct ListDirTool {
    descriptor: ToolDescriptor,
}

impl Default for ListDirTool {
    fn default() -> Self {
        Self {
            descriptor: ToolDescriptor::new(
                "list_dir",
                "List a directory: subdirectories first, then files with sizes.",
                ToolCategory::File,
            )
            .with_param(
                ToolParam::optional("path", ParamType::String, "Directory relative to the working directory")
                    .with_default(json!(".")),
            )
            .with_param(
                ToolParam::optional("show_hidden", ParamType::Boolean, "Include dot files")
                    .with_default(json!(false)),
            ),
        }
    }
}

#[async_trait]
impl Tool for ListDirTool {
    fn descriptor(&self) -> &ToolDescriptor {
        &self.descriptor
    }

    async fn execute(&self, ctx: &ToolContext, args: Map<String, Value>) -> Result<Value, ToolFailure> {
        ctx.check_cancelled()?;
        let path = args.get("path").and_then(Value::as_str).unwrap_or(".");
        let show_hidden = args.get("show_hidden").and_then(Value::as_bool).unwrap_or(false);
        let full = ctx.resolve_path(path)?;

        let mut entries = tokio::fs::read_dir(&full)
            .await
            .map_err(|e| io_failure("list", path, e))?;
        let mut items: Vec<(String, bool, u64)> = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if !show_hidden && name.starts_with('.') {
                continue;
            }
            let metadata = entry.metadata().await?;
            items.push((name, metadata.is_dir(), metadata.len()));
        }

        if items.is_empty() {
            return Ok(json!(format!("{path}: (empty directory)")));
        }

        // Directories first, then by name
        items.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        let total = items.len();
        let mut lines: Vec<String> = items
            .into_iter()
            .take(MAX_LIST_ENTRIES)
            .map(|(name, is_dir, size)| {
                if is_dir {
                    format!("DIR   {name}/")
                } else {
                    format!("FILE  {name} ({})", format_size(size))
                }
            })
            .collect();
        if total > MAX_LIST_ENTRIES {
            lines.push(format!("... and {} more", total - MAX_LIST_ENTRIES));
        }
        Ok(json!(lines.join("\n")))
    }
}
