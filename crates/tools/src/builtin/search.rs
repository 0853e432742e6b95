//! Regex search over the working tree, honoring `.gitignore`.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use regex::{Regex, RegexBuilder};
use serde_json::{json, Map, Value};
use tokio_util::sync::CancellationToken;

use devpilot_core::{ParamType, Tool, ToolCategory, ToolContext, ToolDescriptor, ToolFailure, ToolParam};

use super::{cap_output, string_arg};

const DEFAULT_MAX_RESULTS: u64 = 100;

pub struct SearchTool {
    descriptor: ToolDescriptor,
}

impl Default for SearchTool {
    fn default() -> Self {
        Self {
            descriptor: ToolDescriptor::new(
                "search",
                "Search file contents with a regex. Returns path:line: text for each match; skips hidden and ignored files.",
                ToolCategory::Search,
            )
            .with_param(ToolParam::required("pattern", ParamType::String, "Regular expression"))
            .with_param(
                ToolParam::optional("path", ParamType::String, "File or directory to search")
                    .with_default(json!(".")),
            )
            .with_param(
                ToolParam::optional("case_insensitive", ParamType::Boolean, "Ignore case")
                    .with_default(json!(false)),
            )
            .with_param(
                ToolParam::optional("max_results", ParamType::Integer, "Stop after this many matches")
                    .with_default(json!(DEFAULT_MAX_RESULTS)),
            ),
        }
    }
}

#[async_trait]
impl Tool for SearchTool {
    fn descriptor(&self) -> &ToolDescriptor {
        &self.descriptor
    }

    async fn execute(&self, ctx: &ToolContext, args: Map<String, Value>) -> Result<Value, ToolFailure> {
        ctx.check_cancelled()?;
        let pattern = string_arg(&args, "pattern")?;
        let path = args.get("path").and_then(Value::as_str).unwrap_or(".");
        let case_insensitive = args
            .get("case_insensitive")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        let max_results = args
            .get("max_results")
            .and_then(Value::as_u64)
            .unwrap_or(DEFAULT_MAX_RESULTS)
            .max(1) as usize;

        let regex = RegexBuilder::new(pattern)
            .case_insensitive(case_insensitive)
            .build()
            .map_err(|e| ToolFailure::new(format!("Invalid regex pattern: {e}")))?;
        let root = ctx.resolve_path(path)?;
        if !tokio::fs::try_exists(&root).await.unwrap_or(false) {
            return Err(ToolFailure::new(format!("Path not found: {path}")));
        }

        // The walk is synchronous; keep it off the runtime threads
        let base = ctx.working_dir().to_path_buf();
        let cancel = ctx.cancellation().clone();
        let matches = tokio::task::spawn_blocking(move || {
            search_tree(&root, &base, &regex, max_results, &cancel)
        })
        .await
        .map_err(|e| ToolFailure::new(format!("Search task failed: {e}")))?;
        ctx.check_cancelled()?;

        if matches.is_empty() {
            return Ok(json!(format!("No matches for '{pattern}'")));
        }
        let mut text = matches.join("\n");
        if matches.len() >= max_results {
            text.push_str(&format!("\n... (stopped at {max_results} matches)"));
        }
        Ok(Value::String(cap_output(text)))
    }
}

/// Walk `root` and collect up to `max_results` matching lines, stopping
/// early once `cancel` fires.
fn search_tree(
    root: &Path,
    base: &Path,
    regex: &Regex,
    max_results: usize,
    cancel: &CancellationToken,
) -> Vec<String> {
    let walker = ignore::WalkBuilder::new(root)
        .hidden(true)
        .git_ignore(true)
        .require_git(false)
        .build();

    let mut files: Vec<PathBuf> = walker
        .flatten()
        .filter(|entry| entry.file_type().map_or(false, |ft| ft.is_file()))
        .map(|entry| entry.into_path())
        .collect();
    files.sort();

    let mut results = Vec::new();
    for file in files {
        if cancel.is_cancelled() || results.len() >= max_results {
            break;
        }
        // Binary or unreadable files are skipped
        let Ok(content) = std::fs::read_to_string(&file) else {
            continue;
        };
        let shown = file.strip_prefix(base).unwrap_or(&file).display().to_string();
        for (index, line) in content.lines().enumerate() {
            if regex.is_match(line) {
                results.push(format!("{shown}:{}: {}", index + 1, line.trim_end()));
                if results.len() >= max_results {
                    break;
                }
            }
        }
    }
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtin::test_support::workspace;

    fn args(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    fn seed(dir: &Path) {
        std::fs::create_dir_all(dir.join("src")).unwrap();
        std::fs::write(dir.join("src/main.rs"), "fn main() {\n    run();\n}\n").unwrap();
        std::fs::write(dir.join("src/lib.rs"), "pub fn run() {}\n").unwrap();
        std::fs::create_dir_all(dir.join("target")).unwrap();
        std::fs::write(dir.join("target/out.rs"), "fn run_generated() {}\n").unwrap();
        std::fs::write(dir.join(".gitignore"), "target/\n").unwrap();
    }

    #[tokio::test]
    async fn test_search_reports_path_and_line() {
        let (dir, ctx) = workspace();
        seed(dir.path());

        let out = SearchTool::default()
            .execute(&ctx, args(json!({"pattern": r"\brun\("})))
            .await
            .unwrap();
        assert_eq!(out, json!("src/lib.rs:1: pub fn run() {}\nsrc/main.rs:2:     run();"));
    }

    #[tokio::test]
    async fn test_search_case_and_limit() {
        let (dir, ctx) = workspace();
        seed(dir.path());
        let tool = SearchTool::default();

        let none = tool.execute(&ctx, args(json!({"pattern": "FN MAIN"}))).await.unwrap();
        assert_eq!(none, json!("No matches for 'FN MAIN'"));

        let found = tool
            .execute(&ctx, args(json!({"pattern": "FN MAIN", "case_insensitive": true})))
            .await
            .unwrap();
        assert!(found.as_str().unwrap().starts_with("src/main.rs:1:"));

        let limited = tool
            .execute(&ctx, args(json!({"pattern": "run", "max_results": 1})))
            .await
            .unwrap();
        assert!(limited.as_str().unwrap().ends_with("(stopped at 1 matches)"));
    }

    #[tokio::test]
    async fn test_search_errors() {
        let (_dir, ctx) = workspace();
        let tool = SearchTool::default();

        let err = tool.execute(&ctx, args(json!({"pattern": "("}))).await.unwrap_err();
        assert!(err.message.starts_with("Invalid regex pattern"));

        let err = tool
            .execute(&ctx, args(json!({"pattern": "x", "path": "missing"})))
            .await
            .unwrap_err();
        assert_eq!(err.message, "Path not found: missing");
    }
}
