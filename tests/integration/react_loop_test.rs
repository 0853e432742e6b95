//! ReAct Loop Integration Tests
//!
//! Drives the loop against the built-in file tools in a temporary workspace:
//! - Tool output is fed back to the model on the next turn
//! - Argument fallback recovers an environmental failure
//! - A per-attempt timeout ends the request
//! - Oversized output is truncated before it reaches the model

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Map, Value};
use tempfile::TempDir;
use tokio::sync::mpsc;

use devpilot::{LoopSettings, LoopStatus, ReActLoop};
use devpilot_core::{ToolCategory, ToolContext, ToolDescriptor};
use devpilot_llm::{MessageRole, ScriptedCompletion};
use devpilot_tools::{
    register_builtin_tools, ArgumentFallback, ExecutorSettings, FunctionTool, SafetyClassifier,
    ToolExecutor, ToolRegistry,
};

/// Retries a missing path with a `.md` extension.
struct MarkdownExtension;

impl ArgumentFallback for MarkdownExtension {
    fn transform(
        &self,
        _tool_name: &str,
        args: &Map<String, Value>,
        error: &str,
    ) -> Option<Map<String, Value>> {
        if !error.starts_with("File not found") {
            return None;
        }
        let path = args.get("path")?.as_str()?;
        let mut next = args.clone();
        next.insert("path".to_string(), json!(format!("{path}.md")));
        Some(next)
    }
}

fn registry() -> Arc<ToolRegistry> {
    let mut registry = ToolRegistry::new();
    register_builtin_tools(&mut registry).unwrap();
    registry
        .register(Arc::new(FunctionTool::new(
            ToolDescriptor::new("slow", "Never finishes in time", ToolCategory::Custom),
            |_ctx, _args| async move {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok(json!("late"))
            },
        )))
        .unwrap();
    Arc::new(registry)
}

fn workspace() -> TempDir {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("README.md"), "# Demo\nUses tokio.").unwrap();
    std::fs::write(dir.path().join("big.log"), "x".repeat(10_000)).unwrap();
    dir
}

fn react(completion: Arc<ScriptedCompletion>, settings: ExecutorSettings) -> ReActLoop {
    let executor = ToolExecutor::new(registry(), Arc::new(SafetyClassifier::new()), settings)
        .with_fallback(Arc::new(MarkdownExtension));
    ReActLoop::new(
        completion,
        executor,
        LoopSettings {
            tool_output_limit: 200,
            ..LoopSettings::default()
        },
    )
}

#[tokio::test]
async fn test_file_contents_reach_the_model() {
    let dir = workspace();
    let completion = Arc::new(ScriptedCompletion::from_replies([
        r#"TOOL: read_file(path="README.md")"#,
        "The project uses tokio.",
    ]));
    let react = react(completion.clone(), ExecutorSettings::default());
    let session = ToolContext::new("s1", dir.path(), "devpilot", "");
    let (tx, _rx) = mpsc::channel(64);

    let outcome = react.run("which runtime?", None, &session, tx).await;
    assert_eq!(outcome.status, LoopStatus::Completed);
    assert_eq!(outcome.answer.as_deref(), Some("The project uses tokio."));
    assert_eq!(outcome.tool_calls.len(), 1);
    assert_eq!(outcome.tool_calls[0].attempts, 1);

    let second = &completion.received()[1];
    let fed_back = second.last().unwrap();
    assert_eq!(fed_back.role, MessageRole::Tool);
    assert_eq!(fed_back.content, "Tool output: # Demo\nUses tokio.");
    assert!(second[0].content.contains(&dir.path().display().to_string()));
}

#[tokio::test]
async fn test_fallback_recovers_missing_path() {
    let dir = workspace();
    let completion = Arc::new(ScriptedCompletion::from_replies([
        r#"TOOL: read_file(path="README")"#,
        "Found the readme.",
    ]));
    let react = react(completion, ExecutorSettings::default());
    let session = ToolContext::new("s1", dir.path(), "devpilot", "");
    let (tx, _rx) = mpsc::channel(64);

    let outcome = react.run("read the readme", None, &session, tx).await;
    assert_eq!(outcome.status, LoopStatus::Completed);
    let call = &outcome.tool_calls[0];
    assert!(call.success);
    assert_eq!(call.attempts, 2);
}

#[tokio::test]
async fn test_missing_file_after_retries_fails() {
    let dir = workspace();
    let completion = Arc::new(ScriptedCompletion::from_replies([
        r#"TOOL: read_file(path="CHANGELOG")"#,
        "unreachable",
    ]));
    let react = react(completion.clone(), ExecutorSettings::default());
    let session = ToolContext::new("s1", dir.path(), "devpilot", "");
    let (tx, _rx) = mpsc::channel(64);

    let outcome = react.run("read the changelog", None, &session, tx).await;
    match &outcome.status {
        LoopStatus::ToolFailed { error } => assert!(error.contains("CHANGELOG.md")),
        other => panic!("unexpected status {other:?}"),
    }
    assert_eq!(outcome.tool_calls[0].attempts, 2);
    assert_eq!(completion.calls(), 1);
}

#[tokio::test]
async fn test_timeout_ends_request() {
    let dir = workspace();
    let completion = Arc::new(ScriptedCompletion::from_replies(["TOOL: slow()", "unreachable"]));
    let react = react(
        completion,
        ExecutorSettings {
            elevated: false,
            timeout: Some(Duration::from_millis(50)),
        },
    );
    let session = ToolContext::new("s1", dir.path(), "devpilot", "");
    let (tx, _rx) = mpsc::channel(64);

    let outcome = react.run("be slow", None, &session, tx).await;
    assert_eq!(
        outcome.status,
        LoopStatus::ToolFailed {
            error: "timed out after 50ms".to_string()
        }
    );
    assert_eq!(outcome.tool_calls[0].attempts, 1);
}

#[tokio::test]
async fn test_large_output_is_truncated() {
    let dir = workspace();
    let completion = Arc::new(ScriptedCompletion::from_replies([
        r#"TOOL: read_file(path="big.log")"#,
        "It is a big log.",
    ]));
    let react = react(completion.clone(), ExecutorSettings::default());
    let session = ToolContext::new("s1", dir.path(), "devpilot", "");
    let (tx, _rx) = mpsc::channel(64);

    let outcome = react.run("summarize the log", None, &session, tx).await;
    assert!(outcome.is_success());

    let fed_back = completion.received()[1].last().unwrap().content.clone();
    assert!(fed_back.ends_with("... (truncated)"));
    assert!(fed_back.chars().count() < 300);
}

#[tokio::test]
async fn test_path_escape_is_a_tool_failure() {
    let dir = workspace();
    let completion = Arc::new(ScriptedCompletion::from_replies([
        r#"TOOL: read_file(path="../outside.txt")"#,
        "unreachable",
    ]));
    let react = react(completion, ExecutorSettings::default());
    let session = ToolContext::new("s1", dir.path(), "devpilot", "");
    let (tx, _rx) = mpsc::channel(64);

    let outcome = react.run("read outside", None, &session, tx).await;
    assert_eq!(
        outcome.status,
        LoopStatus::ToolFailed {
            error: "Path escapes working directory: ../outside.txt".to_string()
        }
    );
    assert_eq!(outcome.tool_calls[0].attempts, 2);
}

#[tokio::test]
async fn test_model_edits_then_reads_back() {
    let dir = workspace();
    let completion = Arc::new(ScriptedCompletion::from_replies([
        r#"TOOL: edit_file(path="README.md", old_string="tokio", new_string="async-std")"#,
        r#"TOOL: search(pattern="async-std")"#,
        "Switched the runtime.",
    ]));
    let react = react(completion.clone(), ExecutorSettings::default());
    let session = ToolContext::new("s1", dir.path(), "devpilot", "");
    let (tx, _rx) = mpsc::channel(64);

    let outcome = react.run("switch runtimes", None, &session, tx).await;
    assert_eq!(outcome.status, LoopStatus::Completed);
    assert_eq!(outcome.tool_calls.len(), 2);
    assert_eq!(
        std::fs::read_to_string(dir.path().join("README.md")).unwrap(),
        "# Demo\nUses async-std."
    );
    let fed_back = completion.received()[2].last().unwrap().content.clone();
    assert_eq!(fed_back, "Tool output: README.md:2: Uses async-std.");
}
