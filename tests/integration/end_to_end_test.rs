//! End-to-End Integration Tests
//!
//! Verifies the orchestrator as a caller sees it:
//! - Planning requests produce a reviewed plan without running tools
//! - Direct requests run the ReAct loop
//! - Shell commands needing approval round-trip through the event stream
//! - Configuration files drive limits and safety lists

use std::io::Write;
use std::sync::Arc;

use serde_json::json;
use tempfile::NamedTempFile;
use tokio::sync::mpsc;

use devpilot::{AgentConfig, Handled, LoopStatus, Orchestrator, PlanStrategy, Route, StreamEvent};
use devpilot_core::{ParamType, ToolCategory, ToolContext, ToolDescriptor, ToolParam};
use devpilot_llm::ScriptedCompletion;
use devpilot_tools::{ChannelConfirmation, FunctionTool, ToolRegistry};

fn shell_registry() -> Arc<ToolRegistry> {
    let mut registry = ToolRegistry::new();
    registry
        .register(Arc::new(FunctionTool::new(
            ToolDescriptor::new("shell", "Run a shell command", ToolCategory::Shell)
                .with_param(ToolParam::required("command", ParamType::String, "Command line")),
            |_ctx, args| async move {
                Ok(json!(format!(
                    "ran {}",
                    args["command"].as_str().unwrap_or_default()
                )))
            },
        )))
        .unwrap();
    Arc::new(registry)
}

fn session() -> ToolContext {
    ToolContext::new("session-1", "/workspace", "devpilot", "")
}

/// Answer every confirmation request with `approve` and collect events
/// until the stream ends.
fn respond(
    mut rx: mpsc::Receiver<StreamEvent>,
    confirmation: Arc<ChannelConfirmation>,
    approve: bool,
) -> tokio::task::JoinHandle<Vec<StreamEvent>> {
    tokio::spawn(async move {
        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            if let StreamEvent::ConfirmationRequest { request_id, .. } = &event {
                confirmation.resolve(request_id, approve);
            }
            let terminal = event.is_terminal();
            events.push(event);
            if terminal {
                break;
            }
        }
        events
    })
}

// ============================================================================
// Routing
// ============================================================================

#[tokio::test]
async fn test_planning_request_returns_plan_without_tool_calls() {
    let completion = Arc::new(ScriptedCompletion::from_replies(["unused"]));
    let orchestrator = Orchestrator::new(
        AgentConfig::default(),
        shell_registry(),
        completion.clone(),
    )
    .unwrap();
    let (tx, mut rx) = mpsc::channel(64);

    let handled = orchestrator
        .handle("Refactor the payment service into modules", None, &session(), tx)
        .await
        .unwrap();

    let Handled::Plan { multi_plan, plan } = handled else {
        panic!("expected a plan");
    };
    assert_eq!(multi_plan.plans.len(), 3);
    for strategy in [PlanStrategy::Standard, PlanStrategy::Accelerator, PlanStrategy::Lateral] {
        assert!(multi_plan.get_plan(strategy).is_some(), "missing {strategy}");
    }
    assert!(!plan.execution_batches().is_empty());
    assert_eq!(completion.calls(), 0, "planning must not consult the model");

    let mut text = String::new();
    while let Some(event) = rx.recv().await {
        if let StreamEvent::TextDelta { content } = event {
            text.push_str(&content);
        }
    }
    assert!(text.contains("## RECOMMENDATION"));
    assert!(text.contains(&format!("# {}", plan.title())));
}

#[tokio::test]
async fn test_custom_planning_vocabulary() {
    let config = AgentConfig {
        planning_keywords: vec!["migrate".to_string()],
        ..AgentConfig::default()
    };
    let orchestrator = Orchestrator::new(
        config,
        shell_registry(),
        Arc::new(ScriptedCompletion::from_replies(["ok"])),
    )
    .unwrap();

    assert_eq!(
        orchestrator.route("Migrate the database"),
        Route::Planning {
            keyword: "migrate".to_string()
        }
    );
    assert_eq!(orchestrator.route("refactor the parser"), Route::Direct);
}

// ============================================================================
// Guarded shell execution
// ============================================================================

#[tokio::test]
async fn test_approved_command_runs() {
    let (tx, rx) = mpsc::channel(64);
    let confirmation = Arc::new(ChannelConfirmation::new(tx.clone()));
    let orchestrator = Orchestrator::new(
        AgentConfig::default(),
        shell_registry(),
        Arc::new(ScriptedCompletion::from_replies([
            r#"TOOL: shell(command="cargo build")"#,
            "Build finished.",
        ])),
    )
    .unwrap()
    .with_confirmation(confirmation.clone());

    let responder = respond(rx, confirmation.clone(), true);
    let handled = orchestrator
        .handle("build the project", None, &session(), tx)
        .await
        .unwrap();
    let events = responder.await.unwrap();

    let Handled::Answer(outcome) = handled else {
        panic!("expected an answer");
    };
    assert_eq!(outcome.status, LoopStatus::Completed);
    assert_eq!(outcome.answer.as_deref(), Some("Build finished."));
    assert!(outcome.tool_calls[0].success);

    let request = events.iter().find_map(|e| match e {
        StreamEvent::ConfirmationRequest {
            description, tier, ..
        } => Some((description.clone(), tier.clone())),
        _ => None,
    });
    assert_eq!(
        request,
        Some(("cargo build".to_string(), "needs_confirmation".to_string()))
    );
    assert!(events.iter().any(|e| matches!(
        e,
        StreamEvent::ToolResult { success: true, output: Some(out), .. } if out.contains("ran cargo build")
    )));
    assert_eq!(confirmation.pending_count(), 0);
}

#[tokio::test]
async fn test_declined_command_fails_the_request() {
    let (tx, rx) = mpsc::channel(64);
    let confirmation = Arc::new(ChannelConfirmation::new(tx.clone()));
    let orchestrator = Orchestrator::new(
        AgentConfig::default(),
        shell_registry(),
        Arc::new(ScriptedCompletion::from_replies([
            r#"TOOL: shell(command="npm install")"#,
            "never reached",
        ])),
    )
    .unwrap()
    .with_confirmation(confirmation.clone());

    let responder = respond(rx, confirmation, false);
    let handled = orchestrator
        .handle("install dependencies", None, &session(), tx)
        .await
        .unwrap();
    let events = responder.await.unwrap();

    let Handled::Answer(outcome) = handled else {
        panic!("expected an answer");
    };
    assert_eq!(
        outcome.status,
        LoopStatus::ToolFailed {
            error: "blocked: confirmation declined".to_string()
        }
    );
    assert!(matches!(
        events.last(),
        Some(StreamEvent::Error { code: Some(code), .. }) if code == "tool_failed"
    ));
}

#[tokio::test]
async fn test_elevated_mode_confirms_dangerous_commands() {
    let (tx, rx) = mpsc::channel(64);
    let confirmation = Arc::new(ChannelConfirmation::new(tx.clone()));
    let config = AgentConfig {
        elevated: true,
        ..AgentConfig::default()
    };
    let orchestrator = Orchestrator::new(
        config,
        shell_registry(),
        Arc::new(ScriptedCompletion::from_replies([
            r#"TOOL: shell(command="rm -rf /tmp/build-cache")"#,
            "Cache cleared.",
        ])),
    )
    .unwrap()
    .with_confirmation(confirmation.clone());

    let responder = respond(rx, confirmation, true);
    let handled = orchestrator
        .handle("clear the cache", None, &session(), tx)
        .await
        .unwrap();
    let events = responder.await.unwrap();

    let Handled::Answer(outcome) = handled else {
        panic!("expected an answer");
    };
    assert_eq!(outcome.answer.as_deref(), Some("Cache cleared."));
    assert!(events.iter().any(|e| matches!(
        e,
        StreamEvent::ConfirmationRequest { tier, .. } if tier == "dangerous"
    )));
}

// ============================================================================
// Configuration
// ============================================================================

#[tokio::test]
async fn test_config_file_drives_orchestrator() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
max_turns = 2
planning_keywords = ["design"]

[safety]
extra_safe_prefixes = ["cargo check"]
"#
    )
    .unwrap();
    let config = AgentConfig::load(file.path()).unwrap();

    // No confirmation handler: only safe commands may run
    let orchestrator = Orchestrator::new(
        config,
        shell_registry(),
        Arc::new(ScriptedCompletion::repeating(devpilot_llm::ScriptedTurn::reply(
            r#"TOOL: shell(command="cargo check")"#,
        ))),
    )
    .unwrap();
    let (tx, _rx) = mpsc::channel(64);

    let handled = orchestrator
        .handle("check the build", None, &session(), tx)
        .await
        .unwrap();
    let Handled::Answer(outcome) = handled else {
        panic!("expected an answer");
    };
    assert_eq!(outcome.status, LoopStatus::TurnLimitReached);
    assert_eq!(outcome.turns, 2);
    assert_eq!(outcome.tool_calls.len(), 2);
    assert!(outcome.tool_calls.iter().all(|c| c.success));
}
