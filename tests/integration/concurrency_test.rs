//! Concurrency Integration Tests
//!
//! One orchestrator and one frozen registry serve many sessions at once.
//! Sessions must not observe each other's cancellation or limits.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use serde_json::json;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use devpilot::{AgentConfig, Handled, LoopState, LoopStatus, Orchestrator};
use devpilot_core::{ParamType, ToolCategory, ToolContext, ToolDescriptor, ToolParam};
use devpilot_llm::{ScriptedCompletion, ScriptedTurn};
use devpilot_tools::{FunctionTool, ToolRegistry};

fn counting_registry(counter: Arc<AtomicUsize>) -> Arc<ToolRegistry> {
    let mut registry = ToolRegistry::new();
    registry
        .register(Arc::new(FunctionTool::new(
            ToolDescriptor::new("grep", "Search files", ToolCategory::Search)
                .with_param(ToolParam::required("pattern", ParamType::String, "Pattern")),
            move |ctx, _args| {
                let counter = Arc::clone(&counter);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    Ok(json!(format!("matches in {}", ctx.session_id())))
                }
            },
        )))
        .unwrap();
    Arc::new(registry)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_sessions_share_registry() {
    let counter = Arc::new(AtomicUsize::new(0));
    let orchestrator = Orchestrator::new(
        AgentConfig::default(),
        counting_registry(Arc::clone(&counter)),
        Arc::new(ScriptedCompletion::repeating(ScriptedTurn::reply(
            r#"TOOL: grep(pattern="fn main")"#,
        ))),
    )
    .unwrap();

    let runs = (0..8).map(|i| {
        let orchestrator = &orchestrator;
        async move {
            let session = ToolContext::new(format!("session-{i}"), "/repo", "devpilot", "");
            let (tx, _rx) = mpsc::channel(256);
            orchestrator
                .handle("find the entry point", None, &session, tx)
                .await
        }
    });
    let results = join_all(runs).await;

    for result in results {
        let Ok(Handled::Answer(outcome)) = result else {
            panic!("expected an answer");
        };
        assert_eq!(outcome.status, LoopStatus::TurnLimitReached);
        assert_eq!(outcome.tool_calls.len(), 5);
        assert!(outcome.tool_calls.iter().all(|c| c.success));
    }
    assert_eq!(counter.load(Ordering::SeqCst), 40);
}

#[tokio::test]
async fn test_cancellation_is_per_session() {
    let counter = Arc::new(AtomicUsize::new(0));
    let completion = Arc::new(ScriptedCompletion::repeating(ScriptedTurn::Delayed {
        chunks: vec!["Still ".to_string(), "thinking.".to_string()],
        delay: Duration::from_millis(50),
    }));
    let orchestrator =
        Orchestrator::new(AgentConfig::default(), counting_registry(counter), completion).unwrap();

    let token = CancellationToken::new();
    let cancelled = ToolContext::new("cancelled", "/repo", "devpilot", "")
        .with_cancellation(token.clone());
    let survivor = ToolContext::new("survivor", "/repo", "devpilot", "");

    let canceller = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        token.cancel();
    });

    let (tx_a, _rx_a) = mpsc::channel(64);
    let (tx_b, _rx_b) = mpsc::channel(64);
    let (a, b) = tokio::join!(
        orchestrator.handle("explain main", None, &cancelled, tx_a),
        orchestrator.handle("explain main", None, &survivor, tx_b),
    );
    canceller.await.unwrap();

    let Ok(Handled::Answer(a)) = a else {
        panic!("expected an answer");
    };
    assert_eq!(a.status, LoopStatus::Cancelled);
    assert_eq!(a.final_state, LoopState::Aborted);

    let Ok(Handled::Answer(b)) = b else {
        panic!("expected an answer");
    };
    assert_eq!(b.status, LoopStatus::Completed);
    assert_eq!(b.answer.as_deref(), Some("Still thinking."));
}
