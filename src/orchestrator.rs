//! Orchestrator
//!
//! Session-facing entry point. Built once at startup with a fully
//! populated registry, then shared by every request: the intent router
//! decides whether a request gets an up-front plan for review or goes
//! straight to the ReAct loop.

use std::sync::Arc;

use tokio::sync::mpsc;

use devpilot_core::{StreamEvent, Tool, ToolContext};
use devpilot_llm::CompletionService;
use devpilot_tools::{
    register_builtin_tools, ArgumentFallback, ConfirmationHandler, ExecutorSettings,
    SafetyClassifier, ToolExecutor, ToolRegistry,
};

use crate::config::AgentConfig;
use crate::error::OrchestratorResult;
use crate::planning::{
    CandidateSource, ClarificationResponse, ExecutionPlan, HeuristicCandidateSource,
    MultiPlanGenerator, MultiPlanResult, SelectionError,
};
use crate::react::{emit, emit_terminal, LoopOutcome, LoopSettings, ReActLoop};
use crate::routing::{IntentRouter, Route};

/// What `handle` produced.
#[derive(Debug)]
pub enum Handled {
    /// The request was planned; nothing has executed yet
    Plan {
        multi_plan: MultiPlanResult,
        plan: ExecutionPlan,
    },
    /// The request ran through the ReAct loop
    Answer(LoopOutcome),
}

pub struct Orchestrator {
    config: AgentConfig,
    registry: Arc<ToolRegistry>,
    classifier: Arc<SafetyClassifier>,
    completion: Arc<dyn CompletionService>,
    router: IntentRouter,
    generator: MultiPlanGenerator,
    confirmer: Option<Arc<dyn ConfirmationHandler>>,
    fallback: Option<Arc<dyn ArgumentFallback>>,
}

impl Orchestrator {
    pub fn new(
        config: AgentConfig,
        registry: Arc<ToolRegistry>,
        completion: Arc<dyn CompletionService>,
    ) -> OrchestratorResult<Self> {
        config.validate()?;

        let classifier = Arc::new(SafetyClassifier::extended(
            &config.safety.extra_safe_prefixes,
            &config.safety.extra_dangerous_patterns,
        ));
        let router = IntentRouter::new(&config.planning_keywords);

        tracing::info!(
            tools = registry.len(),
            completion = %completion.name(),
            elevated = config.elevated,
            "Orchestrator ready"
        );

        Ok(Self {
            config,
            registry,
            classifier,
            completion,
            router,
            generator: MultiPlanGenerator::new(Arc::new(HeuristicCandidateSource)),
            confirmer: None,
            fallback: None,
        })
    }

    /// Orchestrator over the built-in tools plus `extra` ones. A name that
    /// collides with a built-in is rejected.
    pub fn with_builtin_tools(
        config: AgentConfig,
        extra: Vec<Arc<dyn Tool>>,
        completion: Arc<dyn CompletionService>,
    ) -> OrchestratorResult<Self> {
        let mut registry = ToolRegistry::new();
        register_builtin_tools(&mut registry)?;
        for tool in extra {
            registry.register(tool)?;
        }
        Self::new(config, Arc::new(registry), completion)
    }

    /// Approval handler for commands that need confirmation.
    pub fn with_confirmation(mut self, handler: Arc<dyn ConfirmationHandler>) -> Self {
        self.confirmer = Some(handler);
        self
    }

    pub fn with_fallback(mut self, fallback: Arc<dyn ArgumentFallback>) -> Self {
        self.fallback = Some(fallback);
        self
    }

    /// Replace the heuristic source of candidate plans.
    pub fn with_candidate_source(mut self, source: Arc<dyn CandidateSource>) -> Self {
        self.generator = MultiPlanGenerator::new(source);
        self
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    pub fn route(&self, request: &str) -> Route {
        self.router.route(request)
    }

    /// A guarded executor sharing this orchestrator's registry and
    /// classifier.
    pub fn executor(&self) -> ToolExecutor {
        let mut executor = ToolExecutor::new(
            Arc::clone(&self.registry),
            Arc::clone(&self.classifier),
            ExecutorSettings {
                elevated: self.config.elevated,
                timeout: self.config.tool_timeout(),
            },
        );
        if let Some(confirmer) = &self.confirmer {
            executor = executor.with_confirmation(Arc::clone(confirmer));
        }
        if let Some(fallback) = &self.fallback {
            executor = executor.with_fallback(Arc::clone(fallback));
        }
        executor
    }

    pub fn react_loop(&self) -> ReActLoop {
        ReActLoop::new(
            Arc::clone(&self.completion),
            self.executor(),
            LoopSettings::from(&self.config),
        )
    }

    /// Generate alternatives and finalize the recommended one with the
    /// collected clarifications attached.
    pub async fn plan(
        &self,
        request: &str,
        clarifications: Vec<ClarificationResponse>,
    ) -> OrchestratorResult<(MultiPlanResult, ExecutionPlan)> {
        let multi_plan = self.generator.generate(request).await?;
        let mut draft = multi_plan
            .get_recommended()
            .map(|candidate| candidate.plan.clone())
            .ok_or(SelectionError::EmptyCandidateSet)?;
        draft.set_clarifications(clarifications);
        let plan = draft.finalize()?;
        Ok((multi_plan, plan))
    }

    /// Route a request and either plan it or run it.
    pub async fn handle(
        &self,
        request: &str,
        context: Option<&str>,
        session: &ToolContext,
        events: mpsc::Sender<StreamEvent>,
    ) -> OrchestratorResult<Handled> {
        match self.route(request) {
            Route::Planning { keyword } => {
                tracing::info!(keyword = %keyword, session = %session.session_id(), "Planning request");
                let cancel = session.cancellation();
                let (multi_plan, plan) = match self.plan(request, Vec::new()).await {
                    Ok(planned) => planned,
                    Err(e) => {
                        emit_terminal(
                            &events,
                            cancel,
                            StreamEvent::error(e.to_string(), Some("planning_failed")),
                        )
                        .await;
                        return Err(e);
                    }
                };

                // A cancelled session still gets the plan back, just not the stream
                let delivered = emit(&events, cancel, StreamEvent::text(multi_plan.to_markdown()))
                    .await
                    && emit(
                        &events,
                        cancel,
                        StreamEvent::text(format!("\n\n{}", plan.to_artifact_text())),
                    )
                    .await;
                if delivered {
                    emit_terminal(
                        &events,
                        cancel,
                        StreamEvent::Complete {
                            stop_reason: Some("plan_ready".to_string()),
                        },
                    )
                    .await;
                }
                Ok(Handled::Plan { multi_plan, plan })
            }
            Route::Direct => {
                let outcome = self
                    .react_loop()
                    .run(request, context, session, events)
                    .await;
                Ok(Handled::Answer(outcome))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use devpilot_llm::ScriptedCompletion;

    use crate::config::ConfigError;
    use crate::error::OrchestratorError;
    use crate::planning::{AlternativePlan, ClarifyingQuestion, PlanError, PlanStrategy};
    use crate::react::LoopStatus;

    fn orchestrator(replies: &[&str]) -> Orchestrator {
        Orchestrator::new(
            AgentConfig::default(),
            Arc::new(ToolRegistry::new()),
            Arc::new(ScriptedCompletion::from_replies(replies.iter().copied())),
        )
        .unwrap()
    }

    fn session() -> ToolContext {
        ToolContext::new("s1", "/repo", "devpilot", "")
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = AgentConfig {
            max_turns: 0,
            ..AgentConfig::default()
        };
        let result = Orchestrator::new(
            config,
            Arc::new(ToolRegistry::new()),
            Arc::new(ScriptedCompletion::from_replies(Vec::<String>::new())),
        );
        assert!(matches!(
            result.err(),
            Some(OrchestratorError::Config(ConfigError::Invalid(_)))
        ));
    }

    #[tokio::test]
    async fn test_planning_route() {
        let orchestrator = orchestrator(&[]);
        let (tx, mut rx) = mpsc::channel(16);

        let handled = orchestrator
            .handle("refactor the auth module", None, &session(), tx)
            .await
            .unwrap();
        match handled {
            Handled::Plan { multi_plan, plan } => {
                assert_eq!(multi_plan.plans.len(), 3);
                assert!(plan.total_steps() > 0);
            }
            other => panic!("expected a plan, got {other:?}"),
        }

        let mut last = None;
        while let Some(event) = rx.recv().await {
            last = Some(event);
        }
        assert_eq!(
            last,
            Some(StreamEvent::Complete {
                stop_reason: Some("plan_ready".to_string())
            })
        );
    }

    #[tokio::test]
    async fn test_cancelled_planning_does_not_wait_on_listener() {
        let orchestrator = orchestrator(&[]);
        let token = tokio_util::sync::CancellationToken::new();
        token.cancel();
        let session = session().with_cancellation(token);
        let (tx, mut rx) = mpsc::channel(1);
        tx.send(StreamEvent::text("backlog")).await.unwrap();

        let handled = tokio::time::timeout(
            std::time::Duration::from_secs(2),
            orchestrator.handle("refactor the auth module", None, &session, tx),
        )
        .await
        .expect("full channel must not block a cancelled session")
        .unwrap();
        assert!(matches!(handled, Handled::Plan { .. }));
        assert_eq!(rx.recv().await, Some(StreamEvent::text("backlog")));
        assert_eq!(rx.recv().await, None);
    }

    #[test]
    fn test_builtin_tools_registered() {
        let orchestrator = Orchestrator::with_builtin_tools(
            AgentConfig::default(),
            Vec::new(),
            Arc::new(ScriptedCompletion::from_replies(["ok"])),
        )
        .unwrap();
        for name in ["read_file", "write_file", "list_dir", "search", "shell", "git_status"] {
            assert!(orchestrator.registry().get(name).is_some(), "missing {name}");
        }
    }

    #[test]
    fn test_extra_tool_colliding_with_builtin() {
        let shadow: Arc<dyn Tool> = Arc::new(devpilot_tools::FunctionTool::new(
            devpilot_core::ToolDescriptor::new("shell", "Shadow", devpilot_core::ToolCategory::Custom),
            |_ctx, _args| async move { Ok(serde_json::json!("shadowed")) },
        ));
        let result = Orchestrator::with_builtin_tools(
            AgentConfig::default(),
            vec![shadow],
            Arc::new(ScriptedCompletion::from_replies(["ok"])),
        );
        assert!(matches!(
            result.err(),
            Some(OrchestratorError::Registry(devpilot_tools::RegistryError::DuplicateToolName(name))) if name == "shell"
        ));
    }

    #[tokio::test]
    async fn test_direct_route() {
        let orchestrator = orchestrator(&["All good."]);
        let (tx, _rx) = mpsc::channel(16);

        let handled = orchestrator
            .handle("explain the build", None, &session(), tx)
            .await
            .unwrap();
        match handled {
            Handled::Answer(outcome) => {
                assert_eq!(outcome.status, LoopStatus::Completed);
                assert_eq!(outcome.answer.as_deref(), Some("All good."));
            }
            other => panic!("expected an answer, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_plan_records_clarifications() {
        let orchestrator = orchestrator(&[]);
        let question = ClarifyingQuestion::new("Keep the public API?", "constraints");
        let (multi_plan, plan) = orchestrator
            .plan("redesign the cache", vec![question.answer("yes")])
            .await
            .unwrap();
        assert_eq!(plan.clarifications().len(), 1);
        let recommended = multi_plan.get_recommended().unwrap();
        assert_eq!(plan.title(), recommended.plan.title());
    }

    struct Failing;

    #[async_trait]
    impl CandidateSource for Failing {
        async fn propose(
            &self,
            _task: &str,
            _strategy: PlanStrategy,
        ) -> Result<AlternativePlan, PlanError> {
            Err(PlanError::UnknownStage(1))
        }
    }

    #[tokio::test]
    async fn test_planning_failure_is_reported() {
        let orchestrator = orchestrator(&[]).with_candidate_source(Arc::new(Failing));
        let (tx, mut rx) = mpsc::channel(16);

        let err = orchestrator
            .handle("plan the release", None, &session(), tx)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            OrchestratorError::Selection(SelectionError::EmptyCandidateSet)
        ));
        assert!(matches!(
            rx.recv().await,
            Some(StreamEvent::Error { code: Some(code), .. }) if code == "planning_failed"
        ));
    }
}
