//! Tool Executor
//!
//! Bridges a tool-call request to a `ToolResult`: safety gate for shell-like
//! tools, confirmation, then bounded retry of environmental failures with an
//! optional argument fallback after the first failure. Every attempt is
//! recorded.
//!
//! Contract violations (`ToolNotFound`, `InvalidParameters`) are returned
//! before any attempt and never retried. Safety blocks, timeouts and
//! cancellation are terminal for the invocation.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use devpilot_core::{ToolContext, ToolDescriptor};

use crate::confirmation::{ConfirmationHandler, ConfirmationRequest};
use crate::registry::{RegistryError, ToolRegistry, ToolResult};
use crate::safety::{SafetyClassifier, SafetyTier};

/// Attempts per invocation when the caller does not say otherwise.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 2;

const BLOCKED_DANGEROUS: &str = "blocked: dangerous";
const BLOCKED_DECLINED: &str = "blocked: confirmation declined";

/// Outcome of one attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptOutcome {
    Success,
    Failure,
    /// Refused by the safety gate or declined confirmation
    Blocked,
    TimedOut,
    Cancelled,
}

/// Record of a single execution attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionAttempt {
    pub tool_name: String,
    /// 1-based
    pub attempt: u32,
    pub outcome: AttemptOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Whether arguments were rewritten by the fallback before this attempt
    pub fallback_applied: bool,
}

/// Final result plus the attempt log.
#[derive(Debug, Clone)]
pub struct ToolExecution {
    pub result: ToolResult,
    pub attempts: Vec<ExecutionAttempt>,
}

impl ToolExecution {
    pub fn is_blocked(&self) -> bool {
        self.last_outcome() == Some(AttemptOutcome::Blocked)
    }

    pub fn was_cancelled(&self) -> bool {
        self.last_outcome() == Some(AttemptOutcome::Cancelled)
    }

    fn last_outcome(&self) -> Option<AttemptOutcome> {
        self.attempts.last().map(|a| a.outcome)
    }
}

/// Rewrites arguments after a failed attempt (narrowing a path, dropping an
/// optional flag). Returning `None` retries with the same arguments.
pub trait ArgumentFallback: Send + Sync {
    fn transform(
        &self,
        tool_name: &str,
        args: &Map<String, Value>,
        error: &str,
    ) -> Option<Map<String, Value>>;
}

/// Plain executor configuration.
#[derive(Debug, Clone, Default)]
pub struct ExecutorSettings {
    /// Dangerous commands go to confirmation instead of being refused
    pub elevated: bool,
    /// Wall-clock limit per attempt; an expired attempt is terminal
    pub timeout: Option<Duration>,
}

enum GateDecision {
    Proceed,
    Stop(AttemptOutcome, &'static str),
}

enum Invocation {
    Finished(Result<ToolResult, RegistryError>),
    TimedOut(Duration),
    Cancelled,
}

/// Guarded, retrying tool executor.
///
/// Cheap to clone; shares the registry and classifier with every other
/// executor in the process.
#[derive(Clone)]
pub struct ToolExecutor {
    registry: Arc<ToolRegistry>,
    classifier: Arc<SafetyClassifier>,
    settings: ExecutorSettings,
    confirmer: Option<Arc<dyn ConfirmationHandler>>,
    fallback: Option<Arc<dyn ArgumentFallback>>,
}

impl ToolExecutor {
    pub fn new(
        registry: Arc<ToolRegistry>,
        classifier: Arc<SafetyClassifier>,
        settings: ExecutorSettings,
    ) -> Self {
        Self {
            registry,
            classifier,
            settings,
            confirmer: None,
            fallback: None,
        }
    }

    /// Handler consulted for commands that need approval. Without one,
    /// such commands are declined.
    pub fn with_confirmation(mut self, handler: Arc<dyn ConfirmationHandler>) -> Self {
        self.confirmer = Some(handler);
        self
    }

    pub fn with_fallback(mut self, fallback: Arc<dyn ArgumentFallback>) -> Self {
        self.fallback = Some(fallback);
        self
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    /// Execute `name` with up to `max_attempts` attempts (at least one).
    pub async fn execute(
        &self,
        ctx: &ToolContext,
        name: &str,
        args: Map<String, Value>,
        max_attempts: u32,
    ) -> Result<ToolExecution, RegistryError> {
        let descriptor = self
            .registry
            .get(name)
            .ok_or_else(|| RegistryError::ToolNotFound(name.to_string()))?;
        let mut current = self.registry.prepare(name, args)?;

        let max_attempts = max_attempts.max(1);
        let mut attempts: Vec<ExecutionAttempt> = Vec::new();
        let mut last_failure: Option<ToolResult> = None;
        let mut cleared: Option<Map<String, Value>> = None;

        for attempt in 1..=max_attempts {
            let mut fallback_applied = false;
            if let (Some(fallback), Some(failure)) = (&self.fallback, &last_failure) {
                let error = failure.error.as_deref().unwrap_or_default();
                if let Some(next) = fallback.transform(name, &current, error) {
                    tracing::debug!(tool = %name, attempt, "Applying argument fallback");
                    current = next;
                    fallback_applied = true;
                }
            }

            let record = |outcome, error: Option<String>| ExecutionAttempt {
                tool_name: name.to_string(),
                attempt,
                outcome,
                error,
                fallback_applied,
            };

            if ctx.is_cancelled() {
                attempts.push(record(AttemptOutcome::Cancelled, Some("cancelled".to_string())));
                return Ok(ToolExecution {
                    result: ToolResult::err("cancelled"),
                    attempts,
                });
            }

            if cleared.as_ref() != Some(&current) {
                match self.gate(ctx, descriptor, &current).await {
                    GateDecision::Proceed => cleared = Some(current.clone()),
                    GateDecision::Stop(outcome, message) => {
                        attempts.push(record(outcome, Some(message.to_string())));
                        return Ok(ToolExecution {
                            result: ToolResult::err(message),
                            attempts,
                        });
                    }
                }
            }

            match self.invoke_once(ctx, name, current.clone()).await {
                Invocation::Cancelled => {
                    tracing::info!(tool = %name, attempt, "Tool call cancelled");
                    attempts.push(record(AttemptOutcome::Cancelled, Some("cancelled".to_string())));
                    return Ok(ToolExecution {
                        result: ToolResult::err("cancelled"),
                        attempts,
                    });
                }
                Invocation::TimedOut(limit) => {
                    let message = format!("timed out after {}ms", limit.as_millis());
                    tracing::warn!(tool = %name, attempt, "Tool call {}", message);
                    attempts.push(record(AttemptOutcome::TimedOut, Some(message.clone())));
                    return Ok(ToolExecution {
                        result: ToolResult::err(message),
                        attempts,
                    });
                }
                Invocation::Finished(Err(err)) => {
                    // Fallback produced arguments the schema rejects: surface
                    // the last environmental failure instead.
                    match last_failure {
                        Some(failure) if attempt > 1 => {
                            tracing::warn!(tool = %name, error = %err, "Fallback arguments rejected");
                            attempts.push(record(AttemptOutcome::Failure, Some(err.to_string())));
                            return Ok(ToolExecution {
                                result: failure,
                                attempts,
                            });
                        }
                        _ => return Err(err),
                    }
                }
                Invocation::Finished(Ok(result)) if result.success => {
                    attempts.push(record(AttemptOutcome::Success, None));
                    return Ok(ToolExecution { result, attempts });
                }
                Invocation::Finished(Ok(result)) => {
                    tracing::warn!(
                        tool = %name,
                        attempt,
                        max_attempts,
                        error = result.error.as_deref().unwrap_or_default(),
                        "Tool attempt failed"
                    );
                    attempts.push(record(AttemptOutcome::Failure, result.error.clone()));
                    last_failure = Some(result);
                }
            }
        }

        Ok(ToolExecution {
            result: last_failure.unwrap_or_else(|| ToolResult::err("no attempts made")),
            attempts,
        })
    }

    /// Safety gate. Only shell-like tools are classified.
    async fn gate(
        &self,
        ctx: &ToolContext,
        descriptor: &ToolDescriptor,
        args: &Map<String, Value>,
    ) -> GateDecision {
        if !descriptor.is_shell() {
            return GateDecision::Proceed;
        }

        let command = args
            .get("command")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let tier = self.classifier.classify(command);
        tracing::debug!(tool = %descriptor.name, %tier, command, "Classified command");

        match tier {
            SafetyTier::Safe => GateDecision::Proceed,
            SafetyTier::Dangerous if !self.settings.elevated => {
                tracing::warn!(tool = %descriptor.name, command, "Refusing dangerous command");
                GateDecision::Stop(AttemptOutcome::Blocked, BLOCKED_DANGEROUS)
            }
            SafetyTier::Dangerous | SafetyTier::NeedsConfirmation => {
                let Some(confirmer) = &self.confirmer else {
                    return GateDecision::Stop(AttemptOutcome::Blocked, BLOCKED_DECLINED);
                };
                let request = ConfirmationRequest {
                    session_id: ctx.session_id().to_string(),
                    tool_name: descriptor.name.clone(),
                    description: command.to_string(),
                    tier,
                };
                tokio::select! {
                    biased;
                    _ = ctx.cancellation().cancelled() => {
                        GateDecision::Stop(AttemptOutcome::Cancelled, "cancelled")
                    }
                    approved = confirmer.confirm(&request) => {
                        if approved {
                            GateDecision::Proceed
                        } else {
                            tracing::info!(tool = %descriptor.name, command, "Confirmation declined");
                            GateDecision::Stop(AttemptOutcome::Blocked, BLOCKED_DECLINED)
                        }
                    }
                }
            }
        }
    }

    async fn invoke_once(
        &self,
        ctx: &ToolContext,
        name: &str,
        args: Map<String, Value>,
    ) -> Invocation {
        let call = self.registry.invoke(name, ctx, args);
        let bounded = async {
            match self.settings.timeout {
                Some(limit) => match tokio::time::timeout(limit, call).await {
                    Ok(finished) => Invocation::Finished(finished),
                    Err(_) => Invocation::TimedOut(limit),
                },
                None => Invocation::Finished(call.await),
            }
        };
        tokio::select! {
            biased;
            _ = ctx.cancellation().cancelled() => Invocation::Cancelled,
            invocation = bounded => invocation,
        }
    }
}
