//! ReAct Loop
//!
//! Turn-bounded reason/act cycle over an external completion service:
//!
//! ```text
//! Start -> Prompting -> AwaitingModelOutput -> ParsingForToolCall
//!                          ^                      |          |
//!                          |                      v          v
//!                          +----------------- ExecutingTool  Done
//! ```
//!
//! `Aborted` is reachable from any suspension point once the session's
//! cancellation token fires. Tool calls within one loop are strictly
//! sequential; a result is folded into history before the next turn starts.

use std::sync::Arc;

use futures_util::StreamExt;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use devpilot_core::{StreamEvent, ToolContext};
use devpilot_llm::{CompletionService, LlmError, Message};
use devpilot_tools::{
    build_directive_instructions, parse_directive, ToolDirective, ToolExecutor, ToolResult,
};

use crate::config::AgentConfig;

const TRUNCATION_MARKER: &str = "\n... (truncated)";

/// Loop states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopState {
    Start,
    Prompting,
    AwaitingModelOutput,
    ParsingForToolCall,
    ExecutingTool,
    Done,
    Aborted,
}

/// Why the loop stopped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum LoopStatus {
    /// The model answered without requesting a tool
    Completed,
    /// The turn bound was reached after a successful tool call
    TurnLimitReached,
    /// A tool call failed or was refused
    ToolFailed { error: String },
    /// The completion stream could not start or broke mid-turn
    CompletionFailed { error: String },
    Cancelled,
}

impl LoopStatus {
    fn stop_reason(&self) -> &'static str {
        match self {
            LoopStatus::Completed => "end_turn",
            LoopStatus::TurnLimitReached => "max_turns",
            LoopStatus::ToolFailed { .. } => "tool_failed",
            LoopStatus::CompletionFailed { .. } => "completion_failed",
            LoopStatus::Cancelled => "cancelled",
        }
    }
}

/// One tool call made by the loop.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolCallRecord {
    pub turn: usize,
    pub tool_id: String,
    pub tool_name: String,
    pub arguments: serde_json::Map<String, Value>,
    pub success: bool,
    /// Executor attempts; zero when the call was rejected before running
    pub attempts: usize,
}

/// Result of one loop run.
#[derive(Debug, Clone)]
pub struct LoopOutcome {
    pub status: LoopStatus,
    /// `Done` or `Aborted`
    pub final_state: LoopState,
    /// Final model output, when there is one
    pub answer: Option<String>,
    /// Model turns started
    pub turns: usize,
    pub tool_calls: Vec<ToolCallRecord>,
    /// Full message history, system message first
    pub history: Vec<Message>,
}

impl LoopOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self.status, LoopStatus::Completed | LoopStatus::TurnLimitReached)
    }
}

/// Per-loop limits.
#[derive(Debug, Clone)]
pub struct LoopSettings {
    pub max_turns: usize,
    pub max_attempts: u32,
    pub tool_output_limit: usize,
    pub assistant_name: String,
}

impl Default for LoopSettings {
    fn default() -> Self {
        Self::from(&AgentConfig::default())
    }
}

impl From<&AgentConfig> for LoopSettings {
    fn from(config: &AgentConfig) -> Self {
        Self {
            max_turns: config.max_turns.max(1),
            max_attempts: config.max_attempts.max(1),
            tool_output_limit: config.tool_output_limit,
            assistant_name: config.assistant_name.clone(),
        }
    }
}

enum TurnOutput {
    Finished(String),
    Failed(LlmError),
    Cancelled,
}

/// Drives one request at a time; cheap to share between tasks.
#[derive(Clone)]
pub struct ReActLoop {
    completion: Arc<dyn CompletionService>,
    executor: ToolExecutor,
    settings: LoopSettings,
}

impl ReActLoop {
    pub fn new(
        completion: Arc<dyn CompletionService>,
        executor: ToolExecutor,
        settings: LoopSettings,
    ) -> Self {
        Self {
            completion,
            executor,
            settings,
        }
    }

    pub fn settings(&self) -> &LoopSettings {
        &self.settings
    }

    /// Run a request to completion.
    ///
    /// Chunks, tool activity and a terminal `Complete` or `Error` event are
    /// sent to `events`. A closed receiver does not stop the loop.
    pub async fn run(
        &self,
        request: &str,
        context: Option<&str>,
        session: &ToolContext,
        events: mpsc::Sender<StreamEvent>,
    ) -> LoopOutcome {
        let cancel = session.cancellation().clone();
        let mut state = LoopState::Start;
        let mut history: Vec<Message> = Vec::new();
        let mut turn = 0usize;
        let mut output = String::new();
        let mut pending: Option<ToolDirective> = None;
        let mut tool_calls: Vec<ToolCallRecord> = Vec::new();
        let mut status = LoopStatus::Completed;
        let mut answer: Option<String> = None;

        loop {
            tracing::trace!(state = ?state, turn, session = %session.session_id(), "ReAct state");
            state = match state {
                LoopState::Start => {
                    if cancel.is_cancelled() {
                        status = LoopStatus::Cancelled;
                        LoopState::Aborted
                    } else {
                        LoopState::Prompting
                    }
                }

                LoopState::Prompting => {
                    history.push(Message::system(self.system_prompt(session, context)));
                    history.push(Message::user(request));
                    LoopState::AwaitingModelOutput
                }

                LoopState::AwaitingModelOutput => {
                    if cancel.is_cancelled() {
                        status = LoopStatus::Cancelled;
                        LoopState::Aborted
                    } else {
                        turn += 1;
                        let turn_output = if emit(&events, &cancel, StreamEvent::TurnStart { turn }).await {
                            self.stream_turn(&history, &cancel, &events).await
                        } else {
                            TurnOutput::Cancelled
                        };
                        match turn_output {
                            TurnOutput::Finished(text) => {
                                output = text;
                                LoopState::ParsingForToolCall
                            }
                            TurnOutput::Failed(e) => {
                                tracing::warn!(turn, error = %e, "Completion stream failed");
                                emit_terminal(
                                    &events,
                                    &cancel,
                                    StreamEvent::error(e.to_string(), Some("completion_failed")),
                                )
                                .await;
                                status = LoopStatus::CompletionFailed {
                                    error: e.to_string(),
                                };
                                LoopState::Done
                            }
                            TurnOutput::Cancelled => {
                                status = LoopStatus::Cancelled;
                                LoopState::Aborted
                            }
                        }
                    }
                }

                LoopState::ParsingForToolCall => match parse_directive(&output) {
                    Some(directive) => {
                        tracing::debug!(turn, tool = %directive.name, "Tool directive found");
                        pending = Some(directive);
                        LoopState::ExecutingTool
                    }
                    None => {
                        answer = Some(output.clone());
                        LoopState::Done
                    }
                },

                LoopState::ExecutingTool => match pending.take() {
                    None => {
                        answer = Some(output.clone());
                        LoopState::Done
                    }
                    Some(directive) => {
                        let (result, record, cancelled) = self
                            .execute_directive(turn, directive, session, &cancel, &events)
                            .await;
                        tool_calls.push(record);

                        history.push(Message::assistant(output.clone()));
                        history.push(Message::tool(format!(
                            "Tool output: {}",
                            truncate(&result.to_content(), self.settings.tool_output_limit)
                        )));

                        if cancelled {
                            status = LoopStatus::Cancelled;
                            LoopState::Aborted
                        } else if !result.success {
                            let error = result.error.unwrap_or_else(|| "tool failed".to_string());
                            emit_terminal(
                                &events,
                                &cancel,
                                StreamEvent::error(error.clone(), Some("tool_failed")),
                            )
                            .await;
                            status = LoopStatus::ToolFailed { error };
                            LoopState::Done
                        } else if turn >= self.settings.max_turns {
                            tracing::info!(turn, "Turn limit reached");
                            status = LoopStatus::TurnLimitReached;
                            answer = Some(output.clone());
                            LoopState::Done
                        } else {
                            LoopState::AwaitingModelOutput
                        }
                    }
                },

                LoopState::Done | LoopState::Aborted => break,
            };
        }

        // Failures already ended the stream with an Error event
        if matches!(
            status,
            LoopStatus::Completed | LoopStatus::TurnLimitReached | LoopStatus::Cancelled
        ) {
            emit_terminal(
                &events,
                &cancel,
                StreamEvent::Complete {
                    stop_reason: Some(status.stop_reason().to_string()),
                },
            )
            .await;
        }

        tracing::info!(
            session = %session.session_id(),
            turns = turn,
            tool_calls = tool_calls.len(),
            stop_reason = status.stop_reason(),
            "ReAct loop finished"
        );

        LoopOutcome {
            status,
            final_state: state,
            answer,
            turns: turn,
            tool_calls,
            history,
        }
    }

    /// Built once per request, before the first turn.
    fn system_prompt(&self, session: &ToolContext, context: Option<&str>) -> String {
        let mut prompt = format!(
            "You are {}, a coding assistant working in {}.\n\n",
            self.settings.assistant_name,
            session.working_dir().display()
        );

        if let Some(context) = context.map(str::trim).filter(|c| !c.is_empty()) {
            prompt.push_str("## Context\n");
            prompt.push_str(context);
            prompt.push_str("\n\n");
        }

        let catalog = self.executor.registry().catalog_prompt();
        prompt.push_str("## Available Tools\n");
        if catalog.is_empty() {
            prompt.push_str("(none)\n");
        } else {
            prompt.push_str(&catalog);
        }
        prompt.push('\n');

        prompt.push_str("## Tool Use\n");
        prompt.push_str(&build_directive_instructions());
        prompt.push_str("\n\nBe concise. Use Markdown for formatting.");
        prompt
    }

    /// Stream one model turn, forwarding chunks as they arrive.
    async fn stream_turn(
        &self,
        history: &[Message],
        cancel: &CancellationToken,
        events: &mpsc::Sender<StreamEvent>,
    ) -> TurnOutput {
        let started = tokio::select! {
            biased;
            _ = cancel.cancelled() => return TurnOutput::Cancelled,
            started = self.completion.stream_completion(history.to_vec()) => started,
        };
        let mut stream = match started {
            Ok(stream) => stream,
            Err(e) => return TurnOutput::Failed(e),
        };

        let mut text = String::new();
        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => return TurnOutput::Cancelled,
                next = stream.next() => next,
            };
            match next {
                Some(Ok(chunk)) => {
                    if chunk.is_empty() {
                        continue;
                    }
                    text.push_str(&chunk);
                    if !emit(events, cancel, StreamEvent::text(chunk)).await {
                        return TurnOutput::Cancelled;
                    }
                }
                Some(Err(e)) => return TurnOutput::Failed(e),
                None => return TurnOutput::Finished(text),
            }
        }
    }

    async fn execute_directive(
        &self,
        turn: usize,
        directive: ToolDirective,
        session: &ToolContext,
        cancel: &CancellationToken,
        events: &mpsc::Sender<StreamEvent>,
    ) -> (ToolResult, ToolCallRecord, bool) {
        let tool_id = format!("call_{}", &Uuid::new_v4().simple().to_string()[..8]);
        let start = StreamEvent::ToolStart {
            tool_id: tool_id.clone(),
            tool_name: directive.name.clone(),
            arguments: Value::Object(directive.arguments.clone()).to_string(),
        };
        if !emit(events, cancel, start).await {
            let record = ToolCallRecord {
                turn,
                tool_id,
                tool_name: directive.name,
                arguments: directive.arguments,
                success: false,
                attempts: 0,
            };
            return (ToolResult::err("cancelled"), record, true);
        }

        let execution = self
            .executor
            .execute(
                &session.for_call(tool_id.clone()),
                &directive.name,
                directive.arguments.clone(),
                self.settings.max_attempts,
            )
            .await;

        // Contract violations from model-authored directives are reported
        // back to the model like any other failed call
        let (result, attempts, mut cancelled) = match execution {
            Ok(execution) => {
                let attempts = execution.attempts.len();
                let cancelled = execution.was_cancelled();
                (execution.result, attempts, cancelled)
            }
            Err(e) => {
                tracing::warn!(tool = %directive.name, error = %e, "Tool call rejected");
                (ToolResult::err(e.to_string()), 0, false)
            }
        };

        let content = result.to_content();
        let finished = StreamEvent::ToolResult {
            tool_id: tool_id.clone(),
            tool_name: directive.name.clone(),
            success: result.success,
            output: result
                .success
                .then(|| truncate(&content, self.settings.tool_output_limit)),
            error: result.error.clone(),
        };
        if !emit(events, cancel, finished).await {
            cancelled = true;
        }

        let record = ToolCallRecord {
            turn,
            tool_id,
            tool_name: directive.name,
            arguments: directive.arguments,
            success: result.success,
            attempts,
        };
        (result, record, cancelled)
    }
}

/// Send `event` unless the session is cancelled first.
///
/// Returns `false` when cancellation won; a closed receiver counts as
/// delivered so the loop keeps going without a listener.
pub(crate) async fn emit(
    events: &mpsc::Sender<StreamEvent>,
    cancel: &CancellationToken,
    event: StreamEvent,
) -> bool {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => false,
        _ = events.send(event) => true,
    }
}

/// Best-effort terminal event: never waits on a full channel once the
/// session is cancelled.
pub(crate) async fn emit_terminal(
    events: &mpsc::Sender<StreamEvent>,
    cancel: &CancellationToken,
    event: StreamEvent,
) {
    if cancel.is_cancelled() {
        let _ = events.try_send(event);
    } else {
        emit(events, cancel, event).await;
    }
}

/// Cap `text` at `limit` characters.
fn truncate(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((cut, _)) => format!("{}{}", &text[..cut], TRUNCATION_MARKER),
        None => text.to_string(),
    }
}
