//! Scripted Completion Service
//!
//! An in-memory `CompletionService` that replays pre-recorded turns in
//! order. Used by tests and offline runs; it also records every history it
//! receives so callers can assert on what the model was shown.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::{self, StreamExt};

use crate::provider::{ChunkStream, CompletionService};
use crate::types::{LlmError, LlmResult, Message};

/// One scripted model response.
#[derive(Debug, Clone)]
pub enum ScriptedTurn {
    /// Emit the chunks in order, then end normally
    Chunks(Vec<String>),
    /// Emit the chunks, pausing before each one
    Delayed { chunks: Vec<String>, delay: Duration },
    /// Emit the chunks, then fail the stream
    FailAfter { chunks: Vec<String>, message: String },
    /// Refuse to start the stream
    Refuse(String),
    /// Never produce a chunk
    Hang,
}

impl ScriptedTurn {
    /// A single-chunk response.
    pub fn reply(text: impl Into<String>) -> Self {
        Self::Chunks(vec![text.into()])
    }

    fn into_stream(self) -> LlmResult<ChunkStream> {
        match self {
            ScriptedTurn::Chunks(chunks) => Ok(stream::iter(chunks.into_iter().map(Ok)).boxed()),
            ScriptedTurn::Delayed { chunks, delay } => Ok(stream::unfold(
                chunks.into_iter(),
                move |mut rest| async move {
                    let next = rest.next()?;
                    tokio::time::sleep(delay).await;
                    Some((Ok(next), rest))
                },
            )
            .boxed()),
            ScriptedTurn::FailAfter { chunks, message } => Ok(stream::iter(
                chunks
                    .into_iter()
                    .map(Ok)
                    .chain(std::iter::once(Err(LlmError::stream_failed(message)))),
            )
            .boxed()),
            ScriptedTurn::Refuse(message) => Err(LlmError::NetworkError { message }),
            ScriptedTurn::Hang => Ok(stream::pending().boxed()),
        }
    }
}

/// Replays scripted turns. Once the script runs out, the final turn repeats
/// when `repeat_last` is set; otherwise an empty reply is produced.
pub struct ScriptedCompletion {
    name: String,
    turns: Mutex<VecDeque<ScriptedTurn>>,
    last: Mutex<Option<ScriptedTurn>>,
    repeat_last: bool,
    received: Mutex<Vec<Vec<Message>>>,
}

impl ScriptedCompletion {
    pub fn new(turns: impl IntoIterator<Item = ScriptedTurn>) -> Self {
        Self {
            name: "scripted".to_string(),
            turns: Mutex::new(turns.into_iter().collect()),
            last: Mutex::new(None),
            repeat_last: false,
            received: Mutex::new(Vec::new()),
        }
    }

    /// Convenience: one single-chunk turn per reply.
    pub fn from_replies<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(replies.into_iter().map(ScriptedTurn::reply))
    }

    /// Answer every request with the same turn.
    pub fn repeating(turn: ScriptedTurn) -> Self {
        let mut service = Self::new([turn]);
        service.repeat_last = true;
        service
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Histories received so far, one per request.
    pub fn received(&self) -> Vec<Vec<Message>> {
        self.received
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }

    /// Number of requests served.
    pub fn calls(&self) -> usize {
        self.received.lock().map(|guard| guard.len()).unwrap_or(0)
    }

    fn next_turn(&self) -> ScriptedTurn {
        let popped = self.turns.lock().ok().and_then(|mut q| q.pop_front());
        let mut last = match self.last.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        match popped {
            Some(turn) => {
                if self.repeat_last {
                    *last = Some(turn.clone());
                }
                turn
            }
            None => last
                .clone()
                .unwrap_or_else(|| ScriptedTurn::Chunks(Vec::new())),
        }
    }
}

#[async_trait]
impl CompletionService for ScriptedCompletion {
    fn name(&self) -> &str {
        &self.name
    }

    async fn stream_completion(&self, messages: Vec<Message>) -> LlmResult<ChunkStream> {
        if let Ok(mut received) = self.received.lock() {
            received.push(messages);
        }
        let turn = self.next_turn();
        tracing::debug!(service = %self.name, ?turn, "Replaying scripted turn");
        turn.into_stream()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::collect_stream;

    #[tokio::test]
    async fn test_replays_turns_in_order() {
        let service = ScriptedCompletion::from_replies(["first", "second"]);
        let a = service.stream_completion(vec![Message::user("hi")]).await.unwrap();
        assert_eq!(collect_stream(a).await.unwrap(), "first");
        let b = service.stream_completion(vec![]).await.unwrap();
        assert_eq!(collect_stream(b).await.unwrap(), "second");
        let c = service.stream_completion(vec![]).await.unwrap();
        assert_eq!(collect_stream(c).await.unwrap(), "");
        assert_eq!(service.calls(), 3);
        assert_eq!(service.received()[0], vec![Message::user("hi")]);
    }

    #[tokio::test]
    async fn test_repeating_turn() {
        let service = ScriptedCompletion::repeating(ScriptedTurn::reply("again"));
        for _ in 0..3 {
            let s = service.stream_completion(vec![]).await.unwrap();
            assert_eq!(collect_stream(s).await.unwrap(), "again");
        }
    }

    #[tokio::test]
    async fn test_fail_after_chunks() {
        let service = ScriptedCompletion::new([ScriptedTurn::FailAfter {
            chunks: vec!["par".to_string()],
            message: "reset".to_string(),
        }]);
        let mut s = service.stream_completion(vec![]).await.unwrap();
        assert_eq!(s.next().await.unwrap().unwrap(), "par");
        assert!(s.next().await.unwrap().is_err());
    }

    #[tokio::test]
    async fn test_refuse_fails_to_start() {
        let service = ScriptedCompletion::new([ScriptedTurn::Refuse("down".to_string())]);
        let err = service.stream_completion(vec![]).await.err().unwrap();
        assert_eq!(err.to_string(), "Network error: down");
    }

    #[tokio::test]
    async fn test_delayed_chunks_arrive() {
        let service = ScriptedCompletion::new([ScriptedTurn::Delayed {
            chunks: vec!["a".to_string(), "b".to_string()],
            delay: Duration::from_millis(5),
        }]);
        let s = service.stream_completion(vec![]).await.unwrap();
        assert_eq!(collect_stream(s).await.unwrap(), "ab");
    }
}
