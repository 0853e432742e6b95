//! Completion Service Trait
//!
//! Defines the interface the orchestration core uses to talk to a language
//! model. Implementations own transport, authentication and model choice.

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use futures_util::StreamExt;

use super::types::{LlmResult, Message};

/// Stream of text chunks produced by a completion. A chunk-level `Err`
/// means the stream broke off and no further chunks follow.
pub type ChunkStream = BoxStream<'static, LlmResult<String>>;

/// Trait that every completion service must implement.
#[async_trait]
pub trait CompletionService: Send + Sync {
    /// Returns the service name for identification.
    fn name(&self) -> &str;

    /// Start a streaming completion over the given history.
    ///
    /// An `Err` here means the request could not be started at all.
    async fn stream_completion(&self, messages: Vec<Message>) -> LlmResult<ChunkStream>;
}

/// Drain a chunk stream into a single string, stopping at the first error.
pub async fn collect_stream(mut stream: ChunkStream) -> LlmResult<String> {
    let mut out = String::new();
    while let Some(chunk) = stream.next().await {
        out.push_str(&chunk?);
    }
    Ok(out)
}
