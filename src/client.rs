use std::pin::Pin;

use anyhow::Result;
use async_trait::async_trait;
use futures_util::Stream;

/// Incremental pieces of generated text, terminating normally or with an
/// error once the underlying call fails.
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// Defines the streaming-completion interface of a generative-model backend.
///
/// This trait allows consumers to abstract over different backends
/// (a real HTTP client, or a scripted fake in tests). Implementations must
/// be thread-safe so a single handle can be shared across tasks.
#[async_trait]
pub trait GenerativeClient: Send + Sync {
    /// Starts a streaming completion for `prompt`.
    ///
    /// Errors returned here mean the call could not be started (bad key,
    /// unreachable host, rejected request); errors inside the stream mean
    /// the call failed after producing zero or more chunks.
    async fn stream_generate(&self, prompt: &str) -> Result<ChunkStream>;
}
