//! Chat completion transport.
//!
//! A [`ChatTransport`] turns a message history (plus an optional tool
//! manifest) into assistant text, optional reasoning and tool-call requests,
//! either in one shot or as a stream of [`StreamEvent`]s.

pub mod error;
pub mod ollama;
pub mod openai;
pub mod stream;

pub use error::TransportError;
pub use ollama::Ollama;
pub use openai::OpenAiCompatible;

use shared::{ChatMessage, Completion, StreamEvent, StreamOutcome, Tool};
use tokio::sync::mpsc::UnboundedSender;

/// A chat backend.
///
/// Futures are polled by a single driver; implementations need not be `Send`.
#[allow(async_fn_in_trait)]
pub trait ChatTransport {
    /// Human-readable backend name for logs
    fn name(&self) -> &str;

    fn model(&self) -> &str;

    fn supports_streaming(&self) -> bool {
        true
    }

    fn supports_images(&self) -> bool {
        false
    }

    /// Available model names; empty on any failure
    async fn fetch_models(&self) -> Vec<String>;

    /// One-shot completion
    async fn complete(
        &self,
        history: &[ChatMessage],
        tools: Option<&[Tool]>,
    ) -> Result<Completion, TransportError>;

    /// Streamed completion. Tokens go to `events` as they arrive; the result
    /// carries the requested tool calls.
    async fn complete_streamed(
        &self,
        history: &[ChatMessage],
        tools: Option<&[Tool]>,
        events: &UnboundedSender<StreamEvent>,
    ) -> Result<StreamOutcome, TransportError>;
}

/// Backend selected at runtime from settings
#[derive(Debug, Clone)]
pub enum Backend {
    OpenAi(OpenAiCompatible),
    Ollama(Ollama),
}

impl ChatTransport for Backend {
    fn name(&self) -> &str {
        match self {
            Backend::OpenAi(b) => b.name(),
            Backend::Ollama(b) => b.name(),
        }
    }

    fn model(&self) -> &str {
        match self {
            Backend::OpenAi(b) => b.model(),
            Backend::Ollama(b) => b.model(),
        }
    }

    fn supports_images(&self) -> bool {
        match self {
            Backend::OpenAi(b) => b.supports_images(),
            Backend::Ollama(b) => b.supports_images(),
        }
    }

    async fn fetch_models(&self) -> Vec<String> {
        match self {
            Backend::OpenAi(b) => b.fetch_models().await,
            Backend::Ollama(b) => b.fetch_models().await,
        }
    }

    async fn complete(
        &self,
        history: &[ChatMessage],
        tools: Option<&[Tool]>,
    ) -> Result<Completion, TransportError> {
        match self {
            Backend::OpenAi(b) => b.complete(history, tools).await,
            Backend::Ollama(b) => b.complete(history, tools).await,
        }
    }

    async fn complete_streamed(
        &self,
        history: &[ChatMessage],
        tools: Option<&[Tool]>,
        events: &UnboundedSender<StreamEvent>,
    ) -> Result<StreamOutcome, TransportError> {
        match self {
            Backend::OpenAi(b) => b.complete_streamed(history, tools, events).await,
            Backend::Ollama(b) => b.complete_streamed(history, tools, events).await,
        }
    }
}
