//! Provider trait for LLM backends.
//!
//! The [`Provider`] trait uses RPITIT (return-position `impl Trait` in traits)
//! and is intentionally NOT object-safe. The object-safe boundary is
//! `layer0::Turn` — `ReactTurn<P: Provider>` (in `neuron-op-react`)
//! implements `Turn`.

use crate::types::{ContentPart, ProviderMessage, ProviderRequest, ProviderResponse, Role, StreamChunk};
use futures::Stream;
use serde::de::DeserializeOwned;
use std::future::Future;
use thiserror::Error;

/// Errors from LLM providers.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ProviderError {
    /// HTTP or network request failed.
    #[error("request failed: {0}")]
    RequestFailed(String),

    /// Provider rate-limited the request.
    #[error("rate limited")]
    RateLimited,

    /// Authentication/authorization failed.
    #[error("auth failed: {0}")]
    AuthFailed(String),

    /// Could not parse the provider's response.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Catch-all for other errors.
    #[error("{0}")]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl ProviderError {
    /// Whether retrying this request might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ProviderError::RateLimited | ProviderError::RequestFailed(_)
        )
    }
}

/// LLM provider interface.
///
/// Each provider (Anthropic, OpenAI, Ollama) implements this trait.
/// Provider-native features (truncation, caching, thinking blocks)
/// are handled by the provider impl using `ProviderRequest.extra`.
///
/// This trait uses RPITIT and is NOT object-safe. That's intentional —
/// `ReactTurn<P: Provider>` is generic, and the object-safe boundary
/// is `layer0::Turn`.
pub trait Provider: Send + Sync {
    /// Send a completion request to the provider.
    fn complete(
        &self,
        request: ProviderRequest,
    ) -> impl Future<Output = Result<ProviderResponse, ProviderError>> + Send;

    /// Stream a completion as incremental chunks. Each provider
    /// implements this against its own wire format (SSE for OpenAI/
    /// Anthropic, NDJSON for Ollama); there's no default in terms of
    /// `complete` since a real provider call only produces the whole
    /// response, not chunks.
    fn stream(
        &self,
        request: ProviderRequest,
    ) -> impl Stream<Item = Result<StreamChunk, ProviderError>> + Send;

    /// Send `prompt` as a single user message and return the
    /// response's concatenated text.
    fn simple(&self, prompt: &str) -> impl Future<Output = Result<String, ProviderError>> + Send
    where
        Self: Sized,
    {
        async move {
            let request = ProviderRequest {
                model: None,
                messages: vec![ProviderMessage {
                    role: Role::User,
                    content: vec![ContentPart::Text { text: prompt.to_string() }],
                }],
                tools: Vec::new(),
                max_tokens: None,
                temperature: None,
                system: None,
                extra: serde_json::Value::Null,
            };
            let response = self.complete(request).await?;
            Ok(response.text())
        }
    }

    /// Send `prompt`, then parse the response as `T` using
    /// [`crate::json_extract::extract`]'s three-stage extractor.
    fn json<T: DeserializeOwned>(&self, prompt: &str) -> impl Future<Output = Result<T, ProviderError>> + Send
    where
        Self: Sized,
    {
        async move {
            let text = self.simple(prompt).await?;
            crate::json_extract::extract(&text)
        }
    }
}
