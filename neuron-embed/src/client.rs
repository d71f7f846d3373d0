//! Embedding HTTP client with retry and adaptive truncation.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use serde_json::json;

use crate::error::EmbedError;
use crate::limiter::{EndpointKind, SharedLimiter};
use crate::truncate::{estimate_tokens, TruncationStrategy};

/// Tunables for [`EmbedClient`].
#[derive(Debug, Clone)]
pub struct EmbedConfig {
    /// Base URL for an OpenAI-compatible `/v1/embeddings` endpoint.
    pub api_url: String,
    /// Bearer token, if the endpoint requires one.
    pub api_key: Option<String>,
    /// Model identifier sent with every request.
    pub model: String,
    /// Expected output vector dimension.
    pub dimension: usize,
    /// Maximum retry attempts, shared between transient-error retries
    /// and truncate-and-retry attempts.
    pub max_retries: u32,
    /// Token budget before pre-truncation kicks in.
    pub token_limit: usize,
    /// Characters removed per truncation step on a length error.
    pub truncation_step_chars: usize,
    /// Strategy used whenever truncation is needed.
    pub truncation_strategy: TruncationStrategy,
    /// Maximum number of texts per `batchEmbed` HTTP call.
    pub batch_size: usize,
}

impl Default for EmbedConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.openai.com/v1/embeddings".to_string(),
            api_key: None,
            model: "text-embedding-3-small".to_string(),
            dimension: 1536,
            max_retries: 3,
            token_limit: 8192,
            truncation_step_chars: 1000,
            truncation_strategy: TruncationStrategy::Smart,
            batch_size: 10,
        }
    }
}

#[derive(Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(Deserialize)]
struct EmbeddingDatum {
    embedding: Vec<f32>,
}

/// HTTP client for an embedding service, with retry-with-backoff and
/// truncate-and-retry built in.
pub struct EmbedClient {
    http: reqwest::Client,
    config: EmbedConfig,
    limiter: SharedLimiter,
}

impl EmbedClient {
    /// Build a client from `config`, sharing `limiter` with any rerank
    /// client on the same endpoint family.
    pub fn new(config: EmbedConfig, limiter: SharedLimiter) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
            limiter,
        }
    }

    /// Embed a single text.
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        let config = &self.config;
        self.limiter
            .execute(EndpointKind::Embedding, embed_with_retry(text, config, |t| self.call(t)))
            .await
    }

    /// Embed up to `config.batch_size` texts per underlying HTTP call.
    pub async fn batch_embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        let mut out = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(self.config.batch_size) {
            for text in chunk {
                out.push(self.embed(text).await?);
            }
        }
        Ok(out)
    }

    async fn call(&self, text: String) -> Result<Vec<f32>, EmbedError> {
        let mut req = self.http.post(&self.config.api_url).json(&json!({
            "model": self.config.model,
            "input": text,
        }));
        if let Some(key) = &self.config.api_key {
            req = req.bearer_auth(key);
        }
        let resp = req
            .send()
            .await
            .map_err(|e| EmbedError::Network(Box::new(e)))?;
        let status = resp.status().as_u16();
        let body = resp.text().await.unwrap_or_default();
        if !(200..300).contains(&status) {
            return Err(crate::error::map_http_status(status, &body));
        }
        let parsed: EmbeddingsResponse =
            serde_json::from_str(&body).map_err(|e| EmbedError::Other(Box::new(e)))?;
        let vector = parsed
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| EmbedError::Other(Box::<dyn std::error::Error + Send + Sync>::from("empty embeddings response")))?;
        Ok(vector)
    }
}

/// Shared handle for callers that need to clone a client around tasks.
pub type SharedEmbedClient = Arc<EmbedClient>;

/// Core retry/truncation loop, extracted as a free function over an
/// injectable `call` so the policy can be unit tested without a real
/// HTTP endpoint.
///
/// Pre-truncates when the text estimate exceeds `config.token_limit`;
/// on a recognized length error from `call`, truncates a further
/// `config.truncation_step_chars` and retries; on a transient error,
/// retries unchanged with linear-in-attempt backoff. Both kinds of
/// retry share `config.max_retries`.
pub async fn embed_with_retry<F, Fut>(
    text: &str,
    config: &EmbedConfig,
    mut call: F,
) -> Result<Vec<f32>, EmbedError>
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = Result<Vec<f32>, EmbedError>>,
{
    let mut current = if estimate_tokens(text) > config.token_limit {
        let target_chars = config.token_limit * 4;
        config.truncation_strategy.truncate(text, target_chars)
    } else {
        text.to_string()
    };

    let mut attempt = 0;
    loop {
        match call(current.clone()).await {
            Ok(vector) => return Ok(vector),
            Err(err) if attempt >= config.max_retries => return Err(err),
            Err(err) if err.is_length_error() => {
                attempt += 1;
                let target_chars = current.chars().count().saturating_sub(config.truncation_step_chars);
                current = config.truncation_strategy.truncate(&current, target_chars.max(1));
            }
            Err(err) if err.is_retryable() => {
                attempt += 1;
                tokio::time::sleep(Duration::from_millis(200 * attempt as u64)).await;
            }
            Err(err) => return Err(err),
        }
    }
}
