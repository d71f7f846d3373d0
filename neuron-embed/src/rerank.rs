//! Rerank HTTP client: degrades to identity order on failure rather
//! than propagating an error.

use serde::Deserialize;
use serde_json::json;

use crate::limiter::{EndpointKind, SharedLimiter};

/// Tunables for [`RerankClient`].
#[derive(Debug, Clone)]
pub struct RerankConfig {
    /// Base URL for the rerank endpoint. `None` disables reranking
    /// entirely (identity permutation, no HTTP call).
    pub api_url: Option<String>,
    /// Bearer token, if required.
    pub api_key: Option<String>,
    /// Model identifier sent with every request.
    pub model: String,
    /// Scores below this are dropped from `rerank_with_scores`. Never
    /// applied to the index-only `rerank`.
    pub score_threshold: f32,
}

impl Default for RerankConfig {
    fn default() -> Self {
        Self {
            api_url: None,
            api_key: None,
            model: "rerank-v1".to_string(),
            score_threshold: 0.0,
        }
    }
}

#[derive(Deserialize)]
struct RerankResponse {
    results: Vec<RerankResult>,
}

#[derive(Deserialize)]
struct RerankResult {
    index: usize,
    #[serde(default)]
    relevance_score: f32,
}

/// Rerank client. Any transport-level failure degrades to the
/// original document order rather than failing the caller's request.
pub struct RerankClient {
    http: reqwest::Client,
    config: RerankConfig,
    limiter: SharedLimiter,
}

impl RerankClient {
    /// Build a client. Pass `config.api_url = None` to disable
    /// reranking and always return identity order.
    pub fn new(config: RerankConfig, limiter: SharedLimiter) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
            limiter,
        }
    }

    /// Rerank `documents` against `query`, returning the top `top_k`
    /// original indices in descending relevance order. Never drops
    /// entries for low scores.
    pub async fn rerank(&self, query: &str, documents: &[String], top_k: usize) -> Vec<usize> {
        self.rerank_with_scores(query, documents, top_k)
            .await
            .into_iter()
            .map(|(i, _)| i)
            .collect()
    }

    /// Rerank `documents`, returning `(index, score)` pairs, dropping
    /// anything below `config.score_threshold`.
    pub async fn rerank_with_scores(&self, query: &str, documents: &[String], top_k: usize) -> Vec<(usize, f32)> {
        let Some(url) = &self.config.api_url else {
            return documents
                .iter()
                .enumerate()
                .take(top_k)
                .map(|(i, _)| (i, 1.0))
                .collect();
        };

        let identity = || documents.iter().enumerate().take(top_k).map(|(i, _)| (i, 1.0)).collect::<Vec<_>>();

        let result = self
            .limiter
            .execute(EndpointKind::Rerank, self.call(url, query, documents, top_k))
            .await;

        match result {
            Ok(scored) => scored
                .into_iter()
                .filter(|(_, score)| *score >= self.config.score_threshold)
                .take(top_k)
                .collect(),
            Err(err) => {
                tracing::warn!(error = %err, "rerank request failed, degrading to identity order");
                identity()
            }
        }
    }

    async fn call(&self, url: &str, query: &str, documents: &[String], top_k: usize) -> Result<Vec<(usize, f32)>, reqwest::Error> {
        let mut req = self.http.post(url).json(&json!({
            "model": self.config.model,
            "query": query,
            "documents": documents,
            "top_n": top_k,
        }));
        if let Some(key) = &self.config.api_key {
            req = req.bearer_auth(key);
        }
        let resp = req.send().await?.error_for_status()?;
        let parsed: RerankResponse = resp.json().await?;
        Ok(parsed.results.into_iter().map(|r| (r.index, r.relevance_score)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn docs() -> Vec<String> {
        vec!["a".into(), "b".into(), "c".into()]
    }

    #[tokio::test]
    async fn disabled_returns_identity_permutation() {
        let client = RerankClient::new(RerankConfig::default(), Arc::new(Default::default()));
        let result = client.rerank("q", &docs(), 3).await;
        assert_eq!(result, vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn disabled_with_scores_assigns_full_score() {
        let client = RerankClient::new(RerankConfig::default(), Arc::new(Default::default()));
        let result = client.rerank_with_scores("q", &docs(), 2).await;
        assert_eq!(result, vec![(0, 1.0), (1, 1.0)]);
    }

    #[tokio::test]
    async fn transport_error_degrades_to_identity_order() {
        let config = RerankConfig {
            api_url: Some("http://127.0.0.1:1".to_string()),
            ..RerankConfig::default()
        };
        let client = RerankClient::new(config, Arc::new(Default::default()));
        let result = client.rerank("q", &docs(), 3).await;
        assert_eq!(result, vec![0, 1, 2]);
    }
}
