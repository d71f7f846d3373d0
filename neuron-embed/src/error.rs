//! Errors from embedding and rerank clients.

use std::time::Duration;
use thiserror::Error;

/// Errors from [`crate::EmbedClient`] / [`crate::RerankClient`].
///
/// Grounded on the status-code mapping `neuron-provider-openai`'s
/// embedding client used before it was folded into this crate:
/// 401/403 → `Authentication`, 429 → `RateLimit`, 400/404 →
/// `InvalidRequest`, network-level failures → `TransientNetwork`/
/// `Network`, everything else → `Other`. `Length` is this crate's own
/// addition, split out from `TransientNetwork` so callers can tell a
/// retryable transient failure from one that needs truncation first.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum EmbedError {
    /// Authentication/authorization failure (401/403).
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// Rate limited by the provider (429), with an optional suggested
    /// delay parsed from the response body.
    #[error("rate limited, retry after {retry_after:?}")]
    RateLimit {
        /// Suggested retry delay, if the body named one.
        retry_after: Option<Duration>,
    },

    /// Malformed or invalid request (400/404, not a length error).
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Timeout, 5xx, or connection-refused — retried without truncation.
    #[error("transient network error: {0}")]
    TransientNetwork(String),

    /// The server rejected the input as too long.
    #[error("input too long: {0}")]
    Length(String),

    /// Lower-level transport error.
    #[error("network error: {0}")]
    Network(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Catch-all for other errors.
    #[error("{0}")]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl EmbedError {
    /// Whether this error should be retried as-is (no truncation).
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimit { .. } | Self::TransientNetwork(_) | Self::Network(_))
    }

    /// Whether this error should be retried after truncating the input
    /// further.
    pub fn is_length_error(&self) -> bool {
        matches!(self, Self::Length(_))
    }
}

/// Map an HTTP status code and response body to an [`EmbedError`].
pub fn map_http_status(status: u16, body: &str) -> EmbedError {
    match status {
        401 | 403 => EmbedError::Authentication(body.to_string()),
        429 => EmbedError::RateLimit {
            retry_after: parse_retry_after(body),
        },
        400 | 404 => {
            if is_length_error_body(body) {
                EmbedError::Length(body.to_string())
            } else {
                EmbedError::InvalidRequest(body.to_string())
            }
        }
        500..=599 => EmbedError::TransientNetwork(format!("server error {status}: {body}")),
        _ => EmbedError::Other(Box::<dyn std::error::Error + Send + Sync>::from(format!(
            "unexpected status {status}: {body}"
        ))),
    }
}

fn is_length_error_body(body: &str) -> bool {
    let lower = body.to_lowercase();
    lower.contains("too long") || lower.contains("maximum context length") || lower.contains("input is too large")
}

/// Scan a response body for a "retry after N (seconds|ms)" hint.
///
/// Grounded on `neuron-provider-openai`'s original substring-scan
/// approach rather than parsing a `Retry-After` header, since rerank/
/// embedding gateways vary in whether they surface one.
pub fn parse_retry_after(body: &str) -> Option<Duration> {
    let lower = body.to_lowercase();
    let idx = lower.find("retry after")?;
    let rest = &lower[idx + "retry after".len()..];
    let digits: String = rest.trim_start().chars().take_while(|c| c.is_ascii_digit()).collect();
    let n: u64 = digits.parse().ok()?;
    if rest.trim_start()[digits.len()..].trim_start().starts_with("ms") {
        Some(Duration::from_millis(n))
    } else {
        Some(Duration::from_secs(n))
    }
}
