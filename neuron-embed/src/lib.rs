#![deny(missing_docs)]
//! HTTP clients for embedding and rerank services: retry with adaptive
//! truncation, per-endpoint concurrency limiting, and degrade-not-fail
//! rerank.

pub mod client;
pub mod error;
pub mod limiter;
pub mod rerank;
pub mod truncate;

pub use client::{EmbedClient, EmbedConfig, SharedEmbedClient};
pub use error::EmbedError;
pub use limiter::{EndpointKind, EndpointLimiter, SharedLimiter};
pub use rerank::{RerankClient, RerankConfig};
pub use truncate::{estimate_tokens, TruncationStrategy};
