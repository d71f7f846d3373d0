//! LLM-backed file summarization, abstracted behind an object-safe
//! trait so the pipeline doesn't depend on a concrete provider.

use async_trait::async_trait;

use crate::error::VectorizeError;

/// Produces a markdown summary for a single source file's content.
///
/// Kept object-safe (unlike `neuron_turn::provider::Provider`, which
/// uses RPITIT) so a [`crate::Vectorizer`] can hold one behind
/// `Arc<dyn Summarizer>` without a generic parameter threading through
/// every call site, the way `neuron-vector::VectorStore` and
/// `layer0::StateStore` are also held as trait objects.
#[async_trait]
pub trait Summarizer: Send + Sync {
    /// Summarize `content` (the contents of `relative_path`) into a
    /// markdown fragment suitable for embedding.
    async fn summarize(&self, relative_path: &str, content: &str) -> Result<String, VectorizeError>;
}

#[cfg(test)]
pub(crate) struct EchoSummarizer;

#[cfg(test)]
#[async_trait]
impl Summarizer for EchoSummarizer {
    async fn summarize(&self, relative_path: &str, content: &str) -> Result<String, VectorizeError> {
        Ok(format!("# {relative_path}\n\n{} bytes", content.len()))
    }
}
