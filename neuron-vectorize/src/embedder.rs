//! Embedding, abstracted behind an object-safe trait for the same
//! reason [`crate::summarizer::Summarizer`] is: testability and a
//! uniform `Arc<dyn _>` shape across the pipeline.

use async_trait::async_trait;

use crate::error::VectorizeError;

/// Turns text into an embedding vector.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed `text`, returning a vector matching the project's
    /// configured dimension.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, VectorizeError>;
}

#[async_trait]
impl Embedder for neuron_embed::EmbedClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, VectorizeError> {
        Ok(neuron_embed::EmbedClient::embed(self, text).await?)
    }
}

#[cfg(test)]
pub(crate) struct FixedEmbedder {
    pub dimension: usize,
}

#[cfg(test)]
#[async_trait]
impl Embedder for FixedEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, VectorizeError> {
        Ok(vec![text.len() as f32; self.dimension])
    }
}
