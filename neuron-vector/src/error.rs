//! Errors from the tiered vector store.

use thiserror::Error;

/// Errors returned by [`crate::VectorStore`] operations.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum VectorError {
    /// The fragment's vector dimension doesn't match the project's
    /// configured dimension.
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// The project's configured embedding dimension.
        expected: usize,
        /// The dimension of the rejected vector.
        actual: usize,
    },

    /// No fragment exists with the given id.
    #[error("fragment not found: {0}")]
    NotFound(String),

    /// Cold-tier (L3) I/O failure.
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Fragment (de)serialization failure.
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// Catch-all for other errors.
    #[error("{0}")]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}
