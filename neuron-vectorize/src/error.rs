//! Errors from the vectorization pipeline.

use thiserror::Error;

/// Per-file or pipeline-level failure.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum VectorizeError {
    /// Filesystem I/O failure reading a source or markdown file.
    #[error("io error on {path}: {source}")]
    Io {
        /// The file being read or written.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The summarizer returned an error for a file.
    #[error("summarization failed for {path}: {reason}")]
    Summarize {
        /// The file being summarized.
        path: String,
        /// Summarizer's reported reason.
        reason: String,
    },

    /// Embedding the summary failed.
    #[error(transparent)]
    Embed(#[from] neuron_embed::EmbedError),

    /// Writing to the vector store failed.
    #[error(transparent)]
    Store(#[from] neuron_vector::VectorError),

    /// Reading or writing the content-hash cache failed.
    #[error(transparent)]
    State(#[from] layer0::error::StateError),
}

impl VectorizeError {
    /// The source file path this error is about, if any.
    pub fn path(&self) -> Option<&str> {
        match self {
            Self::Io { path, .. } | Self::Summarize { path, .. } => Some(path),
            _ => None,
        }
    }
}
