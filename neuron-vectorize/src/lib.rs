#![deny(missing_docs)]
//! Scans a project's source tree, detects changed files by content
//! hash, summarizes and embeds new/changed files, and retires vectors
//! for files that have been deleted.

mod embedder;
mod error;
mod hashcache;
mod summarizer;
mod walk;

pub use embedder::Embedder;
pub use error::VectorizeError;
pub use summarizer::Summarizer;
pub use walk::default_extensions;

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use layer0::state::StateStore;
use neuron_vector::{Fragment, FragmentKind, VectorStore};

use hashcache::{hash_bytes, HashCache};
use walk::walk_source_files;

/// Tunables for a [`Vectorizer`] run.
#[derive(Debug, Clone)]
pub struct VectorizeConfig {
    /// File extensions to scan (without the leading dot).
    pub extensions: Vec<String>,
    /// Ignore the content-hash cache and reprocess every file.
    pub force_update: bool,
}

impl Default for VectorizeConfig {
    fn default() -> Self {
        Self {
            extensions: default_extensions(),
            force_update: false,
        }
    }
}

/// Outcome of one [`Vectorizer::run`] or
/// [`Vectorizer::reingest_from_markdown`] call.
#[derive(Debug, Clone, Default)]
pub struct VectorizeSummary {
    /// Files visited by the walk.
    pub total_files: usize,
    /// Files summarized, embedded, and upserted.
    pub processed_files: usize,
    /// Files skipped because their content hash was unchanged.
    pub skipped_files: usize,
    /// Vectors written to the store (one per processed file).
    pub total_vectors: usize,
    /// Per-file failures, isolated so one bad file never aborts the
    /// batch.
    pub errors: Vec<String>,
    /// Wall-clock duration of the run.
    pub elapsed_ms: u128,
}

enum ProcessOutcome {
    Skipped,
    Processed,
}

/// Drives the scan → hash → summarize → embed → upsert pipeline for
/// one project.
pub struct Vectorizer {
    project_key: String,
    store: Arc<dyn VectorStore>,
    cache: HashCache,
    summarizer: Arc<dyn Summarizer>,
    embedder: Arc<dyn Embedder>,
    config: VectorizeConfig,
}

impl Vectorizer {
    /// Build a vectorizer for `project_key`.
    pub fn new(
        project_key: impl Into<String>,
        store: Arc<dyn VectorStore>,
        state: Arc<dyn StateStore>,
        summarizer: Arc<dyn Summarizer>,
        embedder: Arc<dyn Embedder>,
        config: VectorizeConfig,
    ) -> Self {
        let project_key = project_key.into();
        let cache = HashCache::new(state, project_key.clone());
        Self {
            project_key,
            store,
            cache,
            summarizer,
            embedder,
            config,
        }
    }

    fn fragment_id(&self, relative_path: &str) -> String {
        format!("code_summary:{}:{relative_path}", self.project_key)
    }

    fn relative_to(root: &Path, path: &Path) -> String {
        path.strip_prefix(root).unwrap_or(path).to_string_lossy().replace('\\', "/")
    }

    /// Scan `root`, summarize and embed new/changed files, and delete
    /// vectors for files the cache tracked but the walk no longer
    /// finds. A failure on one file is recorded in the returned
    /// summary's `errors` and does not stop the rest of the batch.
    pub async fn run(&self, root: &Path) -> VectorizeSummary {
        let started = Instant::now();
        let mut summary = VectorizeSummary::default();

        let files = walk_source_files(root, &self.config.extensions);
        summary.total_files = files.len();

        let mut seen = HashSet::with_capacity(files.len());
        for path in &files {
            let relative = Self::relative_to(root, path);
            seen.insert(relative.clone());
            match self.process_file(path, &relative).await {
                Ok(ProcessOutcome::Skipped) => summary.skipped_files += 1,
                Ok(ProcessOutcome::Processed) => {
                    summary.processed_files += 1;
                    summary.total_vectors += 1;
                }
                Err(err) => {
                    tracing::warn!(file = %relative, error = %err, "vectorization failed for file");
                    summary.errors.push(format!("{relative}: {err}"));
                }
            }
        }

        match self.cache.all_paths().await {
            Ok(tracked) => {
                for path in tracked {
                    if seen.contains(&path) {
                        continue;
                    }
                    if let Err(err) = self.remove_file(&path).await {
                        summary.errors.push(format!("{path}: {err}"));
                    }
                }
            }
            Err(err) => summary.errors.push(format!("hash cache listing failed: {err}")),
        }

        summary.elapsed_ms = started.elapsed().as_millis();
        summary
    }

    async fn process_file(&self, path: &Path, relative: &str) -> Result<ProcessOutcome, VectorizeError> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|source| VectorizeError::Io { path: relative.to_string(), source })?;
        let hash = hash_bytes(&bytes);

        if !self.config.force_update {
            if let Some(previous) = self.cache.get(relative).await? {
                if previous == hash {
                    return Ok(ProcessOutcome::Skipped);
                }
            }
        }

        let content = String::from_utf8_lossy(&bytes).into_owned();
        let summary_md = self
            .summarizer
            .summarize(relative, &content)
            .await
            .map_err(|err| match err {
                VectorizeError::Summarize { reason, .. } => VectorizeError::Summarize {
                    path: relative.to_string(),
                    reason,
                },
                other => other,
            })?;
        let vector = self.embedder.embed(&summary_md).await?;

        let mut fragment = Fragment::new(
            self.fragment_id(relative),
            vector,
            relative,
            summary_md.clone(),
            FragmentKind::CodeSummary,
            self.project_key.clone(),
        );
        fragment.full_content = summary_md;
        fragment.tags.push("code_summary".to_string());
        fragment.tags.push(format!("file:{relative}"));

        self.store.upsert(fragment).await?;
        self.cache.set(relative, &hash).await?;
        Ok(ProcessOutcome::Processed)
    }

    async fn remove_file(&self, relative: &str) -> Result<(), VectorizeError> {
        self.store.delete(&self.project_key, &self.fragment_id(relative)).await?;
        self.cache.remove(relative).await?;
        Ok(())
    }

    /// Purge existing `code_summary` fragments for this project, then
    /// embed every `.md` file under `markdown_dir` as a replacement —
    /// without invoking the summarizer. Used to re-ingest hand-edited
    /// or externally generated markdown.
    pub async fn reingest_from_markdown(&self, markdown_dir: &Path) -> VectorizeSummary {
        let started = Instant::now();
        let mut summary = VectorizeSummary::default();

        if let Err(err) = self.store.cleanup_by_tag(&self.project_key, "code_summary").await {
            summary.errors.push(format!("purge failed: {err}"));
        }

        let files = walk_source_files(markdown_dir, &["md".to_string()]);
        summary.total_files = files.len();
        for path in &files {
            let relative = Self::relative_to(markdown_dir, path);
            match self.embed_markdown_file(path, &relative).await {
                Ok(()) => {
                    summary.processed_files += 1;
                    summary.total_vectors += 1;
                }
                Err(err) => summary.errors.push(format!("{relative}: {err}")),
            }
        }

        summary.elapsed_ms = started.elapsed().as_millis();
        summary
    }

    async fn embed_markdown_file(&self, path: &Path, relative: &str) -> Result<(), VectorizeError> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| VectorizeError::Io { path: relative.to_string(), source })?;
        let vector = self.embedder.embed(&content).await?;

        let mut fragment = Fragment::new(
            self.fragment_id(relative),
            vector,
            relative,
            content.clone(),
            FragmentKind::CodeSummary,
            self.project_key.clone(),
        );
        fragment.full_content = content;
        fragment.tags.push("code_summary".to_string());
        self.store.upsert(fragment).await
    }
}
