//! Tool result compression for long-running sessions.
//!
//! Large tool outputs (directory listings, grep dumps, semantic search
//! hits) blow the context budget long before the conversation itself
//! does. [`ResultSummarizer`] applies a three-bucket policy keyed purely
//! on raw output size, with a per-tool-kind "interesting lines" filter
//! for the middle bucket and an LLM fallback for the largest outputs.

use neuron_turn::provider::Provider;
use std::sync::Arc;

const SMALL_BUCKET_CHARS: usize = 500;
const LARGE_BUCKET_CHARS: usize = 5000;
const CALL_CHAIN_DEPTH: usize = 10;

type LineFilter = Box<dyn Fn(&str) -> String + Send + Sync>;

/// Compresses large tool results down to what's worth keeping in context.
pub struct ResultSummarizer<P> {
    provider: Arc<P>,
    filters: Vec<(&'static str, LineFilter)>,
}

impl<P> ResultSummarizer<P> {
    /// Build a summarizer backed by `provider` for the large-output fallback.
    pub fn new(provider: Arc<P>) -> Self {
        Self {
            provider,
            filters: default_filters(),
        }
    }
}

impl<P: Provider> ResultSummarizer<P> {
    /// Compress `raw`, the output of `tool_name`, in light of the user's
    /// current `question`.
    ///
    /// - Under [`SMALL_BUCKET_CHARS`]: returned verbatim.
    /// - Under [`LARGE_BUCKET_CHARS`]: passed through the matching
    ///   "interesting lines" filter for `tool_name`, or a generic
    ///   head-truncation if no filter matches.
    /// - Otherwise: summarized by the LLM, keyed by `question` and
    ///   `tool_name`; falls back to the middle-bucket filter on any
    ///   provider error.
    pub async fn summarize(&self, tool_name: &str, raw: &str, question: &str) -> String {
        if raw.len() < SMALL_BUCKET_CHARS {
            return raw.to_string();
        }
        if raw.len() < LARGE_BUCKET_CHARS {
            return self.middle_bucket(tool_name, raw);
        }
        match self.llm_summary(tool_name, raw, question).await {
            Ok(summary) => summary,
            Err(_) => self.middle_bucket(tool_name, raw),
        }
    }

    fn middle_bucket(&self, tool_name: &str, raw: &str) -> String {
        for (prefix, filter) in &self.filters {
            if tool_name.to_ascii_lowercase().starts_with(prefix) {
                return filter(raw);
            }
        }
        if raw.contains('\u{2192}') {
            return keep_call_chain_lines(raw, CALL_CHAIN_DEPTH);
        }
        head_truncate(raw, LARGE_BUCKET_CHARS / 2)
    }

    async fn llm_summary(
        &self,
        tool_name: &str,
        raw: &str,
        question: &str,
    ) -> Result<String, neuron_turn::provider::ProviderError> {
        let prompt = format!(
            "The user asked: {question}\n\nSummarize the output of `{tool_name}` below, \
             keeping only what's relevant to answering the question:\n\n{raw}"
        );
        self.provider.simple(&prompt).await
    }
}

fn default_filters() -> Vec<(&'static str, LineFilter)> {
    vec![
        ("grep", Box::new(keep_grep_match_lines)),
        ("search", Box::new(keep_search_hit_lines)),
        ("semantic", Box::new(keep_search_hit_lines)),
    ]
}

fn keep_grep_match_lines(raw: &str) -> String {
    raw.lines()
        .filter(|line| !line.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn keep_search_hit_lines(raw: &str) -> String {
    raw.lines()
        .filter(|line| line.contains("filePath") || line.contains("score"))
        .collect::<Vec<_>>()
        .join("\n")
}

fn keep_call_chain_lines(raw: &str, max_depth: usize) -> String {
    raw.lines()
        .filter(|line| line.contains('\u{2192}'))
        .take(max_depth)
        .collect::<Vec<_>>()
        .join("\n")
}

fn head_truncate(raw: &str, target_chars: usize) -> String {
    match raw.char_indices().nth(target_chars) {
        Some((idx, _)) => format!("{}…", &raw[..idx]),
        None => raw.to_string(),
    }
}
