//! L2 warm tier: brute-force cosine-similarity scan.
//!
//! No ANN/vector-index crate appears anywhere in the project's retrieved
//! corpus, so this is an in-memory linear scan rebuilt from L3 rather than
//! an approximate index — see DESIGN.md's Open Question resolution.

use std::collections::HashMap;

/// One project's in-memory search index: id → vector.
#[derive(Default)]
pub struct CosineIndex {
    vectors: HashMap<String, Vec<f32>>,
    mutations_since_rebuild: u64,
}

/// Rebuild is worthwhile once this many point mutations have accumulated
/// since the index was last (re)built from L3.
pub const REBUILD_THRESHOLD: u64 = 256;

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

impl CosineIndex {
    /// An empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild the index wholesale from a fresh set of `(id, vector)`
    /// pairs (e.g. loaded from L3).
    pub fn rebuild(&mut self, entries: impl IntoIterator<Item = (String, Vec<f32>)>) {
        self.vectors = entries.into_iter().collect();
        self.mutations_since_rebuild = 0;
    }

    /// Insert or update a single vector.
    pub fn upsert(&mut self, id: String, vector: Vec<f32>) {
        self.vectors.insert(id, vector);
        self.mutations_since_rebuild += 1;
    }

    /// Remove a single vector.
    pub fn remove(&mut self, id: &str) {
        if self.vectors.remove(id).is_some() {
            self.mutations_since_rebuild += 1;
        }
    }

    /// Whether enough mutations have accumulated to justify a rebuild
    /// from L3's source of truth.
    pub fn needs_rebuild(&self) -> bool {
        self.mutations_since_rebuild >= REBUILD_THRESHOLD
    }

    /// Top-`k` ids by cosine similarity to `query`, descending score.
    pub fn search(&self, query: &[f32], top_k: usize) -> Vec<(String, f32)> {
        let mut scored: Vec<(String, f32)> = self
            .vectors
            .iter()
            .map(|(id, v)| (id.clone(), cosine_similarity(query, v)))
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(top_k);
        scored
    }

    /// Number of vectors currently indexed.
    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    /// Whether the index has no vectors.
    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }
}
