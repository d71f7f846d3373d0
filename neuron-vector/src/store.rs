//! Ties L1/L2/L3 together behind a single [`VectorStore`] trait.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::Mutex as AsyncMutex;

use crate::error::VectorError;
use crate::fragment::{Fragment, FragmentKind};
use crate::l1::HotTier;
use crate::l2::CosineIndex;
use crate::l3::ColdStore;

/// Optional narrowing applied to search results, beyond the semantic
/// ranking itself — a metadata-only (non-semantic) filter over L3.
#[derive(Debug, Default, Clone)]
pub struct MetadataFilter {
    /// Restrict to fragments of this kind.
    pub kind: Option<FragmentKind>,
    /// Restrict to fragments carrying all of these tags.
    pub tags: Vec<String>,
}

impl MetadataFilter {
    fn matches(&self, fragment: &Fragment) -> bool {
        if let Some(kind) = &self.kind {
            if &fragment.metadata.kind != kind {
                return false;
            }
        }
        self.tags.iter().all(|t| fragment.tags.contains(t))
    }
}

/// Object-safe tiered vector store contract, matching
/// `layer0::StateStore`'s `#[async_trait]` shape.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Insert or replace a fragment, propagating to all tiers.
    async fn upsert(&self, fragment: Fragment) -> Result<(), VectorError>;

    /// Remove a fragment from all tiers. Propagates to every tier before
    /// returning success.
    async fn delete(&self, project_key: &str, id: &str) -> Result<(), VectorError>;

    /// Point lookup, read-through L1 → L3.
    async fn get(&self, project_key: &str, id: &str) -> Result<Option<Fragment>, VectorError>;

    /// Semantic search, descending score, optionally narrowed by
    /// `filter`.
    async fn search(
        &self,
        project_key: &str,
        query_vector: &[f32],
        top_k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<(String, f32)>, VectorError>;

    /// Delete every fragment in `project_key` carrying `tag`.
    async fn cleanup_by_tag(&self, project_key: &str, tag: &str) -> Result<usize, VectorError>;
}

/// The concrete three-tier implementation.
pub struct TieredStore {
    dimension: usize,
    hot: HotTier,
    warm: DashMap<String, std::sync::Mutex<CosineIndex>>,
    cold: ColdStore,
    write_locks: DashMap<String, Arc<AsyncMutex<()>>>,
}

impl TieredStore {
    /// Build a store with a fixed project-wide embedding `dimension`,
    /// cold tier rooted at `root`, and default L1 capacity.
    pub fn new(dimension: usize, root: &Path) -> Self {
        Self {
            dimension,
            hot: HotTier::default(),
            warm: DashMap::new(),
            cold: ColdStore::new(root),
            write_locks: DashMap::new(),
        }
    }

    fn write_lock(&self, project_key: &str) -> Arc<AsyncMutex<()>> {
        self.write_locks
            .entry(project_key.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    async fn ensure_warm_loaded(&self, project_key: &str) -> Result<(), VectorError> {
        let needs_build = match self.warm.get(project_key) {
            None => true,
            Some(idx) => idx.lock().unwrap().needs_rebuild(),
        };
        if !needs_build {
            return Ok(());
        }
        let fragments = self.cold.list_project(project_key).await?;
        let mut index = CosineIndex::new();
        index.rebuild(fragments.into_iter().map(|f| (f.id, f.vector)));
        self.warm.insert(project_key.to_string(), std::sync::Mutex::new(index));
        Ok(())
    }

    fn check_dimension(&self, vector: &[f32]) -> Result<(), VectorError> {
        if vector.len() != self.dimension {
            return Err(VectorError::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl VectorStore for TieredStore {
    async fn upsert(&self, fragment: Fragment) -> Result<(), VectorError> {
        self.check_dimension(&fragment.vector)?;
        let lock = self.write_lock(&fragment.metadata.project_key);
        let _guard = lock.lock().await;

        self.cold.put(&fragment).await?;
        self.ensure_warm_loaded(&fragment.metadata.project_key).await?;
        if let Some(idx) = self.warm.get(&fragment.metadata.project_key) {
            idx.lock().unwrap().upsert(fragment.id.clone(), fragment.vector.clone());
        }
        self.hot.put(fragment);
        Ok(())
    }

    async fn delete(&self, project_key: &str, id: &str) -> Result<(), VectorError> {
        let lock = self.write_lock(project_key);
        let _guard = lock.lock().await;

        self.cold.delete(project_key, id).await?;
        if let Some(idx) = self.warm.get(project_key) {
            idx.lock().unwrap().remove(id);
        }
        self.hot.remove(id);
        Ok(())
    }

    async fn get(&self, project_key: &str, id: &str) -> Result<Option<Fragment>, VectorError> {
        if let Some(f) = self.hot.get(id) {
            return Ok(Some(f));
        }
        let found = self.cold.get(project_key, id).await?;
        if let Some(f) = &found {
            self.hot.put(f.clone());
        }
        Ok(found)
    }

    async fn search(
        &self,
        project_key: &str,
        query_vector: &[f32],
        top_k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<(String, f32)>, VectorError> {
        self.check_dimension(query_vector)?;
        self.ensure_warm_loaded(project_key).await?;

        let overfetch = if filter.is_some() { top_k.saturating_mul(4).max(top_k) } else { top_k };
        let candidates = match self.warm.get(project_key) {
            Some(idx) => idx.lock().unwrap().search(query_vector, overfetch),
            None => Vec::new(),
        };

        let Some(filter) = filter else {
            return Ok(candidates.into_iter().take(top_k).collect());
        };

        let mut out = Vec::with_capacity(top_k);
        for (id, score) in candidates {
            if out.len() >= top_k {
                break;
            }
            if let Some(fragment) = self.get(project_key, &id).await? {
                if filter.matches(&fragment) {
                    out.push((id, score));
                }
            }
        }
        Ok(out)
    }

    async fn cleanup_by_tag(&self, project_key: &str, tag: &str) -> Result<usize, VectorError> {
        let fragments = self.cold.list_project(project_key).await?;
        let mut removed = 0;
        for fragment in fragments {
            if fragment.tags.iter().any(|t| t == tag) {
                self.delete(project_key, &fragment.id).await?;
                removed += 1;
            }
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frag(id: &str, vector: Vec<f32>, project: &str) -> Fragment {
        Fragment::new(id, vector, id, id, FragmentKind::CodeSummary, project)
    }

    #[tokio::test]
    async fn upsert_then_get_roundtrips() {
        let dir = tempfile::tempdir().unwrap();
        let store = TieredStore::new(2, dir.path());
        store.upsert(frag("a", vec![1.0, 0.0], "proj")).await.unwrap();

        let got = store.get("proj", "a").await.unwrap().unwrap();
        assert_eq!(got.vector, vec![1.0, 0.0]);
    }

    #[tokio::test]
    async fn dimension_mismatch_rejects_upsert() {
        let dir = tempfile::tempdir().unwrap();
        let store = TieredStore::new(3, dir.path());
        let err = store.upsert(frag("a", vec![1.0, 0.0], "proj")).await.unwrap_err();
        assert!(matches!(err, VectorError::DimensionMismatch { expected: 3, actual: 2 }));
    }

    #[tokio::test]
    async fn delete_removes_from_all_tiers() {
        let dir = tempfile::tempdir().unwrap();
        let store = TieredStore::new(2, dir.path());
        store.upsert(frag("a", vec![1.0, 0.0], "proj")).await.unwrap();
        store.delete("proj", "a").await.unwrap();
        assert!(store.get("proj", "a").await.unwrap().is_none());
        let results = store.search("proj", &[1.0, 0.0], 5, None).await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn search_ranks_by_similarity() {
        let dir = tempfile::tempdir().unwrap();
        let store = TieredStore::new(2, dir.path());
        store.upsert(frag("close", vec![1.0, 0.0], "proj")).await.unwrap();
        store.upsert(frag("far", vec![0.0, 1.0], "proj")).await.unwrap();

        let results = store.search("proj", &[0.9, 0.1], 2, None).await.unwrap();
        assert_eq!(results[0].0, "close");
    }

    #[tokio::test]
    async fn search_applies_metadata_filter() {
        let dir = tempfile::tempdir().unwrap();
        let store = TieredStore::new(2, dir.path());
        let mut tagged = frag("a", vec![1.0, 0.0], "proj");
        tagged.tags.push("keep".to_string());
        store.upsert(tagged).await.unwrap();
        store.upsert(frag("b", vec![1.0, 0.0], "proj")).await.unwrap();

        let filter = MetadataFilter {
            kind: None,
            tags: vec!["keep".to_string()],
        };
        let results = store.search("proj", &[1.0, 0.0], 5, Some(&filter)).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].0, "a");
    }

    #[tokio::test]
    async fn cleanup_by_tag_removes_matching_fragments() {
        let dir = tempfile::tempdir().unwrap();
        let store = TieredStore::new(2, dir.path());
        let mut a = frag("a", vec![1.0, 0.0], "proj");
        a.tags.push("stale".to_string());
        store.upsert(a).await.unwrap();
        store.upsert(frag("b", vec![0.0, 1.0], "proj")).await.unwrap();

        let removed = store.cleanup_by_tag("proj", "stale").await.unwrap();
        assert_eq!(removed, 1);
        assert!(store.get("proj", "a").await.unwrap().is_none());
        assert!(store.get("proj", "b").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn projects_are_isolated() {
        let dir = tempfile::tempdir().unwrap();
        let store = TieredStore::new(2, dir.path());
        store.upsert(frag("a", vec![1.0, 0.0], "proj-1")).await.unwrap();
        assert!(store.get("proj-2", "a").await.unwrap().is_none());
    }
}
