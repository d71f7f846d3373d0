//! Per-file content-hash cache, persisted via [`layer0::StateStore`]
//! so change detection survives process restarts.

use std::sync::Arc;

use layer0::effect::Scope;
use layer0::error::StateError;
use layer0::state::StateStore;
use sha2::{Digest, Sha256};

const KEY_PREFIX: &str = "file:";

/// SHA-256 hex digest of `bytes`.
pub fn hash_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Tracks the last-seen content hash of every file in a project, keyed
/// by path relative to the project root.
pub struct HashCache {
    store: Arc<dyn StateStore>,
    project_key: String,
}

impl HashCache {
    /// Build a cache scoped to `project_key`.
    pub fn new(store: Arc<dyn StateStore>, project_key: impl Into<String>) -> Self {
        Self {
            store,
            project_key: project_key.into(),
        }
    }

    fn scope(&self) -> Scope {
        Scope::Custom(format!("vectorize:{}", self.project_key))
    }

    /// The last recorded hash for `relative_path`, if any.
    pub async fn get(&self, relative_path: &str) -> Result<Option<String>, StateError> {
        let key = format!("{KEY_PREFIX}{relative_path}");
        let value = self.store.read(&self.scope(), &key).await?;
        Ok(value.and_then(|v| v.as_str().map(String::from)))
    }

    /// Record `hash` as the current content hash of `relative_path`.
    pub async fn set(&self, relative_path: &str, hash: &str) -> Result<(), StateError> {
        let key = format!("{KEY_PREFIX}{relative_path}");
        self.store.write(&self.scope(), &key, serde_json::Value::String(hash.to_string())).await
    }

    /// Drop the cache entry for a file that no longer exists.
    pub async fn remove(&self, relative_path: &str) -> Result<(), StateError> {
        let key = format!("{KEY_PREFIX}{relative_path}");
        self.store.delete(&self.scope(), &key).await
    }

    /// Every relative path currently tracked by the cache.
    pub async fn all_paths(&self) -> Result<Vec<String>, StateError> {
        let keys = self.store.list(&self.scope(), KEY_PREFIX).await?;
        Ok(keys.into_iter().filter_map(|k| k.strip_prefix(KEY_PREFIX).map(String::from)).collect())
    }
}
