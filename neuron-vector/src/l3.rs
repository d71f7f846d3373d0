//! L3 cold tier: one JSON file per `(projectKey, id)`, source of truth
//! for all fragment data.
//!
//! Directory layout mirrors `neuron-state-fs::FsStore`: a hashed
//! per-project subdirectory, percent-encoded ids as filenames.

use std::path::{Path, PathBuf};

use tokio::fs;

use crate::error::VectorError;
use crate::fragment::Fragment;

/// Filesystem-backed cold tier.
pub struct ColdStore {
    root: PathBuf,
}

fn project_dir_name(project_key: &str) -> String {
    let mut hash: u64 = 5381;
    for byte in project_key.as_bytes() {
        hash = hash.wrapping_mul(33).wrapping_add(*byte as u64);
    }
    format!("project-{hash:016x}")
}

fn id_to_filename(id: &str) -> String {
    let mut encoded = String::new();
    for ch in id.chars() {
        match ch {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '-' | '_' | '.' => encoded.push(ch),
            _ => {
                for byte in ch.to_string().as_bytes() {
                    encoded.push_str(&format!("%{byte:02X}"));
                }
            }
        }
    }
    format!("{encoded}.json")
}

impl ColdStore {
    /// Open (lazily — created on first write) a cold store rooted at
    /// `root`.
    pub fn new(root: &Path) -> Self {
        Self { root: root.to_path_buf() }
    }

    fn path_for(&self, project_key: &str, id: &str) -> PathBuf {
        self.root.join(project_dir_name(project_key)).join(id_to_filename(id))
    }

    fn project_dir(&self, project_key: &str) -> PathBuf {
        self.root.join(project_dir_name(project_key))
    }

    /// Persist a fragment, overwriting any existing record with the same id.
    pub async fn put(&self, fragment: &Fragment) -> Result<(), VectorError> {
        let dir = self.project_dir(&fragment.metadata.project_key);
        fs::create_dir_all(&dir).await?;
        let path = self.path_for(&fragment.metadata.project_key, &fragment.id);
        let bytes = serde_json::to_vec_pretty(fragment)?;
        fs::write(path, bytes).await?;
        Ok(())
    }

    /// Read a single fragment by id.
    pub async fn get(&self, project_key: &str, id: &str) -> Result<Option<Fragment>, VectorError> {
        let path = self.path_for(project_key, id);
        match fs::read(&path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Delete a fragment. Missing files are not an error.
    pub async fn delete(&self, project_key: &str, id: &str) -> Result<(), VectorError> {
        let path = self.path_for(project_key, id);
        match fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Load every fragment stored for `project_key`, used to rebuild L2
    /// and for metadata-only (non-semantic) scans.
    pub async fn list_project(&self, project_key: &str) -> Result<Vec<Fragment>, VectorError> {
        let dir = self.project_dir(project_key);
        let mut out = Vec::new();
        let mut entries = match fs::read_dir(&dir).await {
            Ok(e) => e,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(out),
            Err(e) => return Err(e.into()),
        };
        while let Some(entry) = entries.next_entry().await? {
            let bytes = fs::read(entry.path()).await?;
            out.push(serde_json::from_slice(&bytes)?);
        }
        Ok(out)
    }
}
