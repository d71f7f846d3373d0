//! A `layer0::StateStore` with one subdirectory per logical table instead
//! of one flat directory, so a prefix scan for one table is a directory
//! listing rather than a full-store scan.
//!
//! Keys passed to this store are expected to be of the form
//! `"<table>/<rest>"` (e.g. `"learning_records/abc123"`); a key with no
//! `/` is stored under a catch-all `_default` table. `list`'s `prefix`
//! follows the same convention: a prefix containing `/` scopes the scan to
//! that one table; a prefix with none scans every table's matching
//! directory for the given scope.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use layer0::effect::Scope;
use layer0::error::StateError;
use layer0::state::{SearchResult, StateStore};
use thiserror::Error;

/// The schema version this crate's on-disk layout currently implements.
/// Bump this and add a branch to [`migrate`] whenever the layout changes
/// in a way old data can't just be read as-is.
pub const SCHEMA_VERSION: u32 = 1;

const VERSION_FILE: &str = "SCHEMA_VERSION";
const DEFAULT_TABLE: &str = "_default";

/// Errors from schema migration.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum MigrationError {
    /// The on-disk schema is newer than this build understands.
    #[error("on-disk schema version {found} is newer than this build's {current}")]
    FutureSchema {
        /// Version found on disk.
        found: u32,
        /// Version this build implements.
        current: u32,
    },
    /// No migration path exists from the stored version.
    #[error("no migration path from schema version {from}")]
    NoPath {
        /// The stored version with no forward migration defined.
        from: u32,
    },
    /// I/O error reading or writing the version marker.
    #[error("schema version I/O error: {0}")]
    Io(String),
}

/// Forward-only migration dispatch: given the version found on disk,
/// either it matches (no-op) or there's a defined upgrade path. There is
/// no downgrade path by design — schema changes only ever move forward.
fn migrate(old: u32) -> Result<(), MigrationError> {
    match old {
        v if v == SCHEMA_VERSION => Ok(()),
        v if v > SCHEMA_VERSION => Err(MigrationError::FutureSchema {
            found: v,
            current: SCHEMA_VERSION,
        }),
        // No prior versions have ever shipped yet; once one does, add an
        // explicit branch here rather than falling through.
        v => Err(MigrationError::NoPath { from: v }),
    }
}

/// Table-per-subdirectory `StateStore`.
pub struct TableStore {
    root: PathBuf,
}

impl TableStore {
    /// Open (creating if absent) a table store rooted at `root`, running
    /// schema migration against the on-disk version marker.
    pub async fn open(root: &Path) -> Result<Self, MigrationError> {
        tokio::fs::create_dir_all(root)
            .await
            .map_err(|e| MigrationError::Io(e.to_string()))?;

        let version_path = root.join(VERSION_FILE);
        let on_disk: u32 = match tokio::fs::read_to_string(&version_path).await {
            Ok(contents) => contents.trim().parse().unwrap_or(0),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => SCHEMA_VERSION,
            Err(e) => return Err(MigrationError::Io(e.to_string())),
        };

        migrate(on_disk)?;

        tokio::fs::write(&version_path, SCHEMA_VERSION.to_string())
            .await
            .map_err(|e| MigrationError::Io(e.to_string()))?;

        Ok(Self {
            root: root.to_path_buf(),
        })
    }

    fn split_table(key: &str) -> (&str, &str) {
        match key.split_once('/') {
            Some((table, rest)) => (table, rest),
            None => (DEFAULT_TABLE, key),
        }
    }

    fn table_dir(&self, table: &str) -> PathBuf {
        self.root.join(table)
    }
}

fn scope_dir_name(scope: &Scope) -> String {
    let json = serde_json::to_string(scope).unwrap_or_else(|_| "unknown".into());
    let mut hash: u64 = 5381;
    for byte in json.as_bytes() {
        hash = hash.wrapping_mul(33).wrapping_add(*byte as u64);
    }
    format!("scope-{hash:016x}")
}

fn key_to_filename(key: &str) -> String {
    let mut encoded = String::new();
    for ch in key.chars() {
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

fn filename_to_key(filename: &str) -> Option<String> {
    let name = filename.strip_suffix(".json")?;
    let mut result = Vec::new();
    let bytes = name.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).ok()?;
            let byte = u8::from_str_radix(hex, 16).ok()?;
            result.push(byte);
            i += 3;
        } else {
            result.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(result).ok()
}

#[async_trait]
impl StateStore for TableStore {
    async fn read(
        &self,
        scope: &Scope,
        key: &str,
    ) -> Result<Option<serde_json::Value>, StateError> {
        let (table, rest) = Self::split_table(key);
        let path = self
            .table_dir(table)
            .join(scope_dir_name(scope))
            .join(key_to_filename(rest));
        match tokio::fs::read_to_string(&path).await {
            Ok(contents) => {
                let value = serde_json::from_str(&contents)
                    .map_err(|e| StateError::Serialization(e.to_string()))?;
                Ok(Some(value))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StateError::WriteFailed(e.to_string())),
        }
    }

    async fn write(
        &self,
        scope: &Scope,
        key: &str,
        value: serde_json::Value,
    ) -> Result<(), StateError> {
        let (table, rest) = Self::split_table(key);
        let dir = self.table_dir(table).join(scope_dir_name(scope));
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| StateError::WriteFailed(e.to_string()))?;

        let path = dir.join(key_to_filename(rest));
        let contents = serde_json::to_string_pretty(&value)
            .map_err(|e| StateError::Serialization(e.to_string()))?;
        tokio::fs::write(&path, contents)
            .await
            .map_err(|e| StateError::WriteFailed(e.to_string()))?;
        Ok(())
    }

    async fn delete(&self, scope: &Scope, key: &str) -> Result<(), StateError> {
        let (table, rest) = Self::split_table(key);
        let path = self
            .table_dir(table)
            .join(scope_dir_name(scope))
            .join(key_to_filename(rest));
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StateError::WriteFailed(e.to_string())),
        }
    }

    async fn list(&self, scope: &Scope, prefix: &str) -> Result<Vec<String>, StateError> {
        let scope_dir = scope_dir_name(scope);

        if let Some((table, rest_prefix)) = prefix.split_once('/') {
            return list_in_table(&self.table_dir(table), &scope_dir, table, rest_prefix).await;
        }

        // No table named in the prefix: scan every table directory for
        // this scope, keeping only keys whose table-local rest starts
        // with `prefix`.
        let mut keys = Vec::new();
        let mut tables = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(vec![]),
            Err(e) => return Err(StateError::WriteFailed(e.to_string())),
        };
        while let Some(entry) = tables
            .next_entry()
            .await
            .map_err(|e| StateError::WriteFailed(e.to_string()))?
        {
            if !entry
                .file_type()
                .await
                .map_err(|e| StateError::WriteFailed(e.to_string()))?
                .is_dir()
            {
                continue;
            }
            let Some(table) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            keys.extend(list_in_table(&entry.path(), &scope_dir, &table, prefix).await?);
        }
        Ok(keys)
    }

    async fn search(
        &self,
        _scope: &Scope,
        _query: &str,
        _limit: usize,
    ) -> Result<Vec<SearchResult>, StateError> {
        Ok(vec![])
    }
}

async fn list_in_table(
    table_dir: &Path,
    scope_dir: &str,
    table: &str,
    rest_prefix: &str,
) -> Result<Vec<String>, StateError> {
    let dir = table_dir.join(scope_dir);
    let mut entries = match tokio::fs::read_dir(&dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(vec![]),
        Err(e) => return Err(StateError::WriteFailed(e.to_string())),
    };

    let mut keys = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| StateError::WriteFailed(e.to_string()))?
    {
        if let Some(filename) = entry.file_name().to_str() {
            if let Some(rest) = filename_to_key(filename) {
                if rest.starts_with(rest_prefix) {
                    keys.push(format!("{table}/{rest}"));
                }
            }
        }
    }
    Ok(keys)
}
