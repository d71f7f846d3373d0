//! Source tree walking with an extension allowlist.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

/// Directories never descended into regardless of the allowlist.
const SKIP_DIRS: &[&str] = &[".git", "target", "node_modules", ".venv", "vendor"];

/// Walk `root`, returning every file whose extension is in
/// `extensions` (case-insensitive, without the leading dot),
/// excluding [`SKIP_DIRS`].
pub fn walk_source_files(root: &Path, extensions: &[String]) -> Vec<PathBuf> {
    WalkDir::new(root)
        .into_iter()
        .filter_entry(|entry| {
            entry.file_type().is_file()
                || !entry
                    .file_name()
                    .to_str()
                    .map(|name| SKIP_DIRS.contains(&name))
                    .unwrap_or(false)
        })
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| {
            entry
                .path()
                .extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| extensions.iter().any(|allowed| allowed.eq_ignore_ascii_case(ext)))
                .unwrap_or(false)
        })
        .map(|entry| entry.path().to_path_buf())
        .collect()
}

/// Default extension allowlist: common general-purpose and backend
/// languages. No single teacher/example repo settled this choice, so
/// it's recorded as an open decision in the project's design notes.
pub fn default_extensions() -> Vec<String> {
    ["rs", "py", "js", "ts", "tsx", "jsx", "go", "java", "rb", "c", "cpp", "h", "hpp", "cs"]
        .into_iter()
        .map(String::from)
        .collect()
}
