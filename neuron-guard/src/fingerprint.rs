//! Canonicalization and fingerprinting shared by tool-call and
//! question-level duplicate detection.

use sha2::{Digest, Sha256};

/// Canonicalize a parameter map per the shared rule set: lowercase keys,
/// sort by key, strip null/empty values, trim string values, normalize
/// path separators (`\` to `/`).
pub fn canonicalize(params: &serde_json::Value) -> String {
    let mut entries: Vec<(String, String)> = match params.as_object() {
        Some(map) => map
            .iter()
            .filter_map(|(k, v)| canonical_value(v).map(|cv| (k.to_lowercase(), cv)))
            .collect(),
        None => return canonical_scalar(params),
    };
    entries.sort_by(|a, b| a.0.cmp(&b.0));
    entries
        .into_iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&")
}

/// `None` means the value was null or an empty string/array/object and
/// should be stripped entirely, matching the canonicalization rule.
fn canonical_value(v: &serde_json::Value) -> Option<String> {
    match v {
        serde_json::Value::Null => None,
        serde_json::Value::String(s) if s.trim().is_empty() => None,
        serde_json::Value::Array(a) if a.is_empty() => None,
        serde_json::Value::Object(o) if o.is_empty() => None,
        other => Some(canonical_scalar(other)),
    }
}

fn canonical_scalar(v: &serde_json::Value) -> String {
    match v {
        serde_json::Value::String(s) => s.trim().replace('\\', "/"),
        other => other.to_string(),
    }
}

/// A stable fingerprint for a canonicalized `(name, params)` pair, used
/// both for tool-call duplicate detection (C7) and question-level
/// duplicate detection (C9/C10).
pub fn fingerprint(name: &str, params: &serde_json::Value) -> String {
    let canon = canonicalize(params);
    let mut hasher = Sha256::new();
    hasher.update(name.to_lowercase().as_bytes());
    hasher.update(b"\0");
    hasher.update(canon.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Fingerprint a plain text string (used for question dedup, where there
/// is no parameter map, only the generated question text itself).
pub fn fingerprint_text(text: &str) -> String {
    let canon = text.trim().to_lowercase();
    let mut hasher = Sha256::new();
    hasher.update(canon.as_bytes());
    format!("{:x}", hasher.finalize())
}
