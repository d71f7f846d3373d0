//! The Embedding Fragment: the one record type shared by all three tiers.

use serde::{Deserialize, Serialize};
use serde_json::Map;

/// The `metadata.type` values in use, plus a catch-all for forward
/// compatibility — follows the same sealed-tagged-variant
/// convention `layer0::content::ContentBlock` uses for its own kinds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FragmentKind {
    /// High-level project layout summary.
    ProjectStructure,
    /// Detected languages/frameworks/libraries.
    TechStack,
    /// Extracted API endpoint or method signatures.
    ApiEntries,
    /// Extracted database entity/schema descriptions.
    DbEntities,
    /// Extracted enum definitions.
    Enums,
    /// Extracted commonly-reused class/type summaries.
    CommonClasses,
    /// XML/YAML/TOML configuration summaries.
    XmlConfigs,
    /// Business-process narrative summaries.
    BusinessProcess,
    /// A persisted question/answer learning record (C10).
    LearningRecord,
    /// Per-file LLM-generated code summary (C4).
    CodeSummary,
    /// Forward-compatible catch-all for kinds not yet named.
    Custom(String),
}

/// Metadata every fragment carries: its kind, owning project, and any
/// extra caller-defined keys.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FragmentMetadata {
    /// What kind of knowledge this fragment represents.
    pub kind: FragmentKind,
    /// The project this fragment belongs to. Always present.
    pub project_key: String,
    /// Caller-defined extra keys.
    #[serde(default)]
    pub extra: Map<String, serde_json::Value>,
}

/// One row in the Tiered Vector Store.
///
/// `#[non_exhaustive]` so new fields can be added without breaking
/// downstream matches, matching `layer0::Effect`'s forward-compatibility
/// convention.
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fragment {
    /// Stable identity, unique across all tiers.
    pub id: String,
    /// The embedding vector. Dimension must match the project's
    /// configured dimension.
    pub vector: Vec<f32>,
    /// Short human-readable title.
    pub title: String,
    /// Short content (e.g. a summary paragraph).
    pub content: String,
    /// Full content, potentially large.
    pub full_content: String,
    /// Free-form tags for filtering and cleanup.
    pub tags: Vec<String>,
    /// Structured metadata, always including `project_key`.
    pub metadata: FragmentMetadata,
    /// Optional opaque payload (e.g. a rendered UI snippet).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
}

impl Fragment {
    /// Construct a fragment with no tags/payload, for the common case.
    pub fn new(
        id: impl Into<String>,
        vector: Vec<f32>,
        title: impl Into<String>,
        content: impl Into<String>,
        kind: FragmentKind,
        project_key: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            vector,
            title: title.into(),
            content: content.into(),
            full_content: String::new(),
            tags: Vec::new(),
            metadata: FragmentMetadata {
                kind,
                project_key: project_key.into(),
                extra: Map::new(),
            },
            payload: None,
        }
    }
}
