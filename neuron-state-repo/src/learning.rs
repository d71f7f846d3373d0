//! `LearningRecord` storage: one row per completed exploration, keyed by
//! `id` within its project's scope, in the `learning_records` table.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use layer0::effect::Scope;
use layer0::error::StateError;
use layer0::state::StateStore;
use neuron_vector::{Fragment, FragmentKind, VectorStore};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

const TABLE: &str = "learning_records";

/// Narrow, object-safe embedding seam so [`LearningRepo`] can mirror a
/// record into the vector store without depending on a concrete
/// provider — the same reason `neuron_vectorize::Embedder` exists
/// instead of threading `neuron_embed::EmbedClient` generically.
#[async_trait]
pub trait LearningEmbedder: Send + Sync {
    /// Embed `text`, returning a vector matching the project's
    /// configured embedding dimension.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, LearningRepoError>;
}

#[async_trait]
impl LearningEmbedder for neuron_embed::EmbedClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, LearningRepoError> {
        neuron_embed::EmbedClient::embed(self, text)
            .await
            .map_err(|err| LearningRepoError::Embed(err.to_string()))
    }
}

/// One step taken while exploring the question this record answers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallStep {
    /// Tool invoked.
    pub tool_name: String,
    /// Parameters passed.
    pub parameters: serde_json::Value,
    /// Condensed summary of what the tool returned.
    pub result_summary: String,
    /// When this step ran.
    pub timestamp: DateTime<Utc>,
}

/// A single completed exploration: the question asked, the path taken to
/// answer it, and the synthesized answer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearningRecord {
    /// Stable identity, also used as the record's storage key and,
    /// conventionally, as the mirrored id of its `code_summary`-adjacent
    /// embedding fragment (`type = learning_record`) in the vector store.
    pub id: String,
    /// Project this record belongs to.
    pub project_key: String,
    /// When this record was created.
    pub created_at: DateTime<Utc>,
    /// The question explored.
    pub question: String,
    /// What kind of question it was.
    pub question_type: String,
    /// The synthesized answer.
    pub answer: String,
    /// Steps taken to arrive at the answer. Non-empty on success.
    pub exploration_path: Vec<ToolCallStep>,
    /// Confidence in `[0, 1]`, clamped at construction.
    pub confidence: Decimal,
    /// File paths the exploration touched or cited.
    pub source_files: Vec<String>,
    /// Free-form tags for later retrieval.
    pub tags: Vec<String>,
    /// Broad domain classification (e.g. "auth", "billing").
    pub domain: Option<String>,
    /// Embedding of `question`, if computed.
    pub question_vector: Option<Vec<f32>>,
    /// Embedding of `answer`, if computed.
    pub answer_vector: Option<Vec<f32>>,
}

impl LearningRecord {
    /// Build a record, clamping `confidence` into `[0, 1]` rather than
    /// accepting an out-of-range value silently.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: impl Into<String>,
        project_key: impl Into<String>,
        created_at: DateTime<Utc>,
        question: impl Into<String>,
        question_type: impl Into<String>,
        answer: impl Into<String>,
        exploration_path: Vec<ToolCallStep>,
        confidence: Decimal,
    ) -> Self {
        Self {
            id: id.into(),
            project_key: project_key.into(),
            created_at,
            question: question.into(),
            question_type: question_type.into(),
            answer: answer.into(),
            exploration_path,
            confidence: confidence.clamp(Decimal::ZERO, Decimal::ONE),
            source_files: Vec::new(),
            tags: Vec::new(),
            domain: None,
            question_vector: None,
            answer_vector: None,
        }
    }
}

/// Errors from learning-record storage.
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum LearningRepoError {
    /// Underlying state store failure.
    #[error(transparent)]
    Store(#[from] StateError),
    /// The configured embedder failed.
    #[error("embedding failed: {0}")]
    Embed(String),
}

/// Typed CRUD over `LearningRecord`s, built on any `StateStore` laid out
/// table-per-subdirectory (normally [`crate::table_store::TableStore`]).
///
/// When built via [`LearningRepo::with_index`], every `put` also mirrors
/// the record into a [`VectorStore`] as an Embedding Fragment with the
/// same `id` and `metadata.type = learning_record`, per the data model's
/// "LearningRecords live in the State Repository and are additionally
/// indexed as Embedding Fragments" ownership rule. Indexing is
/// best-effort: a failure to embed or upsert is logged, not propagated,
/// since the record is already durably persisted in the table store by
/// the time indexing is attempted.
pub struct LearningRepo {
    store: Arc<dyn StateStore>,
    index: Option<Arc<dyn VectorStore>>,
    embedder: Option<Arc<dyn LearningEmbedder>>,
}

impl LearningRepo {
    /// Build a repo over `store` with no vector-store mirroring.
    pub fn new(store: Arc<dyn StateStore>) -> Self {
        Self { store, index: None, embedder: None }
    }

    /// Build a repo that also mirrors every `put` into `index` as a
    /// `type = learning_record` fragment, embedding the question and
    /// answer text via `embedder`.
    pub fn with_index(
        store: Arc<dyn StateStore>,
        index: Arc<dyn VectorStore>,
        embedder: Arc<dyn LearningEmbedder>,
    ) -> Self {
        Self { store, index: Some(index), embedder: Some(embedder) }
    }

    fn scope(project_key: &str) -> Scope {
        Scope::Custom(format!("project:{project_key}"))
    }

    /// Upsert (single-row, keyed by `id`) a learning record, persisting
    /// it to the table store and — if configured — mirroring it into
    /// the vector store.
    pub async fn put(&self, record: &LearningRecord) -> Result<(), LearningRepoError> {
        let mut record = record.clone();

        if let Some(embedder) = &self.embedder {
            if record.question_vector.is_none() {
                match embedder.embed(&record.question).await {
                    Ok(vector) => record.question_vector = Some(vector),
                    Err(err) => tracing::warn!(
                        record_id = %record.id,
                        error = %err,
                        "failed to embed learning-record question"
                    ),
                }
            }
            if record.answer_vector.is_none() {
                match embedder.embed(&record.answer).await {
                    Ok(vector) => record.answer_vector = Some(vector),
                    Err(err) => tracing::warn!(
                        record_id = %record.id,
                        error = %err,
                        "failed to embed learning-record answer"
                    ),
                }
            }
        }

        let scope = Self::scope(&record.project_key);
        let key = format!("{TABLE}/{}", record.id);
        self.store
            .write(&scope, &key, serde_json::to_value(&record).unwrap())
            .await?;

        if let Some(index) = &self.index {
            if let Some(vector) = record.answer_vector.clone() {
                let mut fragment = Fragment::new(
                    record.id.clone(),
                    vector,
                    record.question.clone(),
                    record.answer.clone(),
                    FragmentKind::LearningRecord,
                    record.project_key.clone(),
                );
                fragment.full_content = record.answer.clone();
                fragment.tags = record.tags.clone();
                if let Err(err) = index.upsert(fragment).await {
                    tracing::warn!(
                        record_id = %record.id,
                        error = %err,
                        "failed to mirror learning record into vector store"
                    );
                }
            }
        }

        Ok(())
    }

    /// Point lookup by project and id.
    pub async fn get(
        &self,
        project_key: &str,
        id: &str,
    ) -> Result<Option<LearningRecord>, LearningRepoError> {
        let scope = Self::scope(project_key);
        let key = format!("{TABLE}/{id}");
        match self.store.read(&scope, &key).await? {
            Some(value) => Ok(serde_json::from_value(value).ok()),
            None => Ok(None),
        }
    }

    /// All records for a project (indexed scan: one directory listing).
    pub async fn list_by_project(
        &self,
        project_key: &str,
    ) -> Result<Vec<LearningRecord>, LearningRepoError> {
        let scope = Self::scope(project_key);
        let keys = self.store.list(&scope, &format!("{TABLE}/")).await?;
        let mut records = Vec::with_capacity(keys.len());
        for key in keys {
            if let Some(value) = self.store.read(&scope, &key).await? {
                if let Ok(record) = serde_json::from_value(value) {
                    records.push(record);
                }
            }
        }
        Ok(records)
    }
}
