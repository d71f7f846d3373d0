#![deny(missing_docs)]
//! Ranked, deduplicated question generation for self-directed exploration.
//!
//! [`Generator`] asks a [`neuron_turn::provider::Provider`] for a batch of
//! candidate questions via `json` mode, then filters out anything that
//! duplicates a recently-asked question (by `neuron_guard::fingerprint`
//! over the question text) before handing back a priority-sorted list.

use std::cmp::Reverse;
use std::collections::HashSet;

use neuron_guard::fingerprint::fingerprint_text;
use neuron_turn::provider::{Provider, ProviderError};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The kind of question being asked about a project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    /// How does X work / where does Y live.
    Architecture,
    /// What does this module/class/function do.
    Behavior,
    /// Why was this built this way.
    Rationale,
    /// What would break if X changed.
    Impact,
}

/// One candidate question as returned by the model, before filtering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateQuestion {
    /// The question text itself.
    pub question: String,
    /// What kind of question this is.
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    /// 1 (low) to 10 (high).
    pub priority: u8,
    /// Why the model thinks this is worth asking.
    pub reason: String,
    /// Tool names the model expects would help answer it.
    #[serde(default)]
    pub suggested_tools: Vec<String>,
    /// What kind of answer would satisfy this question.
    pub expected_outcome: String,
}

/// What the model is asked to produce in one batch.
#[derive(Debug, Clone)]
pub struct GenerateRequest {
    /// Short description of the project's tech stack and structure.
    pub project_context: String,
    /// The last 20 (or fewer) previously-asked questions, for the prompt's
    /// "don't repeat these" framing.
    pub recent_questions: Vec<String>,
    /// How many candidates to request from the model.
    pub count: u32,
    /// Candidates with priority below this are dropped after generation.
    pub min_priority: u8,
}

impl Default for GenerateRequest {
    fn default() -> Self {
        Self {
            project_context: String::new(),
            recent_questions: Vec::new(),
            count: 3,
            min_priority: 1,
        }
    }
}

/// Errors from question generation.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum GenerateError {
    /// The provider call or JSON extraction failed.
    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),
}

/// Generates ranked, deduplicated candidate questions for one project.
pub struct Generator<P: Provider> {
    provider: P,
}

impl<P: Provider> Generator<P> {
    /// Build a generator over `provider`.
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    /// Produce up to `request.count` candidates, dropping any whose
    /// fingerprint matches `exclude_hashes` (typically the hashes of
    /// recently-asked questions tracked by `neuron_guard::Guard`) or whose
    /// priority is below `request.min_priority`. Sorted by priority
    /// descending, stable on ties.
    pub async fn generate(
        &self,
        request: &GenerateRequest,
        exclude_hashes: &HashSet<String>,
    ) -> Result<Vec<CandidateQuestion>, GenerateError> {
        let prompt = build_prompt(request);
        let mut candidates: Vec<CandidateQuestion> = self.provider.json(&prompt).await?;

        candidates.retain(|c| {
            c.priority >= request.min_priority && !exclude_hashes.contains(&fingerprint_text(&c.question))
        });
        candidates.sort_by_key(|c| Reverse(c.priority));
        Ok(candidates)
    }
}

fn build_prompt(request: &GenerateRequest) -> String {
    let recent = if request.recent_questions.is_empty() {
        "(none yet)".to_string()
    } else {
        request.recent_questions.join("\n- ")
    };

    format!(
        "Given this project context:\n{}\n\n\
         Generate {} candidate questions an autonomous code-exploration agent \
         could investigate next. Avoid repeating or closely paraphrasing any \
         of these recently-asked questions:\n- {}\n\n\
         Respond with a JSON array of objects, each with fields: question, \
         type (one of \"architecture\", \"behavior\", \"rationale\", \"impact\"), \
         priority (1-10), reason, suggested_tools (array of tool names), \
         expected_outcome.",
        request.project_context, request.count, recent,
    )
}

/// A question's priority-weighted score, useful when callers want to
/// combine model priority with an external confidence signal. `Decimal`
/// matches the crate-wide convention of avoiding `f64` for scored values.
pub fn weighted_score(priority: u8, confidence: Decimal) -> Decimal {
    Decimal::from(priority) * confidence
}

#[cfg(test)]
mod tests {
    use super::*;
    use neuron_turn::types::{ContentPart, ProviderRequest, ProviderResponse, StreamChunk, TokenUsage};

    struct JsonProvider(String);

    impl Provider for JsonProvider {
        #[allow(clippy::manual_async_fn)]
        fn complete(
            &self,
            _request: ProviderRequest,
        ) -> impl std::future::Future<Output = Result<ProviderResponse, ProviderError>> + Send {
            let text = self.0.clone();
            async move {
                Ok(ProviderResponse {
                    content: vec![ContentPart::Text { text }],
                    stop_reason: neuron_turn::types::StopReason::EndTurn,
                    usage: TokenUsage::default(),
                    model: "mock".into(),
                    cost: None,
                    truncated: None,
                })
            }
        }

        fn stream(
            &self,
            _request: ProviderRequest,
        ) -> impl futures::Stream<Item = Result<StreamChunk, ProviderError>> + Send {
            futures::stream::empty()
        }
    }

    fn candidate(question: &str, priority: u8) -> CandidateQuestion {
        CandidateQuestion {
            question: question.to_string(),
            question_type: QuestionType::Behavior,
            priority,
            reason: "r".into(),
            suggested_tools: vec![],
            expected_outcome: "o".into(),
        }
    }

    #[tokio::test]
    async fn sorts_by_priority_descending() {
        let body = serde_json::to_string(&vec![
            candidate("low", 2),
            candidate("high", 9),
            candidate("mid", 5),
        ])
        .unwrap();
        let gen = Generator::new(JsonProvider(body));
        let out = gen
            .generate(&GenerateRequest::default(), &HashSet::new())
            .await
            .unwrap();
        assert_eq!(
            out.iter().map(|c| c.question.as_str()).collect::<Vec<_>>(),
            vec!["high", "mid", "low"]
        );
    }

    #[tokio::test]
    async fn drops_below_min_priority() {
        let body = serde_json::to_string(&vec![candidate("weak", 2), candidate("strong", 8)]).unwrap();
        let gen = Generator::new(JsonProvider(body));
        let req = GenerateRequest {
            min_priority: 5,
            ..Default::default()
        };
        let out = gen.generate(&req, &HashSet::new()).await.unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].question, "strong");
    }

    #[tokio::test]
    async fn drops_duplicate_question_hash() {
        let body = serde_json::to_string(&vec![candidate("What does PaymentService do?", 7)]).unwrap();
        let gen = Generator::new(JsonProvider(body));
        let mut excluded = HashSet::new();
        excluded.insert(fingerprint_text("what does paymentservice do?"));
        let out = gen
            .generate(&GenerateRequest::default(), &excluded)
            .await
            .unwrap();
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn stable_sort_keeps_model_order_on_ties() {
        let body = serde_json::to_string(&vec![candidate("a", 5), candidate("b", 5)]).unwrap();
        let gen = Generator::new(JsonProvider(body));
        let out = gen
            .generate(&GenerateRequest::default(), &HashSet::new())
            .await
            .unwrap();
        assert_eq!(out[0].question, "a");
        assert_eq!(out[1].question, "b");
    }
}
