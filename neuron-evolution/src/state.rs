//! Resumable per-project evolution state.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Where a project's exploration loop currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvolutionPhase {
    /// Not running.
    Idle,
    /// Consulting the doom-loop guard before starting an iteration.
    CheckingBackoff,
    /// Asking C9 for a question to explore.
    GeneratingQuestion,
    /// Driving the bounded mini-ReAct exploration.
    Exploring,
    /// Synthesizing the answer from the exploration trace.
    Summarizing,
    /// Writing the LearningRecord and indexing it.
    Persisting,
}

impl EvolutionPhase {
    /// Whether a stored phase other than `Idle`/`CheckingBackoff` means a
    /// resumable exploration was in progress when the process last
    /// stopped.
    pub fn is_resumable(self) -> bool {
        !matches!(self, EvolutionPhase::Idle | EvolutionPhase::CheckingBackoff)
    }
}

/// One step already taken during the current (possibly in-flight)
/// exploration, kept so a resumed iteration doesn't repeat it.
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

/// Per-project evolution loop state, persisted synchronously on every
/// phase transition so a restart resumes exactly where it left off.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvolutionState {
    /// Current phase.
    pub phase: EvolutionPhase,
    /// Total iterations attempted (successful or not).
    pub total_iterations: u64,
    /// Iterations that completed through `Persisting`.
    pub successful_iterations: u64,
    /// How many times in a row the generated question has been a
    /// duplicate of the last one (feeds `neuron_guard::Guard`'s stall
    /// check).
    pub consecutive_duplicate_count: u32,
    /// The question currently being explored, if any.
    pub current_question: Option<String>,
    /// Fingerprint hash of `current_question`.
    pub current_question_hash: Option<String>,
    /// How many exploration steps have been taken so far this iteration.
    pub exploration_progress: u32,
    /// Steps already completed in the in-flight exploration, carried
    /// across a resume.
    pub partial_steps: Vec<ToolCallStep>,
    /// When the current iteration started.
    pub started_at: Option<DateTime<Utc>>,
    /// Hash of the project's current state, to detect staleness.
    pub last_project_hash: Option<String>,
    /// Why the loop last stopped, if it did.
    pub stop_reason: Option<String>,
    /// Last time this state was written.
    pub last_updated_at: DateTime<Utc>,
}

impl EvolutionState {
    /// A fresh, idle state.
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            phase: EvolutionPhase::Idle,
            total_iterations: 0,
            successful_iterations: 0,
            consecutive_duplicate_count: 0,
            current_question: None,
            current_question_hash: None,
            exploration_progress: 0,
            partial_steps: Vec::new(),
            started_at: None,
            last_project_hash: None,
            stop_reason: None,
            last_updated_at: now,
        }
    }

    /// Reset the per-iteration fields for a fresh iteration, bumping
    /// `total_iterations` and moving to `CheckingBackoff`.
    pub fn begin_iteration(&mut self, now: DateTime<Utc>) {
        self.phase = EvolutionPhase::CheckingBackoff;
        self.total_iterations += 1;
        self.current_question = None;
        self.current_question_hash = None;
        self.exploration_progress = 0;
        self.partial_steps.clear();
        self.started_at = Some(now);
        self.last_updated_at = now;
    }
}

/// An answer synthesized from a completed exploration, one step before
/// being turned into a `LearningRecord` and handed to the state
/// repository / vector store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExplorationSummary {
    /// Synthesized answer text.
    pub answer: String,
    /// Confidence in `[0, 1]`.
    pub confidence: Decimal,
    /// File paths the exploration touched or cited.
    pub source_files: Vec<String>,
    /// Free-form tags for later retrieval.
    pub tags: Vec<String>,
}
