//! Phase-driven exploration loop for one project: generate a question,
//! explore it with a bounded ReAct turn, summarize, persist, repeat.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use layer0::content::Content;
use layer0::effect::Scope;
use layer0::state::StateStore;
use layer0::turn::{ExitReason, Turn, TurnConfig, TurnInput, TriggerType};
use neuron_guard::fingerprint::fingerprint_text;
use neuron_guard::{Guard, SkipDecision};
use neuron_questions::{CandidateQuestion, GenerateError, GenerateRequest, Generator, QuestionType};
use neuron_state_repo::{LearningRecord, LearningRepo, ToolCallStep};
use neuron_turn::provider::Provider;
use rust_decimal::Decimal;
use thiserror::Error;
use tokio::sync::Notify;
use tracing::{info, warn};

use crate::state::{EvolutionPhase, EvolutionState, ExplorationSummary};

const CHECKPOINT_KEY: &str = "evolution_state/checkpoint";

/// Supplies a short natural-language description of the project under
/// exploration (normally backed by C4's vectorization index) so the
/// question generator has something to ground candidates in.
#[async_trait]
pub trait ProjectContext: Send + Sync {
    /// Produce the project context blurb fed to the question generator.
    async fn describe(&self) -> String;
}

/// Object-safe boundary over [`Generator`], the same way `layer0::Turn` is
/// the object-safe boundary over `ReactTurn<P>` — lets a worker hold a
/// `Arc<dyn QuestionSource>` without being generic over the provider type
/// used for exploration.
#[async_trait]
pub trait QuestionSource: Send + Sync {
    /// See [`Generator::generate`].
    async fn generate(
        &self,
        request: &GenerateRequest,
        exclude_hashes: &HashSet<String>,
    ) -> Result<Vec<CandidateQuestion>, GenerateError>;
}

#[async_trait]
impl<P: Provider + Sync + 'static> QuestionSource for Generator<P> {
    async fn generate(
        &self,
        request: &GenerateRequest,
        exclude_hashes: &HashSet<String>,
    ) -> Result<Vec<CandidateQuestion>, GenerateError> {
        Generator::generate(self, request, exclude_hashes).await
    }
}

/// Why a worker's run loop stopped.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum EvolutionError {
    /// Cooperatively cancelled by its supervisor. Not an error condition.
    #[error("cancelled")]
    Cancelled,
    /// An unrecoverable failure. The supervisor should mark the project
    /// halted rather than restart it automatically.
    #[error("fatal: {0}")]
    Fatal(String),
}

fn question_type_label(t: QuestionType) -> &'static str {
    match t {
        QuestionType::Architecture => "architecture",
        QuestionType::Behavior => "behavior",
        QuestionType::Rationale => "rationale",
        QuestionType::Impact => "impact",
    }
}

/// Drives one project's self-evolution loop.
pub struct EvolutionWorker {
    project_key: String,
    questions_per_iteration: u32,
    max_exploration_steps: u32,
    interval_ms: u64,
    guard: Arc<Guard>,
    generator: Arc<dyn QuestionSource>,
    explorer: Arc<dyn Turn>,
    context: Arc<dyn ProjectContext>,
    learning: Arc<LearningRepo>,
    checkpoints: Arc<dyn StateStore>,
    cancel: Arc<AtomicBool>,
    wake: Arc<Notify>,
}

impl EvolutionWorker {
    /// Build a worker for `project_key`. `max_exploration_steps` caps the
    /// `explorer`'s `TurnConfig::max_turns` for the Exploring phase;
    /// `interval_ms` is the sleep between iterations.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        project_key: impl Into<String>,
        questions_per_iteration: u32,
        max_exploration_steps: u32,
        interval_ms: u64,
        guard: Arc<Guard>,
        generator: Arc<dyn QuestionSource>,
        explorer: Arc<dyn Turn>,
        context: Arc<dyn ProjectContext>,
        learning: Arc<LearningRepo>,
        checkpoints: Arc<dyn StateStore>,
    ) -> Self {
        Self {
            project_key: project_key.into(),
            questions_per_iteration,
            max_exploration_steps,
            interval_ms,
            guard,
            generator,
            explorer,
            context,
            learning,
            checkpoints,
            cancel: Arc::new(AtomicBool::new(false)),
            wake: Arc::new(Notify::new()),
        }
    }

    fn scope(&self) -> Scope {
        Scope::Custom(format!("project:{}", self.project_key))
    }

    /// The cancellation flag and wake signal a [`crate::supervisor::Supervisor`]
    /// uses to stop this worker between sleeps.
    pub fn cancel_handle(&self) -> (Arc<AtomicBool>, Arc<Notify>) {
        (self.cancel.clone(), self.wake.clone())
    }

    async fn load_state(&self) -> Result<EvolutionState, EvolutionError> {
        match self.checkpoints.read(&self.scope(), CHECKPOINT_KEY).await {
            Ok(Some(value)) => Ok(serde_json::from_value(value).unwrap_or_else(|_| EvolutionState::new(Utc::now()))),
            Ok(None) => Ok(EvolutionState::new(Utc::now())),
            Err(e) => Err(EvolutionError::Fatal(e.to_string())),
        }
    }

    async fn persist(&self, state: &EvolutionState) -> Result<(), EvolutionError> {
        self.checkpoints
            .write(
                &self.scope(),
                CHECKPOINT_KEY,
                serde_json::to_value(state).unwrap(),
            )
            .await
            .map_err(|e| EvolutionError::Fatal(e.to_string()))
    }

    /// Run until cancelled or a fatal error occurs. A resumable phase
    /// found on disk at startup is observed (logged) but re-entered from
    /// [`EvolutionState::begin_iteration`] rather than replayed
    /// step-by-step — the bounded exploration turn is re-run from
    /// scratch, which is simpler and cheap enough at this loop's step
    /// counts to not warrant resuming mid-exploration.
    pub async fn run(&self) -> Result<(), EvolutionError> {
        let mut state = self.load_state().await?;
        if state.phase.is_resumable() {
            info!(
                project = %self.project_key,
                phase = ?state.phase,
                prior_steps = state.partial_steps.len(),
                "resuming after an interrupted iteration; restarting it rather than replaying its steps",
            );
        }

        loop {
            if self.cancel.load(Ordering::Relaxed) {
                return Err(EvolutionError::Cancelled);
            }

            state.begin_iteration(Utc::now());
            self.persist(&state).await?;

            match self.run_iteration(&mut state).await {
                Ok(()) => {}
                Err(EvolutionError::Cancelled) => return Err(EvolutionError::Cancelled),
                Err(EvolutionError::Fatal(message)) => {
                    warn!(project = %self.project_key, error = %message, "evolution iteration failed");
                    state.phase = EvolutionPhase::Idle;
                    state.stop_reason = Some(message);
                    state.last_updated_at = Utc::now();
                    self.persist(&state).await?;
                }
            }

            if self.sleep_or_wake().await {
                return Err(EvolutionError::Cancelled);
            }
        }
    }

    /// Sleep for `interval_ms` unless woken early; returns `true` if the
    /// wake was a cancellation.
    async fn sleep_or_wake(&self) -> bool {
        tokio::select! {
            _ = tokio::time::sleep(std::time::Duration::from_millis(self.interval_ms)) => false,
            _ = self.wake.notified() => self.cancel.load(Ordering::Relaxed),
        }
    }

    async fn run_iteration(&self, state: &mut EvolutionState) -> Result<(), EvolutionError> {
        state.phase = EvolutionPhase::CheckingBackoff;
        self.persist(state).await?;

        match self
            .guard
            .should_skip_question(&self.project_key)
            .await
            .map_err(|e| EvolutionError::Fatal(e.to_string()))?
        {
            SkipDecision::Proceed => {}
            SkipDecision::Skip { reason, .. } => {
                info!(project = %self.project_key, %reason, "skipping iteration");
                return self.idle_with_reason(state, reason).await;
            }
        }

        state.phase = EvolutionPhase::GeneratingQuestion;
        self.persist(state).await?;

        let question_reservation = self
            .guard
            .reserve_question(&self.project_key)
            .await
            .map_err(|e| EvolutionError::Fatal(e.to_string()))?;

        let exclude: HashSet<String> = self
            .guard
            .recent_question_hashes(&self.project_key)
            .await
            .map_err(|e| EvolutionError::Fatal(e.to_string()))?
            .into_iter()
            .collect();

        let request = GenerateRequest {
            project_context: self.context.describe().await,
            recent_questions: vec![],
            count: self.questions_per_iteration,
            ..GenerateRequest::default()
        };

        let candidates = self
            .generator
            .generate(&request, &exclude)
            .await
            .map_err(|e| EvolutionError::Fatal(e.to_string()))?;

        let Some(chosen) = candidates.into_iter().next() else {
            question_reservation.commit();
            return self
                .idle_with_reason(state, "no candidate questions generated".to_string())
                .await;
        };
        question_reservation.commit();

        let hash = fingerprint_text(&chosen.question);
        let stalled = self
            .guard
            .record_question_hash(&self.project_key, &hash)
            .await
            .map_err(|e| EvolutionError::Fatal(e.to_string()))?;
        if stalled {
            return self
                .idle_with_reason(state, "duplicate question stall".to_string())
                .await;
        }

        state.current_question = Some(chosen.question.clone());
        state.current_question_hash = Some(hash);
        self.persist(state).await?;

        state.phase = EvolutionPhase::Exploring;
        self.persist(state).await?;

        let exploration_reservation = self
            .guard
            .reserve_exploration(&self.project_key)
            .await
            .map_err(|e| EvolutionError::Fatal(e.to_string()))?;

        let input = TurnInput {
            config: Some(TurnConfig {
                max_turns: Some(self.max_exploration_steps),
                ..TurnConfig::default()
            }),
            ..TurnInput::new(Content::text(chosen.question.clone()), TriggerType::Schedule)
        };

        let output = self.explorer.execute(input).await;
        exploration_reservation.commit();

        let output = match output {
            Ok(output) => output,
            Err(e) => {
                self.guard
                    .record_failure(&self.project_key)
                    .await
                    .map_err(|e| EvolutionError::Fatal(e.to_string()))?;
                return Err(EvolutionError::Fatal(e.to_string()));
            }
        };

        match &output.exit_reason {
            ExitReason::Complete => {
                self.guard
                    .record_success(&self.project_key)
                    .await
                    .map_err(|e| EvolutionError::Fatal(e.to_string()))?;
            }
            other => {
                if let ExitReason::ObserverHalt { reason } = other {
                    warn!(project = %self.project_key, %reason, "exploration halted by doom-loop guard");
                }
                self.guard
                    .record_failure(&self.project_key)
                    .await
                    .map_err(|e| EvolutionError::Fatal(e.to_string()))?;
            }
        }

        state.phase = EvolutionPhase::Summarizing;
        self.persist(state).await?;

        let succeeded = matches!(output.exit_reason, ExitReason::Complete);
        let summary = ExplorationSummary {
            answer: output.message.as_text().unwrap_or_default().to_string(),
            confidence: if succeeded {
                Decimal::new(8, 1)
            } else {
                Decimal::new(3, 1)
            },
            source_files: vec![],
            tags: vec![],
        };

        let exploration_path: Vec<ToolCallStep> = output
            .metadata
            .tools_called
            .iter()
            .map(|call| ToolCallStep {
                tool_name: call.name.clone(),
                parameters: serde_json::Value::Null,
                result_summary: if call.success {
                    "succeeded".to_string()
                } else {
                    "failed".to_string()
                },
                timestamp: Utc::now(),
            })
            .collect();

        state.partial_steps = exploration_path
            .iter()
            .map(|step| crate::state::ToolCallStep {
                tool_name: step.tool_name.clone(),
                parameters: step.parameters.clone(),
                result_summary: step.result_summary.clone(),
                timestamp: step.timestamp,
            })
            .collect();
        state.exploration_progress = state.partial_steps.len() as u32;

        state.phase = EvolutionPhase::Persisting;
        self.persist(state).await?;

        let mut record = LearningRecord::new(
            format!("{}-{}", self.project_key, state.total_iterations),
            self.project_key.clone(),
            Utc::now(),
            chosen.question.clone(),
            question_type_label(chosen.question_type),
            summary.answer,
            exploration_path,
            summary.confidence,
        );
        record.source_files = summary.source_files;
        record.tags = summary.tags;
        self.learning
            .put(&record)
            .await
            .map_err(|e| EvolutionError::Fatal(e.to_string()))?;

        if succeeded {
            state.successful_iterations += 1;
        }
        state.phase = EvolutionPhase::Idle;
        state.current_question = None;
        state.current_question_hash = None;
        state.last_updated_at = Utc::now();
        self.persist(state).await?;

        Ok(())
    }

    async fn idle_with_reason(
        &self,
        state: &mut EvolutionState,
        reason: String,
    ) -> Result<(), EvolutionError> {
        state.phase = EvolutionPhase::Idle;
        state.stop_reason = Some(reason);
        state.last_updated_at = Utc::now();
        self.persist(state).await?;
        Ok(())
    }
}
