#![deny(missing_docs)]
//! Per-project backoff, daily quotas, and duplicate-stall detection.
//!
//! [`Guard`] wraps a `layer0::StateStore` the same way `ReactTurn` takes
//! its state reader as a dependency: backoff/quota/recent-question state
//! is restored from storage at startup and persisted on every
//! success/failure so a restart resumes mid-cooldown rather than forgetting
//! it ever failed.

pub mod backoff;
pub mod fingerprint;
pub mod quota;

use std::sync::Arc;

use backoff::BackoffState;
use chrono::Utc;
use layer0::effect::Scope;
use layer0::state::StateStore;
use quota::{QuotaExhausted, QuotaKind, QuotaReservation, QuotaState};
use serde::{Deserialize, Serialize};
use thiserror::Error;

const BACKOFF_KEY: &str = "guard:backoff";
const QUOTA_KEY: &str = "guard:quota";
const RECENT_QUESTIONS_KEY: &str = "guard:recent_questions";

/// Static tuning for a [`Guard`].
#[derive(Debug, Clone)]
pub struct GuardConfig {
    /// Base backoff delay in milliseconds.
    pub base_ms: u64,
    /// Backoff delay cap in milliseconds.
    pub cap_ms: u64,
    /// Daily quota for generated questions.
    pub daily_question_quota: u32,
    /// Daily quota for exploration iterations.
    pub daily_exploration_quota: u32,
    /// Number of trailing iterations that must share a question hash
    /// before a project is considered stalled on duplicates.
    pub duplicate_stall_threshold: u32,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            base_ms: 1_000,
            cap_ms: 10 * 60 * 1000,
            daily_question_quota: 50,
            daily_exploration_quota: 50,
            duplicate_stall_threshold: 3,
        }
    }
}

/// Errors from guard operations.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum GuardError {
    /// The project is within its backoff window.
    #[error("project is within backoff for another {remaining_ms}ms")]
    BackoffActive {
        /// Milliseconds remaining before the backoff window ends.
        remaining_ms: i64,
    },

    /// A daily quota has been exhausted.
    #[error(transparent)]
    QuotaExhausted(#[from] QuotaExhausted),

    /// The last N iterations generated the same question hash.
    #[error("duplicate question stall: {count} consecutive repeats of the same question")]
    DuplicateStall {
        /// How many consecutive repeats were observed.
        count: u32,
    },

    /// Underlying state store failure.
    #[error(transparent)]
    Store(#[from] layer0::error::StateError),
}

/// Outcome of [`Guard::should_skip_question`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipDecision {
    /// Proceed; no reason to skip.
    Proceed,
    /// Skip, with a human-readable reason and optional ETA.
    Skip {
        /// Why the caller should skip this iteration.
        reason: String,
        /// Milliseconds remaining until backoff clears, if that's the
        /// reason.
        remaining_backoff_ms: Option<i64>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct RecentQuestions {
    hashes: Vec<String>,
}

/// Per-project doom-loop guard, backed by a `layer0::StateStore`.
pub struct Guard {
    store: Arc<dyn StateStore>,
    config: GuardConfig,
}

impl Guard {
    /// Build a guard over `store` with `config`.
    pub fn new(store: Arc<dyn StateStore>, config: GuardConfig) -> Self {
        Self { store, config }
    }

    fn scope(project_key: &str) -> Scope {
        Scope::Custom(format!("project:{project_key}"))
    }

    async fn load_backoff(&self, project_key: &str) -> Result<BackoffState, GuardError> {
        let scope = Self::scope(project_key);
        let value = self.store.read(&scope, BACKOFF_KEY).await?;
        Ok(match value {
            Some(v) => serde_json::from_value(v).unwrap_or_default(),
            None => BackoffState::default(),
        })
    }

    async fn save_backoff(&self, project_key: &str, state: &BackoffState) -> Result<(), GuardError> {
        let scope = Self::scope(project_key);
        self.store
            .write(&scope, BACKOFF_KEY, serde_json::to_value(state).unwrap())
            .await?;
        Ok(())
    }

    async fn load_quota(&self, project_key: &str) -> Result<QuotaState, GuardError> {
        let scope = Self::scope(project_key);
        let value = self.store.read(&scope, QUOTA_KEY).await?;
        Ok(match value {
            Some(v) => serde_json::from_value(v).unwrap_or_else(|_| QuotaState::new(quota::today_utc())),
            None => QuotaState::new(quota::today_utc()),
        })
    }

    async fn save_quota(&self, project_key: &str, state: &QuotaState) -> Result<(), GuardError> {
        let scope = Self::scope(project_key);
        self.store
            .write(&scope, QUOTA_KEY, serde_json::to_value(state).unwrap())
            .await?;
        Ok(())
    }

    async fn load_recent_questions(&self, project_key: &str) -> Result<RecentQuestions, GuardError> {
        let scope = Self::scope(project_key);
        let value = self.store.read(&scope, RECENT_QUESTIONS_KEY).await?;
        Ok(match value {
            Some(v) => serde_json::from_value(v).unwrap_or_default(),
            None => RecentQuestions::default(),
        })
    }

    /// Hashes of recently-generated questions, for callers (C9's
    /// generator) that want to exclude them from a fresh batch before
    /// they're even scored.
    pub async fn recent_question_hashes(&self, project_key: &str) -> Result<Vec<String>, GuardError> {
        Ok(self.load_recent_questions(project_key).await?.hashes)
    }

    /// Record the hash of the question generated this iteration and
    /// report whether the trailing window is now all-duplicate.
    pub async fn record_question_hash(&self, project_key: &str, hash: &str) -> Result<bool, GuardError> {
        let mut recent = self.load_recent_questions(project_key).await?;
        recent.hashes.push(hash.to_string());
        let window = self.config.duplicate_stall_threshold as usize + 1;
        if recent.hashes.len() > window {
            let drop = recent.hashes.len() - window;
            recent.hashes.drain(0..drop);
        }
        let scope = Self::scope(project_key);
        self.store
            .write(&scope, RECENT_QUESTIONS_KEY, serde_json::to_value(&recent).unwrap())
            .await?;

        let stalled = recent.hashes.len() as u32 > self.config.duplicate_stall_threshold
            && recent.hashes.iter().all(|h| h == hash);
        Ok(stalled)
    }

    /// Decide whether `project_key` should skip its next iteration:
    /// within backoff, daily quota exhausted, or a duplicate-question
    /// stall.
    pub async fn should_skip_question(&self, project_key: &str) -> Result<SkipDecision, GuardError> {
        let backoff = self.load_backoff(project_key).await?;
        let now = Utc::now();
        if let Some(remaining) = backoff.remaining(now) {
            return Ok(SkipDecision::Skip {
                reason: "within backoff".to_string(),
                remaining_backoff_ms: Some(remaining.num_milliseconds()),
            });
        }

        let mut quota = self.load_quota(project_key).await?;
        quota.roll_to(quota::today_utc());
        if quota.questions_today >= self.config.daily_question_quota {
            return Ok(SkipDecision::Skip {
                reason: "daily quota".to_string(),
                remaining_backoff_ms: None,
            });
        }

        let recent = self.load_recent_questions(project_key).await?;
        let threshold = self.config.duplicate_stall_threshold as usize;
        if recent.hashes.len() > threshold {
            let tail = &recent.hashes[recent.hashes.len() - threshold - 1..];
            if tail.windows(2).all(|w| w[0] == w[1]) {
                return Ok(SkipDecision::Skip {
                    reason: "duplicate stall".to_string(),
                    remaining_backoff_ms: None,
                });
            }
        }

        Ok(SkipDecision::Proceed)
    }

    /// Reset failure state on success.
    pub async fn record_success(&self, project_key: &str) -> Result<(), GuardError> {
        let mut backoff = self.load_backoff(project_key).await?;
        backoff.record_success();
        self.save_backoff(project_key, &backoff).await
    }

    /// Record a failure, setting a fresh capped-exponential backoff
    /// window.
    pub async fn record_failure(&self, project_key: &str) -> Result<(), GuardError> {
        let mut backoff = self.load_backoff(project_key).await?;
        backoff.record_failure(Utc::now(), self.config.base_ms, self.config.cap_ms);
        self.save_backoff(project_key, &backoff).await
    }

    /// Reserve one unit of question quota for `project_key`. The caller
    /// must `.commit()` the reservation on success; dropping it without
    /// committing refunds the unit.
    pub async fn reserve_question(&self, project_key: &str) -> Result<PersistedReservation, GuardError> {
        self.reserve(project_key, QuotaKind::Questions).await
    }

    /// Reserve one unit of exploration quota for `project_key`.
    pub async fn reserve_exploration(&self, project_key: &str) -> Result<PersistedReservation, GuardError> {
        self.reserve(project_key, QuotaKind::Explorations).await
    }

    async fn reserve(&self, project_key: &str, kind: QuotaKind) -> Result<PersistedReservation, GuardError> {
        let mut quota = self.load_quota(project_key).await?;
        let limit = match kind {
            QuotaKind::Questions => self.config.daily_question_quota,
            QuotaKind::Explorations => self.config.daily_exploration_quota,
        };
        let today = quota::today_utc();
        {
            let reservation: QuotaReservation<'_> = quota::reserve(&mut quota, kind, limit, today)?;
            reservation.commit();
        }
        self.save_quota(project_key, &quota).await?;
        Ok(PersistedReservation {
            store: self.store.clone(),
            project_key: project_key.to_string(),
            kind,
            committed: false,
        })
    }
}

/// A quota reservation that has already been persisted to the store.
/// Unlike [`QuotaReservation`] (which refunds an in-memory counter on
/// drop), this refunds by writing the decremented counter back to
/// storage, since the increment it undoes already crossed the store
/// boundary.
pub struct PersistedReservation {
    store: Arc<dyn StateStore>,
    project_key: String,
    kind: QuotaKind,
    committed: bool,
}

impl PersistedReservation {
    /// Finalize the reservation; no refund will occur.
    pub fn commit(mut self) {
        self.committed = true;
    }
}

impl Drop for PersistedReservation {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        let store = self.store.clone();
        let project_key = self.project_key.clone();
        let kind = self.kind;
        tokio::spawn(async move {
            let scope = Scope::Custom(format!("project:{project_key}"));
            if let Ok(Some(value)) = store.read(&scope, QUOTA_KEY).await {
                if let Ok(mut quota) = serde_json::from_value::<QuotaState>(value) {
                    match kind {
                        QuotaKind::Questions => {
                            quota.questions_today = quota.questions_today.saturating_sub(1)
                        }
                        QuotaKind::Explorations => {
                            quota.explorations_today = quota.explorations_today.saturating_sub(1)
                        }
                    }
                    let _ = store.write(&scope, QUOTA_KEY, serde_json::to_value(&quota).unwrap()).await;
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use neuron_state_memory::MemoryStore;

    fn guard() -> Guard {
        Guard::new(Arc::new(MemoryStore::new()), GuardConfig::default())
    }

    #[tokio::test]
    async fn fresh_project_proceeds() {
        let g = guard();
        assert_eq!(g.should_skip_question("p1").await.unwrap(), SkipDecision::Proceed);
    }

    #[tokio::test]
    async fn failure_then_backoff_then_success_resets() {
        let g = guard();
        g.record_failure("p1").await.unwrap();
        g.record_failure("p1").await.unwrap();
        g.record_failure("p1").await.unwrap();

        match g.should_skip_question("p1").await.unwrap() {
            SkipDecision::Skip { reason, .. } => assert_eq!(reason, "within backoff"),
            other => panic!("expected skip, got {other:?}"),
        }

        g.record_success("p1").await.unwrap();
        let backoff = g.load_backoff("p1").await.unwrap();
        assert_eq!(backoff.consecutive_errors, 0);
    }

    #[tokio::test]
    async fn question_quota_exhausts_and_blocks() {
        let g = Guard::new(
            Arc::new(MemoryStore::new()),
            GuardConfig {
                daily_question_quota: 1,
                ..GuardConfig::default()
            },
        );
        let r = g.reserve_question("p1").await.unwrap();
        r.commit();
        match g.should_skip_question("p1").await.unwrap() {
            SkipDecision::Skip { reason, .. } => assert_eq!(reason, "daily quota"),
            other => panic!("expected skip, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn duplicate_question_hashes_trigger_stall() {
        let g = guard();
        assert!(!g.record_question_hash("p1", "h1").await.unwrap());
        assert!(!g.record_question_hash("p1", "h1").await.unwrap());
        assert!(!g.record_question_hash("p1", "h1").await.unwrap());
        // 4th consecutive repeat crosses the default threshold of 3.
        assert!(g.record_question_hash("p1", "h1").await.unwrap());
    }

    #[tokio::test]
    async fn recent_question_hashes_reflects_recorded_history() {
        let g = guard();
        assert!(g.recent_question_hashes("p1").await.unwrap().is_empty());
        g.record_question_hash("p1", "h1").await.unwrap();
        g.record_question_hash("p1", "h2").await.unwrap();
        assert_eq!(
            g.recent_question_hashes("p1").await.unwrap(),
            vec!["h1".to_string(), "h2".to_string()]
        );
    }

    #[tokio::test]
    async fn different_projects_are_isolated() {
        let g = guard();
        g.record_failure("p1").await.unwrap();
        assert_eq!(g.should_skip_question("p2").await.unwrap(), SkipDecision::Proceed);
    }
}
