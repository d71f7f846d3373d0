//! Per-project supervision: one task per active project, started and
//! stopped independently of the others.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::worker::{EvolutionError, EvolutionWorker};

/// Whether a project's worker is currently running, stopped, or has
/// hit a fatal error and needs operator attention.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EvolutionStatus {
    /// No worker registered for this project.
    Unknown,
    /// Running normally.
    Running,
    /// Stopped by an explicit `stop()` call.
    Stopped,
    /// The worker's `run` returned a fatal error; it was not restarted.
    Halted {
        /// The error that halted it.
        reason: String,
    },
}

struct Handle {
    join: JoinHandle<()>,
    cancel: Arc<AtomicBool>,
    wake: Arc<Notify>,
    status: Arc<Mutex<EvolutionStatus>>,
}

/// Owns the set of currently-running per-project evolution workers.
///
/// One `tokio::spawn`ed task per project, tracked by project key. A fatal
/// error in one project's worker never affects another's — each task
/// catches its own `EvolutionError::Fatal` and records it rather than
/// propagating a panic.
#[derive(Default)]
pub struct Supervisor {
    workers: Mutex<HashMap<String, Handle>>,
}

impl Supervisor {
    /// An empty supervisor with no projects running.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start `worker` under its project key, spawning its `run` loop.
    /// Replaces (stopping first) any existing worker for the same key.
    pub async fn start(&self, project_key: impl Into<String>, worker: EvolutionWorker) {
        let project_key = project_key.into();
        self.stop(&project_key).await;

        let (cancel, wake) = worker.cancel_handle();
        let status = Arc::new(Mutex::new(EvolutionStatus::Running));
        let status_for_task = status.clone();
        let key_for_task = project_key.clone();

        let join = tokio::spawn(async move {
            match worker.run().await {
                Ok(()) => {}
                Err(EvolutionError::Cancelled) => {
                    *status_for_task.lock().await = EvolutionStatus::Stopped;
                    info!(project = %key_for_task, "evolution worker stopped");
                    return;
                }
                Err(EvolutionError::Fatal(reason)) => {
                    error!(project = %key_for_task, %reason, "evolution worker halted");
                    *status_for_task.lock().await = EvolutionStatus::Halted { reason };
                    return;
                }
            }
            *status_for_task.lock().await = EvolutionStatus::Stopped;
        });

        self.workers.lock().await.insert(
            project_key,
            Handle {
                join,
                cancel,
                wake,
                status,
            },
        );
    }

    /// Cooperatively cancel and await the project's worker, if running.
    /// No-op if no worker is registered for that key.
    pub async fn stop(&self, project_key: &str) {
        let handle = self.workers.lock().await.remove(project_key);
        if let Some(handle) = handle {
            handle.cancel.store(true, Ordering::SeqCst);
            handle.wake.notify_one();
            let _ = handle.join.await;
        }
    }

    /// Stop every registered project's worker.
    pub async fn stop_all(&self) {
        let keys: Vec<String> = self.workers.lock().await.keys().cloned().collect();
        for key in keys {
            self.stop(&key).await;
        }
    }

    /// Current status for `project_key`.
    pub async fn status(&self, project_key: &str) -> EvolutionStatus {
        match self.workers.lock().await.get(project_key) {
            Some(handle) => handle.status.lock().await.clone(),
            None => EvolutionStatus::Unknown,
        }
    }

    /// Project keys currently registered (running, stopped-but-not-yet-reaped,
    /// or halted).
    pub async fn active_projects(&self) -> Vec<String> {
        self.workers.lock().await.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::worker::{ProjectContext, QuestionSource};
    use async_trait::async_trait;
    use layer0::content::Content;
    use layer0::error::TurnError;
    use layer0::state::StateStore;
    use layer0::turn::{ExitReason, Turn, TurnInput, TurnOutput};
    use neuron_guard::{Guard, GuardConfig};
    use neuron_questions::{CandidateQuestion, GenerateError, GenerateRequest};
    use neuron_state_memory::MemoryStore;
    use neuron_state_repo::LearningRepo;
    use std::collections::HashSet;

    struct NeverAsks;

    #[async_trait]
    impl QuestionSource for NeverAsks {
        async fn generate(
            &self,
            _request: &GenerateRequest,
            _exclude_hashes: &HashSet<String>,
        ) -> Result<Vec<CandidateQuestion>, GenerateError> {
            Ok(vec![])
        }
    }

    struct StubContext;

    #[async_trait]
    impl ProjectContext for StubContext {
        async fn describe(&self) -> String {
            String::new()
        }
    }

    struct StubExplorer;

    #[async_trait]
    impl Turn for StubExplorer {
        async fn execute(&self, _input: TurnInput) -> Result<TurnOutput, TurnError> {
            Ok(TurnOutput::new(Content::text(""), ExitReason::Complete))
        }
    }

    fn make_worker(project_key: &str) -> EvolutionWorker {
        let store: Arc<dyn StateStore> = Arc::new(MemoryStore::new());
        EvolutionWorker::new(
            project_key,
            1,
            5,
            10,
            Arc::new(Guard::new(store.clone(), GuardConfig::default())),
            Arc::new(NeverAsks),
            Arc::new(StubExplorer),
            Arc::new(StubContext),
            Arc::new(LearningRepo::new(Arc::new(MemoryStore::new()))),
            store,
        )
    }

    #[tokio::test]
    async fn unknown_project_reports_unknown_status() {
        let sup = Supervisor::new();
        assert_eq!(sup.status("ghost").await, EvolutionStatus::Unknown);
    }

    #[tokio::test]
    async fn start_then_stop_transitions_to_stopped() {
        let sup = Supervisor::new();
        sup.start("p1", make_worker("p1")).await;
        assert_eq!(sup.active_projects().await, vec!["p1".to_string()]);

        sup.stop("p1").await;
        // stop() removes the handle entirely, so status reverts to Unknown
        // once the task is reaped rather than lingering as "Stopped".
        assert_eq!(sup.status("p1").await, EvolutionStatus::Unknown);
        assert!(sup.active_projects().await.is_empty());
    }

    #[tokio::test]
    async fn starting_twice_replaces_the_prior_worker() {
        let sup = Supervisor::new();
        sup.start("p1", make_worker("p1")).await;
        sup.start("p1", make_worker("p1")).await;
        assert_eq!(sup.active_projects().await, vec!["p1".to_string()]);
    }

    #[tokio::test]
    async fn stop_all_clears_every_project() {
        let sup = Supervisor::new();
        sup.start("p1", make_worker("p1")).await;
        sup.start("p2", make_worker("p2")).await;
        sup.stop_all().await;
        assert!(sup.active_projects().await.is_empty());
    }
}
