#![deny(missing_docs)]
//! Self-directed exploration: a resumable per-project phase loop that
//! generates a question, explores it with a bounded ReAct turn, and
//! persists what it learned, supervised independently per project.

pub mod config;
pub mod state;
pub mod supervisor;
pub mod worker;

pub use config::{ConfigError, NeuronConfig};
pub use state::{EvolutionPhase, EvolutionState, ExplorationSummary, ToolCallStep};
pub use supervisor::{EvolutionStatus, Supervisor};
pub use worker::{EvolutionError, EvolutionWorker, ProjectContext, QuestionSource};
