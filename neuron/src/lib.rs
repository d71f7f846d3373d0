#![deny(missing_docs)]
//! # neuron — umbrella crate
//!
//! Provides a single import surface for composing Neuron agentic systems.
//! Re-exports protocol traits and key implementations behind feature flags,
//! plus a `prelude` for the happy path.

#[cfg(feature = "core")]
pub use layer0;
#[cfg(feature = "core")]
pub use neuron_context;
#[cfg(feature = "hooks")]
pub use neuron_hooks;
#[cfg(feature = "op-react")]
pub use neuron_op_react;
#[cfg(feature = "orch-kit")]
pub use neuron_orch_kit;
#[cfg(feature = "provider-anthropic")]
pub use neuron_provider_anthropic;
#[cfg(feature = "provider-ollama")]
pub use neuron_provider_ollama;
#[cfg(feature = "provider-openai")]
pub use neuron_provider_openai;
#[cfg(feature = "state-fs")]
pub use neuron_state_fs;
#[cfg(feature = "state-memory")]
pub use neuron_state_memory;
#[cfg(feature = "core")]
pub use neuron_tool;
#[cfg(feature = "core")]
pub use neuron_turn;
#[cfg(feature = "vector")]
pub use neuron_vector;
#[cfg(feature = "embed")]
pub use neuron_embed;
#[cfg(feature = "vectorize")]
pub use neuron_vectorize;
#[cfg(feature = "guard")]
pub use neuron_guard;
#[cfg(feature = "questions")]
pub use neuron_questions;
#[cfg(feature = "evolution")]
pub use neuron_evolution;
#[cfg(feature = "state-repo")]
pub use neuron_state_repo;

/// Happy-path imports for composing Neuron systems.
pub mod prelude {
    #[cfg(feature = "core")]
    pub use layer0::{
        AgentId, Content, ContentBlock, Effect, Environment, ExitReason, Hook, HookAction,
        HookContext, HookPoint, Scope, SessionId, StateReader, StateStore, Turn, TurnConfig,
        TurnInput, TurnOutput, WorkflowId,
    };

    #[cfg(feature = "hooks")]
    pub use neuron_hooks::HookRegistry;

    #[cfg(feature = "core")]
    pub use neuron_tool::{ToolDyn, ToolError, ToolRegistry};

    #[cfg(feature = "core")]
    pub use neuron_turn::provider::{Provider, ProviderError};

    #[cfg(feature = "op-react")]
    pub use neuron_op_react::{ReactConfig, ReactTurn};

    #[cfg(feature = "orch-kit")]
    pub use neuron_orch_kit::{Kit, OrchestratedRunner};

    #[cfg(feature = "state-memory")]
    pub use neuron_state_memory::MemoryStore;

    #[cfg(feature = "state-fs")]
    pub use neuron_state_fs::FsStore;

    #[cfg(feature = "state-repo")]
    pub use neuron_state_repo::{LearningRecord, LearningRepo, TableStore};

    #[cfg(feature = "vector")]
    pub use neuron_vector::{Fragment, FragmentKind, TieredStore, VectorStore};

    #[cfg(feature = "embed")]
    pub use neuron_embed::{EmbedClient, RerankClient};

    #[cfg(feature = "vectorize")]
    pub use neuron_vectorize::Vectorizer;

    #[cfg(feature = "guard")]
    pub use neuron_guard::{Guard, GuardConfig, SkipDecision};

    #[cfg(feature = "questions")]
    pub use neuron_questions::{Generator, QuestionType};

    #[cfg(feature = "evolution")]
    pub use neuron_evolution::{EvolutionState, EvolutionWorker, NeuronConfig, Supervisor};
}
