#![deny(missing_docs)]
//! Provider plumbing shared by `layer0::Turn` implementations.
//!
//! This crate doesn't implement `Turn` itself — see `neuron-op-react` for
//! the ReAct loop. It provides the pieces that loop builds on: the model
//! provider interface, context-window strategies, wire types, and the
//! response-format conversion and extraction helpers.
//!
//! Key traits defined here:
//! - [`Provider`] — LLM provider interface (not object-safe, uses RPITIT)
//! - [`ContextStrategy`] — context window management

pub mod config;
pub mod context;
pub mod convert;
pub mod json_extract;
pub mod provider;
pub mod types;

// Re-exports
pub use config::NeuronTurnConfig;
pub use context::{ContextStrategy, NoCompaction};
pub use convert::{
    content_block_to_part, content_part_to_block, content_to_parts, content_to_user_message,
    parts_to_content,
};
pub use provider::{Provider, ProviderError};
pub use types::*;
