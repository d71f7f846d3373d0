//! Table-per-subdirectory state storage for learning records and other
//! durable loop state, plus a typed repository over the learning table.
//!
//! This crate layers two things on top of `layer0::StateStore`:
//! [`TableStore`] gives every logical table (`learning_records`,
//! `backoff_state`, evolution checkpoints, ...) its own subdirectory so a
//! prefix scan for one table never walks another's files, and
//! [`LearningRepo`] is a typed CRUD surface over the `learning_records`
//! table specifically.

mod learning;
mod table_store;

pub use learning::{LearningEmbedder, LearningRecord, LearningRepo, LearningRepoError, ToolCallStep};
pub use table_store::{MigrationError, TableStore, SCHEMA_VERSION};
