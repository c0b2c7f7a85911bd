//! Euclid Store
//!
//! This crate provides the storage trait and implementations for execution
//! records. A record is the durable view of one execution: its status, the
//! state it is in, the accumulated data and the history of state outcomes.
//! Records are retained after an execution terminates for auditing.
//!
//! The [`Store`] trait defines operations for:
//! - Creating and checkpointing executions
//! - Looking up a single execution
//! - Listing executions of a workflow

mod memory;
mod sqlite;
mod types;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use sqlx::types::Json;
pub use types::{
  ExecutionRecord, ExecutionStatus, Failure, FailureKind, HistoryEntry, StateOutcome,
};

use async_trait::async_trait;

/// Error type for storage operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
  /// The requested record was not found.
  #[error("not found: {0}")]
  NotFound(String),

  /// A record with this ID already exists.
  #[error("already exists: {0}")]
  AlreadyExists(String),

  /// A database error occurred.
  #[error("database error: {0}")]
  Database(#[from] sqlx::Error),

  /// A migration failed.
  #[error("migration error: {0}")]
  Migrate(#[from] sqlx::migrate::MigrateError),
}

/// Storage trait for execution records.
#[async_trait]
pub trait Store: Send + Sync {
  /// Create a new execution record.
  async fn create_execution(&self, record: &ExecutionRecord) -> Result<(), Error>;

  /// Get an execution record by ID.
  async fn get_execution(&self, execution_id: &str) -> Result<ExecutionRecord, Error>;

  /// Overwrite the mutable parts of an execution record (status, current
  /// state, accumulated data, history, failure, completion time).
  async fn update_execution(&self, record: &ExecutionRecord) -> Result<(), Error>;

  /// List executions for a workflow, most recent first.
  async fn list_executions(&self, workflow_id: &str) -> Result<Vec<ExecutionRecord>, Error>;
}
