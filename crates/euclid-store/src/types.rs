use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use sqlx::types::Json;

/// Status of an execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum ExecutionStatus {
  Running,
  Succeeded,
  Failed,
}

impl ExecutionStatus {
  pub fn is_terminal(self) -> bool {
    !matches!(self, ExecutionStatus::Running)
  }
}

/// Failure classes. Every class is terminal for the execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
  /// The request was rejected by the ingest step.
  Validation,
  /// A parameter reference could not be resolved.
  Binding,
  /// An invoked function or container task failed or was unreachable.
  Invocation,
  /// The caller or a timeout aborted the execution.
  Cancelled,
}

/// Why an execution failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Failure {
  pub kind: FailureKind,
  pub state: String,
  pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StateOutcome {
  Succeeded,
  Failed,
}

/// One attempted state, appended when the state finishes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
  pub state: String,
  /// `invoke_function` or `invoke_container_task_sync`.
  pub kind: String,
  pub outcome: StateOutcome,
  pub attempts: u32,
  pub started_at: DateTime<Utc>,
  pub finished_at: DateTime<Utc>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub output: Option<serde_json::Value>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub error: Option<String>,
}

/// An execution as stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionRecord {
  pub execution_id: String,
  pub workflow_id: String,
  pub status: ExecutionStatus,
  pub current_state: Option<String>,
  pub input: Json<serde_json::Value>,
  #[serde(rename = "accumulatedData")]
  pub accumulated: Json<serde_json::Value>,
  pub history: Json<Vec<HistoryEntry>>,
  pub failure: Option<Json<Failure>>,
  pub started_at: DateTime<Utc>,
  pub completed_at: Option<DateTime<Utc>>,
}

impl ExecutionRecord {
  /// A fresh record for an execution that is about to enter `start_state`.
  pub fn started(
    execution_id: impl Into<String>,
    workflow_id: impl Into<String>,
    start_state: impl Into<String>,
    input: serde_json::Value,
    accumulated: serde_json::Value,
  ) -> Self {
    Self {
      execution_id: execution_id.into(),
      workflow_id: workflow_id.into(),
      status: ExecutionStatus::Running,
      current_state: Some(start_state.into()),
      input: Json(input),
      accumulated: Json(accumulated),
      history: Json(Vec::new()),
      failure: None,
      started_at: Utc::now(),
      completed_at: None,
    }
  }
}
