//! Runtime errors.

use euclid_store::FailureKind;
use euclid_task::TaskError;

/// Errors that end an execution.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
  /// The invoked unit rejected its input before doing any work.
  #[error("invalid input for state '{state_id}': {message}")]
  Validation { state_id: String, message: String },

  /// A reference binding did not resolve against the accumulated data.
  #[error("missing binding for parameter '{parameter}' of state '{state_id}': nothing at {path}")]
  MissingBinding {
    state_id: String,
    parameter: String,
    path: String,
  },

  /// A resolved value cannot be passed as a container launch parameter.
  #[error("invalid launch parameter '{parameter}' for state '{state_id}': {message}")]
  InvalidParameter {
    state_id: String,
    parameter: String,
    message: String,
  },

  /// The function or scheduler returned an error or was unreachable.
  #[error("invocation failed for state '{state_id}'")]
  Invocation {
    state_id: String,
    #[source]
    source: TaskError,
  },

  /// A function returned something that cannot be merged.
  #[error("invalid output from state '{state_id}': {message}")]
  InvalidOutput { state_id: String, message: String },

  /// The container task stopped unsuccessfully.
  #[error("task {task_id} for state '{state_id}' stopped with exit code {}: {reason}", display_exit(*exit_code))]
  TaskFailed {
    state_id: String,
    task_id: String,
    exit_code: Option<i32>,
    reason: String,
  },

  /// The state is not part of the workflow.
  #[error("state '{state_id}' not found in workflow")]
  StateNotFound { state_id: String },

  /// The caller cancelled, or a timeout elapsed.
  #[error("execution cancelled in state '{state_id}': {reason}")]
  Cancelled { state_id: String, reason: String },

  /// The execution record could not be persisted.
  #[error("failed to persist execution record")]
  Store(#[from] euclid_store::Error),
}

impl RuntimeError {
  /// The failure class recorded for this error.
  pub fn kind(&self) -> FailureKind {
    match self {
      RuntimeError::Validation { .. } => FailureKind::Validation,
      RuntimeError::MissingBinding { .. } => FailureKind::Binding,
      RuntimeError::Cancelled { .. } => FailureKind::Cancelled,
      RuntimeError::InvalidParameter { .. }
      | RuntimeError::Invocation { .. }
      | RuntimeError::InvalidOutput { .. }
      | RuntimeError::TaskFailed { .. }
      | RuntimeError::StateNotFound { .. }
      | RuntimeError::Store(_) => FailureKind::Invocation,
    }
  }

  /// The state the error happened in, if any.
  pub fn state_id(&self) -> Option<&str> {
    match self {
      RuntimeError::Validation { state_id, .. }
      | RuntimeError::MissingBinding { state_id, .. }
      | RuntimeError::InvalidParameter { state_id, .. }
      | RuntimeError::Invocation { state_id, .. }
      | RuntimeError::InvalidOutput { state_id, .. }
      | RuntimeError::TaskFailed { state_id, .. }
      | RuntimeError::StateNotFound { state_id }
      | RuntimeError::Cancelled { state_id, .. } => Some(state_id),
      RuntimeError::Store(_) => None,
    }
  }

  /// Whether a retry policy may re-run the state.
  pub fn is_retryable(&self) -> bool {
    matches!(
      self,
      RuntimeError::Invocation { .. } | RuntimeError::TaskFailed { .. }
    )
  }

  /// The message with its source chain, for records and responses.
  pub fn detail(&self) -> String {
    let mut message = self.to_string();
    let mut source = std::error::Error::source(self);
    while let Some(cause) = source {
      message.push_str(": ");
      message.push_str(&cause.to_string());
      source = cause.source();
    }
    message
  }
}

fn display_exit(exit_code: Option<i32>) -> String {
  exit_code.map_or_else(|| "none".to_string(), |code| code.to_string())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_kinds() {
    let validation = RuntimeError::Validation {
      state_id: "ingest".to_string(),
      message: "bad".to_string(),
    };
    assert_eq!(validation.kind(), FailureKind::Validation);
    assert!(!validation.is_retryable());

    let cancelled = RuntimeError::Cancelled {
      state_id: "compute".to_string(),
      reason: "execution cancelled".to_string(),
    };
    assert_eq!(cancelled.kind(), FailureKind::Cancelled);
    assert_eq!(cancelled.state_id(), Some("compute"));

    let launch = RuntimeError::Invocation {
      state_id: "compute".to_string(),
      source: TaskError::launch_rejected("capacity"),
    };
    assert_eq!(launch.kind(), FailureKind::Invocation);
    assert!(launch.is_retryable());
    assert_eq!(
      launch.detail(),
      "invocation failed for state 'compute': launch rejected: capacity"
    );
  }

  #[test]
  fn test_task_failed_message() {
    let err = RuntimeError::TaskFailed {
      state_id: "compute".to_string(),
      task_id: "t-1".to_string(),
      exit_code: None,
      reason: "killed".to_string(),
    };
    assert_eq!(
      err.to_string(),
      "task t-1 for state 'compute' stopped with exit code none: killed"
    );
  }
}
