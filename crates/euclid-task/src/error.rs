use thiserror::Error;

/// Errors reported by functions and container tasks.
#[derive(Debug, Error)]
pub enum TaskError {
  /// The input was rejected before any side effect happened.
  #[error("invalid input: {message}")]
  Validation { message: String },

  /// No function is registered under this name.
  #[error("function not registered: {0}")]
  FunctionNotFound(String),

  /// The scheduler refused to start the task (capacity, bad definition, ...).
  #[error("launch rejected: {message}")]
  LaunchRejected { message: String },

  /// The handle does not refer to a known task.
  #[error("task not found: {0}")]
  TaskNotFound(String),

  /// The unit ran and reported failure.
  #[error("{message}")]
  Failed { message: String },

  #[error("storage error: {0}")]
  Storage(#[from] euclid_artifact::Error),

  #[error("io error: {0}")]
  Io(#[from] std::io::Error),
}

impl TaskError {
  pub fn validation(message: impl Into<String>) -> Self {
    Self::Validation {
      message: message.into(),
    }
  }

  pub fn launch_rejected(message: impl Into<String>) -> Self {
    Self::LaunchRejected {
      message: message.into(),
    }
  }

  pub fn failed(message: impl Into<String>) -> Self {
    Self::Failed {
      message: message.into(),
    }
  }

  pub fn is_validation(&self) -> bool {
    matches!(self, TaskError::Validation { .. })
  }
}
