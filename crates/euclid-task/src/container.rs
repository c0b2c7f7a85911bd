use std::collections::BTreeMap;

use async_trait::async_trait;
use euclid_config::ContainerTaskRef;
use serde::{Deserialize, Serialize};

use crate::error::TaskError;

/// Everything needed to start one container task.
#[derive(Debug, Clone, PartialEq)]
pub struct LaunchRequest {
  pub execution_id: String,
  pub state_id: String,
  /// Placement and image. Passed through to the scheduler as-is.
  pub task: ContainerTaskRef,
  /// Flat launch parameters, e.g. `operandA = "6"`.
  pub parameters: BTreeMap<String, String>,
}

/// Opaque reference to a launched task.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskHandle {
  pub task_id: String,
}

/// Scheduler-side status of a launched task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TaskStatus {
  Provisioning,
  Running,
  Stopped {
    /// Container exit code. `None` when the task never ran to completion
    /// (killed, failed to start).
    exit_code: Option<i32>,
    reason: String,
  },
}

impl TaskStatus {
  pub fn is_terminal(&self) -> bool {
    matches!(self, TaskStatus::Stopped { .. })
  }

  pub fn succeeded(&self) -> bool {
    matches!(self, TaskStatus::Stopped { exit_code: Some(0), .. })
  }
}

/// An asynchronous, isolated worker scheduler.
///
/// `launch` returns as soon as the scheduler accepts the task; acceptance says
/// nothing about the outcome. Callers wanting synchronous semantics poll
/// `describe` until the status is terminal.
#[async_trait]
pub trait ContainerLauncher: Send + Sync {
  async fn launch(&self, request: LaunchRequest) -> Result<TaskHandle, TaskError>;

  async fn describe(&self, handle: &TaskHandle) -> Result<TaskStatus, TaskError>;

  /// Ask the scheduler to stop the task. Stopping an already stopped task is
  /// not an error.
  async fn stop(&self, handle: &TaskHandle, reason: &str) -> Result<(), TaskError>;

  /// Drop any bookkeeping for a task the caller is done with: its terminal
  /// status has been observed, or a stop has been requested. The handle is
  /// not valid afterwards.
  async fn release(&self, _handle: &TaskHandle) {}
}

/// Environment variable name for a launch parameter: `objectKey` → `OBJECT_KEY`.
pub fn env_var_name(parameter: &str) -> String {
  let mut name = String::with_capacity(parameter.len() + 4);
  let mut prev_lower = false;
  for c in parameter.chars() {
    if c.is_ascii_uppercase() && prev_lower {
      name.push('_');
    }
    if c == '-' || c == '.' {
      name.push('_');
      prev_lower = false;
      continue;
    }
    prev_lower = c.is_ascii_lowercase() || c.is_ascii_digit();
    name.push(c.to_ascii_uppercase());
  }
  name
}
