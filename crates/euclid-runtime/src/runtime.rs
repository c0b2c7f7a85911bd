//! Workflow runtime.

use std::sync::Arc;
use std::time::Duration;

use euclid_config::PipelineSettings;
use euclid_task::TaskRegistry;
use euclid_workflow::Workflow;
use tokio_util::sync::CancellationToken;

use crate::events::{ExecutionNotifier, NoopNotifier};
use crate::execution::WorkflowExecution;

/// Configuration for the workflow runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
  /// How often a running container task is described.
  pub poll_interval: Duration,
  /// Default timeout for a state without its own `timeout_ms`.
  pub task_timeout: Option<Duration>,
}

impl Default for RuntimeConfig {
  fn default() -> Self {
    Self {
      poll_interval: Duration::from_millis(500),
      task_timeout: None,
    }
  }
}

impl From<&PipelineSettings> for RuntimeConfig {
  fn from(settings: &PipelineSettings) -> Self {
    Self {
      poll_interval: Duration::from_millis(settings.poll_interval_ms.max(1)),
      task_timeout: settings.task_timeout_ms.map(Duration::from_millis),
    }
  }
}

/// The workflow runtime.
///
/// Owns a locked workflow together with the capabilities its states invoke
/// and the store executions are checkpointed to. Executions share nothing
/// mutable; each gets its own accumulated data and history.
pub struct WorkflowRuntime {
  pub(crate) config: RuntimeConfig,
  pub(crate) workflow: Workflow,
  pub(crate) registry: TaskRegistry,
  pub(crate) store: Arc<dyn euclid_store::Store>,
  pub(crate) notifier: Arc<dyn ExecutionNotifier>,
}

impl WorkflowRuntime {
  /// Create a new workflow runtime.
  ///
  /// # Arguments
  /// * `config` - Runtime configuration
  /// * `workflow` - The locked workflow to execute
  /// * `registry` - Functions and the container launcher states may invoke
  /// * `store` - Where execution records are checkpointed
  pub fn new(
    config: RuntimeConfig,
    workflow: Workflow,
    registry: TaskRegistry,
    store: Arc<dyn euclid_store::Store>,
  ) -> Self {
    Self {
      config,
      workflow,
      registry,
      store,
      notifier: Arc::new(NoopNotifier),
    }
  }

  pub fn with_notifier(mut self, notifier: Arc<dyn ExecutionNotifier>) -> Self {
    self.notifier = notifier;
    self
  }

  /// Execute the workflow for one request payload.
  ///
  /// Returns a `WorkflowExecution` handle. Call `.wait()` to run the execution
  /// and get the result.
  pub fn execute_workflow(
    &self,
    payload: serde_json::Value,
    cancel: CancellationToken,
  ) -> WorkflowExecution<'_> {
    let execution_id = uuid::Uuid::new_v4().to_string();
    self.execute_workflow_with_id(execution_id, payload, cancel)
  }

  /// Like [`execute_workflow`](Self::execute_workflow) with a caller-chosen
  /// execution ID.
  pub fn execute_workflow_with_id(
    &self,
    execution_id: impl Into<String>,
    payload: serde_json::Value,
    cancel: CancellationToken,
  ) -> WorkflowExecution<'_> {
    WorkflowExecution::new(self, execution_id.into(), payload, cancel)
  }

  pub fn workflow(&self) -> &Workflow {
    &self.workflow
  }

  pub fn config(&self) -> &RuntimeConfig {
    &self.config
  }

  /// The store executions are checkpointed to.
  pub fn store(&self) -> &Arc<dyn euclid_store::Store> {
    &self.store
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_config_from_settings() {
    let settings = PipelineSettings {
      poll_interval_ms: 50,
      task_timeout_ms: Some(10_000),
      ..PipelineSettings::default()
    };
    let config = RuntimeConfig::from(&settings);
    assert_eq!(config.poll_interval, Duration::from_millis(50));
    assert_eq!(config.task_timeout, Some(Duration::from_secs(10)));

    let default = RuntimeConfig::from(&PipelineSettings::default());
    assert_eq!(default, RuntimeConfig::default());
  }
}
