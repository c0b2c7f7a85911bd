//! Dispatch of a single state attempt by kind.

use std::collections::BTreeMap;
use std::sync::Arc;

use euclid_config::{ContainerTaskRef, FunctionRef};
use euclid_task::{
  ContainerLauncher, InvocationContext, LaunchRequest, TaskError, TaskHandle, TaskStatus,
};
use euclid_workflow::{State, StateKind};
use serde_json::{Map, Value};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::binding::launch_parameters;
use crate::error::RuntimeError;
use crate::events::ExecutionEvent;
use crate::execution::WorkflowExecution;

/// Resolves once the execution is cancelled or the deadline passes, with the
/// reason.
pub(crate) async fn interruption(cancel: &CancellationToken, deadline: Option<Instant>) -> &'static str {
  match deadline {
    Some(deadline) => tokio::select! {
      _ = cancel.cancelled() => "execution cancelled",
      _ = tokio::time::sleep_until(deadline) => "timed out",
    },
    None => {
      cancel.cancelled().await;
      "execution cancelled"
    }
  }
}

impl WorkflowExecution<'_> {
  /// One attempt of `state`. Function states yield their output object;
  /// container states yield nothing.
  pub(crate) async fn invoke(
    &self,
    state: &State,
    input: Value,
    attempt: u32,
    deadline: Option<Instant>,
  ) -> Result<Option<Map<String, Value>>, RuntimeError> {
    match &state.kind {
      StateKind::InvokeFunction(function) => self
        .invoke_function(state, function, input, attempt, deadline)
        .await
        .map(Some),
      StateKind::InvokeContainerTaskSync(task) => {
        let parameters = launch_parameters(&state.state_id, &input)?;
        self
          .run_container_task(state, task, parameters, deadline)
          .await
          .map(|_| None)
      }
    }
  }

  async fn invoke_function(
    &self,
    state: &State,
    function: &FunctionRef,
    input: Value,
    attempt: u32,
    deadline: Option<Instant>,
  ) -> Result<Map<String, Value>, RuntimeError> {
    let invoker = self
      .runtime
      .registry
      .function(&function.name)
      .map_err(|e| invocation(state, e))?;

    let ctx = InvocationContext {
      execution_id: self.execution_id.clone(),
      state_id: state.state_id.clone(),
      attempt,
    };

    let result = tokio::select! {
      result = invoker.invoke(&ctx, input) => result,
      reason = interruption(&self.cancel, deadline) => {
        warn!(execution_id = %self.execution_id, state_id = %state.state_id, reason, "function abandoned");
        return Err(RuntimeError::Cancelled {
          state_id: state.state_id.clone(),
          reason: reason.to_string(),
        });
      }
    };

    match result {
      Ok(Value::Object(output)) => Ok(output),
      Ok(other) => Err(RuntimeError::InvalidOutput {
        state_id: state.state_id.clone(),
        message: format!("expected an object, got {}", other),
      }),
      Err(TaskError::Validation { message }) => Err(RuntimeError::Validation {
        state_id: state.state_id.clone(),
        message,
      }),
      Err(e) => Err(invocation(state, e)),
    }
  }

  /// Launch the task and block until the scheduler reports it stopped.
  ///
  /// Acceptance of the launch is not completion: only a terminal status
  /// advances the execution. Whenever the execution gives up on a task that
  /// has not stopped (cancellation or a failed status poll) the task is
  /// asked to stop before the error is returned.
  async fn run_container_task(
    &self,
    state: &State,
    task: &ContainerTaskRef,
    parameters: BTreeMap<String, String>,
    deadline: Option<Instant>,
  ) -> Result<(), RuntimeError> {
    let launcher = self.runtime.registry.launcher().clone();
    let request = LaunchRequest {
      execution_id: self.execution_id.clone(),
      state_id: state.state_id.clone(),
      task: task.clone(),
      parameters,
    };

    // A launch cut short by cancellation is still awaited: the scheduler may
    // have accepted the task, and only its handle lets us stop it.
    let mut launch = launcher.launch(request);
    let handle = tokio::select! {
      handle = &mut launch => handle.map_err(|e| invocation(state, e))?,
      reason = interruption(&self.cancel, deadline) => {
        if let Ok(handle) = launch.await {
          self.stop_task(state, &launcher, &handle, reason).await;
        }
        return Err(RuntimeError::Cancelled {
          state_id: state.state_id.clone(),
          reason: reason.to_string(),
        });
      }
    };

    info!(
      execution_id = %self.execution_id,
      state_id = %state.state_id,
      task_id = %handle.task_id,
      cluster = %task.cluster,
      task_definition = %task.task_definition,
      "task_launched"
    );
    self.notify(ExecutionEvent::TaskLaunched {
      execution_id: self.execution_id.clone(),
      state_id: state.state_id.clone(),
      task_id: handle.task_id.clone(),
    });

    let poll_interval = self.runtime.config.poll_interval;
    loop {
      let status = match launcher.describe(&handle).await {
        Ok(status) => status,
        Err(e) => {
          self.stop_task(state, &launcher, &handle, "task status unavailable").await;
          return Err(invocation(state, e));
        }
      };
      debug!(task_id = %handle.task_id, ?status, "task described");

      if let TaskStatus::Stopped { exit_code, reason } = status {
        launcher.release(&handle).await;
        if exit_code == Some(0) {
          return Ok(());
        }
        return Err(RuntimeError::TaskFailed {
          state_id: state.state_id.clone(),
          task_id: handle.task_id.clone(),
          exit_code,
          reason,
        });
      }

      tokio::select! {
        _ = tokio::time::sleep(poll_interval) => {}
        reason = interruption(&self.cancel, deadline) => {
          self.stop_task(state, &launcher, &handle, reason).await;
          return Err(RuntimeError::Cancelled {
            state_id: state.state_id.clone(),
            reason: reason.to_string(),
          });
        }
      }
    }
  }

  /// Ask the scheduler to stop a task this execution no longer follows, then
  /// release it. A failed stop is logged, not raised: the caller is already
  /// returning an error of its own.
  async fn stop_task(
    &self,
    state: &State,
    launcher: &Arc<dyn ContainerLauncher>,
    handle: &TaskHandle,
    reason: &str,
  ) {
    warn!(
      execution_id = %self.execution_id,
      state_id = %state.state_id,
      task_id = %handle.task_id,
      reason,
      "stopping task"
    );
    if let Err(e) = launcher.stop(handle, reason).await {
      warn!(task_id = %handle.task_id, error = %e, "failed to stop task");
    }
    launcher.release(handle).await;
  }
}

fn invocation(state: &State, source: TaskError) -> RuntimeError {
  RuntimeError::Invocation {
    state_id: state.state_id.clone(),
    source,
  }
}
