//! Workflow execution.

use chrono::Utc;
use euclid_store::{
  ExecutionRecord, ExecutionStatus, Failure, HistoryEntry, Json, StateOutcome,
};
use euclid_workflow::State;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};

use crate::binding::{merge_output, resolve_parameters};
use crate::error::RuntimeError;
use crate::events::ExecutionEvent;
use crate::runtime::WorkflowRuntime;
use crate::task::interruption;

/// Result of a successful execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowResult {
  pub execution_id: String,
  /// Request payload merged with every function output.
  pub accumulated: Value,
  /// One entry per state, in execution order.
  pub history: Vec<HistoryEntry>,
}

/// A handle to a workflow execution.
///
/// Call `.wait()` to run the execution and get the result.
pub struct WorkflowExecution<'a> {
  pub(crate) runtime: &'a WorkflowRuntime,
  pub(crate) execution_id: String,
  payload: Value,
  pub(crate) cancel: CancellationToken,
}

impl<'a> WorkflowExecution<'a> {
  pub(crate) fn new(
    runtime: &'a WorkflowRuntime,
    execution_id: String,
    payload: Value,
    cancel: CancellationToken,
  ) -> Self {
    Self {
      runtime,
      execution_id,
      payload,
      cancel,
    }
  }

  pub fn execution_id(&self) -> &str {
    &self.execution_id
  }

  /// Run the execution to a terminal status.
  ///
  /// The record is written when the execution is created, after each state,
  /// and once more when it terminates. On failure the record keeps the
  /// history up to and including the failed state.
  #[instrument(
    name = "workflow_execute",
    skip(self),
    fields(
      workflow_id = %self.runtime.workflow.workflow_id,
      execution_id = %self.execution_id,
    )
  )]
  pub async fn wait(self) -> Result<WorkflowResult, RuntimeError> {
    let workflow = &self.runtime.workflow;
    info!(
      execution_id = %self.execution_id,
      workflow_id = %workflow.workflow_id,
      payload = %self.payload,
      "workflow_started"
    );
    self.notify(ExecutionEvent::WorkflowStarted {
      execution_id: self.execution_id.clone(),
      workflow_id: workflow.workflow_id.clone(),
    });

    let mut record = ExecutionRecord::started(
      self.execution_id.clone(),
      workflow.workflow_id.clone(),
      workflow.start_at.clone(),
      self.payload.clone(),
      self.payload.clone(),
    );

    let result = match self.runtime.store.create_execution(&record).await {
      Ok(()) => self.run_loop(&mut record).await,
      Err(e) => Err(RuntimeError::Store(e)),
    };

    record.completed_at = Some(Utc::now());
    match &result {
      Ok(()) => {
        record.status = ExecutionStatus::Succeeded;
        record.current_state = None;
      }
      Err(e) => {
        record.status = ExecutionStatus::Failed;
        record.failure = Some(Json(Failure {
          kind: e.kind(),
          state: e
            .state_id()
            .map(String::from)
            .or_else(|| record.current_state.clone())
            .unwrap_or_default(),
          message: e.detail(),
        }));
      }
    }

    let result = match (result, self.runtime.store.update_execution(&record).await) {
      (Ok(()), Ok(())) => Ok(WorkflowResult {
        execution_id: self.execution_id.clone(),
        accumulated: record.accumulated.0,
        history: record.history.0,
      }),
      (Ok(()), Err(e)) => Err(RuntimeError::Store(e)),
      (Err(e), Ok(())) => Err(e),
      (Err(e), Err(store_err)) => {
        warn!(
          execution_id = %self.execution_id,
          error = %store_err,
          "failed to record execution failure"
        );
        Err(e)
      }
    };

    match &result {
      Ok(_) => {
        info!(execution_id = %self.execution_id, "workflow_completed");
        self.notify(ExecutionEvent::WorkflowCompleted {
          execution_id: self.execution_id.clone(),
        });
      }
      Err(e) => {
        error!(
          execution_id = %self.execution_id,
          kind = ?e.kind(),
          error = %e.detail(),
          "workflow_failed"
        );
        self.notify(ExecutionEvent::WorkflowFailed {
          execution_id: self.execution_id.clone(),
          error: e.detail(),
        });
      }
    }

    result
  }

  /// Advance state by state until a terminal state succeeds or one fails.
  async fn run_loop(&self, record: &mut ExecutionRecord) -> Result<(), RuntimeError> {
    let workflow = &self.runtime.workflow;
    let workflow_deadline = workflow
      .timeout_ms
      .map(|ms| Instant::now() + std::time::Duration::from_millis(ms));
    let mut current = Some(workflow.start_at.clone());

    while let Some(state_id) = current {
      if self.cancel.is_cancelled() {
        warn!(execution_id = %self.execution_id, state_id = %state_id, "workflow cancelled");
        return Err(RuntimeError::Cancelled {
          state_id,
          reason: "execution cancelled".to_string(),
        });
      }

      let state = workflow
        .get_state(&state_id)
        .ok_or_else(|| RuntimeError::StateNotFound {
          state_id: state_id.clone(),
        })?;

      let started_at = Utc::now();
      let state_deadline = state
        .timeout_ms
        .map(std::time::Duration::from_millis)
        .or(self.runtime.config.task_timeout)
        .map(|timeout| Instant::now() + timeout);
      let deadline = match (state_deadline, workflow_deadline) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
      };

      let (result, attempts) = self.run_state(state, &record.accumulated.0, deadline).await;

      let entry = HistoryEntry {
        state: state.state_id.clone(),
        kind: state.kind.as_str().to_string(),
        outcome: StateOutcome::Succeeded,
        attempts,
        started_at,
        finished_at: Utc::now(),
        output: None,
        error: None,
      };

      match result {
        Ok(output) => {
          if let Some(output) = &output {
            merge_output(&mut record.accumulated.0, output.clone());
          }
          record.history.0.push(HistoryEntry {
            output: output.map(Value::Object),
            ..entry
          });
          current = state.next().map(String::from);
          record.current_state = current.clone();
          if current.is_some() {
            self.runtime.store.update_execution(record).await?;
          }
        }
        Err(e) => {
          record.history.0.push(HistoryEntry {
            outcome: StateOutcome::Failed,
            error: Some(e.detail()),
            ..entry
          });
          return Err(e);
        }
      }
    }

    Ok(())
  }

  /// Run one state, retrying invocation failures if the state allows it.
  ///
  /// Returns the outcome and the number of attempts made.
  #[instrument(
    name = "state_execute",
    skip(self, state, data, deadline),
    fields(
      execution_id = %self.execution_id,
      state_id = %state.state_id,
      kind = state.kind.as_str(),
    )
  )]
  async fn run_state(
    &self,
    state: &State,
    data: &Value,
    deadline: Option<Instant>,
  ) -> (Result<Option<serde_json::Map<String, Value>>, RuntimeError>, u32) {
    let input = match resolve_parameters(state, data) {
      Ok(input) => input,
      Err(e) => {
        self.state_failed(state, &e);
        return (Err(e), 1);
      }
    };

    let max_attempts = state.retry.map_or(1, |policy| policy.max_attempts.max(1));
    let mut attempt = 1;
    loop {
      info!(
        execution_id = %self.execution_id,
        state_id = %state.state_id,
        attempt,
        input = %input,
        "state_started"
      );
      self.notify(ExecutionEvent::StateStarted {
        execution_id: self.execution_id.clone(),
        state_id: state.state_id.clone(),
        attempt,
      });

      let result = self.invoke(state, input.clone(), attempt, deadline).await;
      let e = match result {
        Ok(output) => {
          let output_value = output.clone().map(Value::Object);
          let shown = output_value.clone().unwrap_or_default().to_string();
          info!(
            execution_id = %self.execution_id,
            state_id = %state.state_id,
            output = %shown,
            "state_completed"
          );
          self.notify(ExecutionEvent::StateCompleted {
            execution_id: self.execution_id.clone(),
            state_id: state.state_id.clone(),
            output: output_value,
          });
          return (Ok(output), attempt);
        }
        Err(e) => e,
      };

      let policy = match state.retry {
        Some(policy) if e.is_retryable() && attempt < max_attempts => policy,
        _ => {
          self.state_failed(state, &e);
          return (Err(e), attempt);
        }
      };

      let delay_ms = policy.delay_ms(attempt);
      warn!(
        execution_id = %self.execution_id,
        state_id = %state.state_id,
        attempt,
        delay_ms,
        error = %e.detail(),
        "state_retrying"
      );
      self.notify(ExecutionEvent::StateRetrying {
        execution_id: self.execution_id.clone(),
        state_id: state.state_id.clone(),
        attempt,
        delay_ms,
        error: e.detail(),
      });

      tokio::select! {
        _ = tokio::time::sleep(std::time::Duration::from_millis(delay_ms)) => {}
        reason = interruption(&self.cancel, deadline) => {
          let e = RuntimeError::Cancelled {
            state_id: state.state_id.clone(),
            reason: reason.to_string(),
          };
          self.state_failed(state, &e);
          return (Err(e), attempt);
        }
      }
      attempt += 1;
    }
  }

  fn state_failed(&self, state: &State, e: &RuntimeError) {
    error!(
      execution_id = %self.execution_id,
      state_id = %state.state_id,
      kind = ?e.kind(),
      error = %e.detail(),
      "state_failed"
    );
    self.notify(ExecutionEvent::StateFailed {
      execution_id: self.execution_id.clone(),
      state_id: state.state_id.clone(),
      error: e.detail(),
    });
  }

  pub(crate) fn notify(&self, event: ExecutionEvent) {
    self.runtime.notifier.notify(event);
  }
}
