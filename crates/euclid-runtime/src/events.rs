//! Progress events for executions.
//!
//! Emitted as an execution advances, so callers can follow it without
//! polling the record store.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// One step of progress in an execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ExecutionEvent {
  WorkflowStarted {
    execution_id: String,
    workflow_id: String,
  },

  /// A state attempt has started.
  StateStarted {
    execution_id: String,
    state_id: String,
    attempt: u32,
  },

  /// A container task was accepted by the scheduler.
  TaskLaunched {
    execution_id: String,
    state_id: String,
    task_id: String,
  },

  StateCompleted {
    execution_id: String,
    state_id: String,
    output: Option<serde_json::Value>,
  },

  /// A state attempt failed and will be retried after `delay_ms`.
  StateRetrying {
    execution_id: String,
    state_id: String,
    attempt: u32,
    delay_ms: u64,
    error: String,
  },

  StateFailed {
    execution_id: String,
    state_id: String,
    error: String,
  },

  WorkflowCompleted { execution_id: String },

  WorkflowFailed { execution_id: String, error: String },
}

/// Receives execution events.
///
/// The runtime calls `notify` inline, so implementations must not block.
pub trait ExecutionNotifier: Send + Sync {
  fn notify(&self, event: ExecutionEvent);
}

/// Discards all events.
#[derive(Debug, Clone, Default)]
pub struct NoopNotifier;

impl ExecutionNotifier for NoopNotifier {
  fn notify(&self, _event: ExecutionEvent) {}
}

/// Sends events to an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
  // unbounded: event volume is a handful per execution
  sender: mpsc::UnboundedSender<ExecutionEvent>,
}

impl ChannelNotifier {
  pub fn new(sender: mpsc::UnboundedSender<ExecutionEvent>) -> Self {
    Self { sender }
  }
}

impl ExecutionNotifier for ChannelNotifier {
  fn notify(&self, event: ExecutionEvent) {
    // a dropped receiver just means nobody is listening
    let _ = self.sender.send(event);
  }
}
