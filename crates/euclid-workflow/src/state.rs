use euclid_config::{ContainerTaskRef, FunctionRef, RetryPolicy};
use serde::{Deserialize, Serialize};

use crate::path::BindingPath;

/// A locked workflow state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct State {
  pub state_id: String,
  pub kind: StateKind,
  /// Parameter bindings in declaration order.
  pub parameters: Vec<Parameter>,
  pub transition: Transition,
  pub timeout_ms: Option<u64>,
  pub retry: Option<RetryPolicy>,
}

impl State {
  pub fn is_terminal(&self) -> bool {
    matches!(self.transition, Transition::End)
  }

  pub fn next(&self) -> Option<&str> {
    match &self.transition {
      Transition::Next(next) => Some(next),
      Transition::End => None,
    }
  }
}

/// What a state invokes. The discriminator matters to the engine: functions
/// return a value that is merged into the execution data, container tasks only
/// report pass/fail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StateKind {
  InvokeFunction(FunctionRef),
  InvokeContainerTaskSync(ContainerTaskRef),
}

impl StateKind {
  pub fn as_str(&self) -> &'static str {
    match self {
      StateKind::InvokeFunction(_) => "invoke_function",
      StateKind::InvokeContainerTaskSync(_) => "invoke_container_task_sync",
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
  pub name: String,
  pub binding: Binding,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Binding {
  Literal(serde_json::Value),
  Reference(BindingPath),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transition {
  Next(String),
  End,
}
