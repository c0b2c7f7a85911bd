use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WorkflowError {
  #[error("state not found: {0}")]
  StateNotFound(String),

  #[error("start state not found: {0}")]
  StartStateNotFound(String),

  #[error("duplicate state: {0}")]
  DuplicateState(String),

  #[error("transition references unknown state: from={from}, to={to}")]
  InvalidTransition { from: String, to: String },

  #[error("non-terminal state '{0}' has no next state")]
  MissingNext(String),

  #[error("terminal state '{0}' also declares a next state")]
  ConflictingTransition(String),

  #[error("state '{0}' is not reachable from the start state")]
  UnreachableState(String),

  #[error("transition cycle re-enters state '{0}'")]
  Cycle(String),

  #[error("duplicate parameter '{parameter}' in state '{state_id}'")]
  DuplicateParameter { state_id: String, parameter: String },

  #[error("invalid binding path '{path}': {message}")]
  InvalidPath { path: String, message: String },

  #[error("invalid binding for parameter '{parameter}' in state '{state_id}': {source}")]
  InvalidBinding {
    state_id: String,
    parameter: String,
    #[source]
    source: Box<WorkflowError>,
  },
}
