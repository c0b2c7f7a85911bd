use std::collections::{HashMap, HashSet};

use euclid_config::{ParameterBinding, StateDef, StateType, WorkflowDef};
use serde::{Deserialize, Serialize};

use crate::error::WorkflowError;
use crate::path::BindingPath;
use crate::state::{Binding, Parameter, State, StateKind, Transition};

/// A locked workflow ready for execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workflow {
  pub workflow_id: String,
  pub name: String,
  pub start_at: String,
  pub states: HashMap<String, State>,
  pub timeout_ms: Option<u64>,
}

impl Workflow {
  /// Validate a workflow definition and lock it.
  pub fn lock(def: WorkflowDef) -> Result<Self, WorkflowError> {
    let mut states = HashMap::with_capacity(def.states.len());
    for state_def in def.states {
      let state = lock_state(state_def)?;
      if states.contains_key(&state.state_id) {
        return Err(WorkflowError::DuplicateState(state.state_id));
      }
      states.insert(state.state_id.clone(), state);
    }

    if !states.contains_key(&def.start_at) {
      return Err(WorkflowError::StartStateNotFound(def.start_at));
    }

    for state in states.values() {
      if let Transition::Next(next) = &state.transition {
        if !states.contains_key(next) {
          return Err(WorkflowError::InvalidTransition {
            from: state.state_id.clone(),
            to: next.clone(),
          });
        }
      }
    }

    let workflow = Self {
      workflow_id: def.workflow_id,
      name: def.name,
      start_at: def.start_at,
      states,
      timeout_ms: def.timeout_ms,
    };

    let visited = workflow.walk()?;
    if visited.len() != workflow.states.len() {
      let mut unreachable: Vec<&String> = workflow
        .states
        .keys()
        .filter(|id| !visited.contains(id.as_str()))
        .collect();
      unreachable.sort();
      return Err(WorkflowError::UnreachableState(unreachable[0].clone()));
    }

    Ok(workflow)
  }

  /// Get a state by ID.
  pub fn get_state(&self, state_id: &str) -> Option<&State> {
    self.states.get(state_id)
  }

  /// The state every execution starts in.
  pub fn start_state(&self) -> Option<&State> {
    self.states.get(&self.start_at)
  }

  /// States in execution order, from the start state to the terminal state.
  pub fn chain(&self) -> Vec<&State> {
    let mut chain = Vec::with_capacity(self.states.len());
    let mut current = self.states.get(&self.start_at);
    while let Some(state) = current {
      chain.push(state);
      current = state.next().and_then(|next| self.states.get(next));
    }
    chain
  }

  /// Follow transitions from the start state, rejecting any revisit.
  fn walk(&self) -> Result<HashSet<&str>, WorkflowError> {
    let mut visited = HashSet::new();
    let mut current = self.start_at.as_str();
    loop {
      if !visited.insert(current) {
        return Err(WorkflowError::Cycle(current.to_string()));
      }
      let state = self
        .states
        .get(current)
        .ok_or_else(|| WorkflowError::StateNotFound(current.to_string()))?;
      match &state.transition {
        Transition::Next(next) => current = next,
        Transition::End => return Ok(visited),
      }
    }
  }
}

fn lock_state(def: StateDef) -> Result<State, WorkflowError> {
  let transition = match (def.next, def.end) {
    (Some(_), true) => return Err(WorkflowError::ConflictingTransition(def.state_id)),
    (None, false) => return Err(WorkflowError::MissingNext(def.state_id)),
    (Some(next), false) => Transition::Next(next),
    (None, true) => Transition::End,
  };

  let mut seen = HashSet::new();
  let mut parameters = Vec::with_capacity(def.parameters.len());
  for param in def.parameters {
    if !seen.insert(param.name.clone()) {
      return Err(WorkflowError::DuplicateParameter {
        state_id: def.state_id,
        parameter: param.name,
      });
    }
    let binding = match param.binding {
      ParameterBinding::Literal(value) => Binding::Literal(value),
      ParameterBinding::Reference(path) => {
        let path = BindingPath::parse(&path).map_err(|e| WorkflowError::InvalidBinding {
          state_id: def.state_id.clone(),
          parameter: param.name.clone(),
          source: Box::new(e),
        })?;
        Binding::Reference(path)
      }
    };
    parameters.push(Parameter {
      name: param.name,
      binding,
    });
  }

  let kind = match def.state_type {
    StateType::InvokeFunction { function } => StateKind::InvokeFunction(function),
    StateType::InvokeContainerTaskSync { task } => StateKind::InvokeContainerTaskSync(task),
  };

  Ok(State {
    state_id: def.state_id,
    kind,
    parameters,
    transition,
    timeout_ms: def.timeout_ms,
    retry: def.retry,
  })
}

#[cfg(test)]
mod tests {
  use super::*;
  use euclid_config::{FunctionRef, ParameterDef};

  fn function_state(id: &str, next: Option<&str>) -> StateDef {
    StateDef {
      state_id: id.to_string(),
      state_type: StateType::InvokeFunction {
        function: FunctionRef {
          name: "fn".to_string(),
        },
      },
      parameters: vec![],
      next: next.map(String::from),
      end: next.is_none(),
      timeout_ms: None,
      retry: None,
    }
  }

  fn def(start_at: &str, states: Vec<StateDef>) -> WorkflowDef {
    WorkflowDef {
      workflow_id: "wf".to_string(),
      name: "Test".to_string(),
      start_at: start_at.to_string(),
      states,
      timeout_ms: None,
    }
  }

  #[test]
  fn test_lock_linear_chain() {
    let workflow = Workflow::lock(def(
      "a",
      vec![
        function_state("c", None),
        function_state("a", Some("b")),
        function_state("b", Some("c")),
      ],
    ))
    .unwrap();

    let order: Vec<&str> = workflow.chain().iter().map(|s| s.state_id.as_str()).collect();
    assert_eq!(order, vec!["a", "b", "c"]);
    assert_eq!(workflow.start_state().unwrap().state_id, "a");
    assert!(workflow.get_state("c").unwrap().is_terminal());
  }

  #[test]
  fn test_unknown_next() {
    let err = Workflow::lock(def("a", vec![function_state("a", Some("nope"))])).unwrap_err();
    assert_eq!(
      err,
      WorkflowError::InvalidTransition {
        from: "a".to_string(),
        to: "nope".to_string()
      }
    );
  }

  #[test]
  fn test_missing_start() {
    let err = Workflow::lock(def("x", vec![function_state("a", None)])).unwrap_err();
    assert_eq!(err, WorkflowError::StartStateNotFound("x".to_string()));
  }

  #[test]
  fn test_non_terminal_without_next() {
    let mut state = function_state("a", None);
    state.end = false;
    let err = Workflow::lock(def("a", vec![state])).unwrap_err();
    assert_eq!(err, WorkflowError::MissingNext("a".to_string()));
  }

  #[test]
  fn test_terminal_with_next() {
    let mut state = function_state("a", Some("b"));
    state.end = true;
    let err = Workflow::lock(def("a", vec![state, function_state("b", None)])).unwrap_err();
    assert_eq!(err, WorkflowError::ConflictingTransition("a".to_string()));
  }

  #[test]
  fn test_second_entry_point_rejected() {
    // "orphan" has no incoming transition, so it would be a second start.
    let err = Workflow::lock(def(
      "a",
      vec![
        function_state("a", Some("b")),
        function_state("b", None),
        function_state("orphan", Some("b")),
      ],
    ))
    .unwrap_err();
    assert_eq!(err, WorkflowError::UnreachableState("orphan".to_string()));
  }

  #[test]
  fn test_cycle_rejected() {
    let err = Workflow::lock(def(
      "a",
      vec![function_state("a", Some("b")), function_state("b", Some("a"))],
    ))
    .unwrap_err();
    assert_eq!(err, WorkflowError::Cycle("a".to_string()));
  }

  #[test]
  fn test_duplicate_state() {
    let err = Workflow::lock(def(
      "a",
      vec![function_state("a", None), function_state("a", None)],
    ))
    .unwrap_err();
    assert_eq!(err, WorkflowError::DuplicateState("a".to_string()));
  }

  #[test]
  fn test_bad_reference_path() {
    let mut state = function_state("a", None);
    state.parameters = vec![ParameterDef::reference("x", "num1")];
    let err = Workflow::lock(def("a", vec![state])).unwrap_err();
    assert!(matches!(
      err,
      WorkflowError::InvalidBinding { ref parameter, .. } if parameter == "x"
    ));
  }

  #[test]
  fn test_duplicate_parameter() {
    let mut state = function_state("a", None);
    state.parameters = vec![
      ParameterDef::literal("x", 1),
      ParameterDef::reference("x", "$.y"),
    ];
    let err = Workflow::lock(def("a", vec![state])).unwrap_err();
    assert_eq!(
      err,
      WorkflowError::DuplicateParameter {
        state_id: "a".to_string(),
        parameter: "x".to_string()
      }
    );
  }

  #[test]
  fn test_parameter_order_preserved() {
    let mut state = function_state("a", None);
    state.parameters = vec![
      ParameterDef::literal("z", 1),
      ParameterDef::reference("a", "$.a"),
      ParameterDef::literal("m", "x"),
    ];
    let workflow = Workflow::lock(def("a", vec![state])).unwrap();
    let names: Vec<&str> = workflow.states["a"]
      .parameters
      .iter()
      .map(|p| p.name.as_str())
      .collect();
    assert_eq!(names, vec!["z", "a", "m"]);
  }
}
