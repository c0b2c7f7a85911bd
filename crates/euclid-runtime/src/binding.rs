//! Binding interpreter: turns a state's parameter bindings into its input,
//! and merges function output back into the accumulated data.

use std::collections::BTreeMap;

use euclid_workflow::{Binding, State};
use serde_json::{Map, Value};

use crate::error::RuntimeError;

/// Build the input for `state` from the accumulated data.
///
/// A state without bindings receives the whole accumulated data. Otherwise the
/// input is an object with one field per binding: literals are copied, and
/// references must resolve or the state fails with
/// [`RuntimeError::MissingBinding`]. A field that is present but `null`
/// resolves to `null`.
pub fn resolve_parameters(state: &State, data: &Value) -> Result<Value, RuntimeError> {
  if state.parameters.is_empty() {
    return Ok(data.clone());
  }

  let mut resolved = Map::with_capacity(state.parameters.len());
  for parameter in &state.parameters {
    let value = match &parameter.binding {
      Binding::Literal(value) => value.clone(),
      Binding::Reference(path) => {
        path
          .resolve(data)
          .cloned()
          .ok_or_else(|| RuntimeError::MissingBinding {
            state_id: state.state_id.clone(),
            parameter: parameter.name.clone(),
            path: path.to_string(),
          })?
      }
    };
    resolved.insert(parameter.name.clone(), value);
  }
  Ok(Value::Object(resolved))
}

/// Flatten a resolved input into container launch parameters.
///
/// Strings pass through, numbers and booleans use their JSON text. Anything
/// else has no flat representation and is rejected.
pub fn launch_parameters(
  state_id: &str,
  input: &Value,
) -> Result<BTreeMap<String, String>, RuntimeError> {
  let object = input.as_object().ok_or_else(|| RuntimeError::InvalidParameter {
    state_id: state_id.to_string(),
    parameter: "$".to_string(),
    message: "container input must be an object".to_string(),
  })?;

  object
    .iter()
    .map(|(name, value)| {
      let flat = match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        other => {
          return Err(RuntimeError::InvalidParameter {
            state_id: state_id.to_string(),
            parameter: name.clone(),
            message: format!("expected a scalar, got {}", other),
          });
        }
      };
      Ok((name.clone(), flat))
    })
    .collect()
}

/// Merge a function's object output into the accumulated data.
///
/// Top-level keys only, last write wins. Accumulated data that is not an
/// object is replaced by the output.
pub fn merge_output(accumulated: &mut Value, output: Map<String, Value>) {
  match accumulated {
    Value::Object(fields) => fields.extend(output),
    other => *other = Value::Object(output),
  }
}
