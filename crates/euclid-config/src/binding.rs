//! Parameter bindings for workflow states.
//!
//! A binding produces one named input parameter for a state, either from a
//! literal value or from a reference path into the execution's accumulated
//! data.
//!
//! # Examples
//!
//! ```json
//! [
//!   { "name": "operandA", "reference": "$.normalizedOperandA" },
//!   { "name": "region", "literal": "us-east-1" }
//! ]
//! ```
//!
//! Reference paths are validated when the workflow is locked; see
//! `euclid_workflow::BindingPath` for the exact grammar.

use serde::{Deserialize, Serialize};

/// How a single parameter value is produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterBinding {
  /// A constant value. Always resolves.
  Literal(serde_json::Value),
  /// A path into the execution's accumulated data, e.g. `$.objectKey`.
  Reference(String),
}

/// A named parameter binding. Order is preserved in the state definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterDef {
  pub name: String,
  #[serde(flatten)]
  pub binding: ParameterBinding,
}

impl ParameterDef {
  pub fn literal(name: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
    Self {
      name: name.into(),
      binding: ParameterBinding::Literal(value.into()),
    }
  }

  pub fn reference(name: impl Into<String>, path: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      binding: ParameterBinding::Reference(path.into()),
    }
  }
}
