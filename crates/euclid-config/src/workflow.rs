use serde::{Deserialize, Serialize};

use crate::state::StateDef;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowDef {
  pub workflow_id: String,
  pub name: String,
  pub start_at: String,
  pub states: Vec<StateDef>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub timeout_ms: Option<u64>,
}
