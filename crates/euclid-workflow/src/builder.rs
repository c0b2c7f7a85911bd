use euclid_config::{StateDef, WorkflowDef};

use crate::error::WorkflowError;
use crate::workflow::Workflow;

/// Incrementally assembles a [`WorkflowDef`] and locks it.
///
/// ```ignore
/// let workflow = WorkflowBuilder::new("euclid", "Euclid")
///   .start_at("ingest")
///   .state(ingest)
///   .state(compute)
///   .build()?;
/// ```
#[derive(Debug, Clone)]
pub struct WorkflowBuilder {
  def: WorkflowDef,
}

impl WorkflowBuilder {
  pub fn new(workflow_id: impl Into<String>, name: impl Into<String>) -> Self {
    Self {
      def: WorkflowDef {
        workflow_id: workflow_id.into(),
        name: name.into(),
        start_at: String::new(),
        states: Vec::new(),
        timeout_ms: None,
      },
    }
  }

  pub fn start_at(mut self, state_id: impl Into<String>) -> Self {
    self.def.start_at = state_id.into();
    self
  }

  pub fn state(mut self, state: StateDef) -> Self {
    self.def.states.push(state);
    self
  }

  pub fn timeout_ms(mut self, timeout_ms: u64) -> Self {
    self.def.timeout_ms = Some(timeout_ms);
    self
  }

  /// The definition built so far, without validating it.
  pub fn into_def(self) -> WorkflowDef {
    self.def
  }

  pub fn build(self) -> Result<Workflow, WorkflowError> {
    Workflow::lock(self.def)
  }
}
