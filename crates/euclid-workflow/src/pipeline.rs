//! The ingest → compute pipeline.
//!
//! Two states: a short-lived function persists the request and normalizes
//! the operands, then a container task is launched synchronously with
//! parameters bound from the function's output.

use euclid_config::{
  ContainerTaskRef, FunctionRef, NetworkConfig, ParameterDef, PipelineSettings, StateDef,
  StateType,
};

use crate::builder::WorkflowBuilder;
use crate::error::WorkflowError;
use crate::workflow::Workflow;

pub const INGEST_STATE: &str = "ingest";
pub const COMPUTE_STATE: &str = "compute";

/// Build the pipeline workflow from explicit settings.
///
/// Each call returns an independent [`Workflow`]; nothing is shared between
/// calls.
pub fn compute_pipeline(settings: &PipelineSettings) -> Result<Workflow, WorkflowError> {
  let ingest = StateDef {
    state_id: INGEST_STATE.to_string(),
    state_type: StateType::InvokeFunction {
      function: FunctionRef {
        name: settings.ingest_function.clone(),
      },
    },
    // No bindings: the function receives the whole request payload.
    parameters: Vec::new(),
    next: Some(COMPUTE_STATE.to_string()),
    end: false,
    timeout_ms: None,
    retry: None,
  };

  let compute = StateDef {
    state_id: COMPUTE_STATE.to_string(),
    state_type: StateType::InvokeContainerTaskSync {
      task: ContainerTaskRef {
        cluster: settings.cluster.clone(),
        task_definition: settings.task_definition.clone(),
        container_name: settings.container_name.clone(),
        image: settings.image.clone(),
        launch_type: settings.launch_type,
        network: NetworkConfig {
          subnets: settings.subnets.clone(),
          assign_public_ip: settings.assign_public_ip,
        },
      },
    },
    parameters: vec![
      ParameterDef::reference("operandA", "$.normalizedOperandA"),
      ParameterDef::reference("operandB", "$.normalizedOperandB"),
      ParameterDef::reference("storageContainer", "$.storageContainer"),
      ParameterDef::reference("objectKey", "$.objectKey"),
      ParameterDef::literal("region", settings.region.clone()),
    ],
    next: None,
    end: true,
    timeout_ms: settings.task_timeout_ms,
    retry: settings.retry,
  };

  WorkflowBuilder::new(
    settings.workflow_name.clone(),
    format!("{} pipeline", settings.workflow_name),
  )
  .start_at(INGEST_STATE)
  .state(ingest)
  .state(compute)
  .build()
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::state::{Binding, StateKind};
  use serde_json::json;

  #[test]
  fn test_pipeline_shape() {
    let settings = PipelineSettings {
      region: "eu-central-1".to_string(),
      image: "registry.local/euclid:2".to_string(),
      ..PipelineSettings::default()
    };
    let workflow = compute_pipeline(&settings).unwrap();

    let chain: Vec<&str> = workflow.chain().iter().map(|s| s.state_id.as_str()).collect();
    assert_eq!(chain, vec![INGEST_STATE, COMPUTE_STATE]);

    let ingest = workflow.get_state(INGEST_STATE).unwrap();
    assert!(matches!(&ingest.kind, StateKind::InvokeFunction(f) if f.name == "s3-upload"));
    assert!(ingest.parameters.is_empty());

    let compute = workflow.get_state(COMPUTE_STATE).unwrap();
    assert!(compute.is_terminal());
    match &compute.kind {
      StateKind::InvokeContainerTaskSync(task) => {
        assert_eq!(task.image, "registry.local/euclid:2");
        assert!(task.network.assign_public_ip);
      }
      other => panic!("unexpected kind: {:?}", other),
    }

    let region = compute
      .parameters
      .iter()
      .find(|p| p.name == "region")
      .unwrap();
    assert_eq!(region.binding, Binding::Literal(json!("eu-central-1")));
  }

  #[test]
  fn test_pipelines_are_independent() {
    let a = compute_pipeline(&PipelineSettings::default()).unwrap();
    let b = compute_pipeline(&PipelineSettings {
      workflow_name: "other".to_string(),
      ..PipelineSettings::default()
    })
    .unwrap();
    assert_eq!(a.workflow_id, "euclid");
    assert_eq!(b.workflow_id, "other");
  }
}
