use serde::{Deserialize, Serialize};

use crate::enums::LaunchType;

/// Reference to a short-lived function registered with the task registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionRef {
  /// Function name, e.g. "s3-upload"
  pub name: String,
}

/// Network placement handed to the container scheduler untouched.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NetworkConfig {
  #[serde(default)]
  pub subnets: Vec<String>,
  #[serde(default)]
  pub assign_public_ip: bool,
}

/// Reference to a containerized task definition.
///
/// None of these fields are interpreted by the engine; they are passed
/// through to the `ContainerLauncher`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerTaskRef {
  pub cluster: String,
  pub task_definition: String,
  pub container_name: String,
  /// Image reference, e.g. "registry.example.com/euclid:1.2.0"
  pub image: String,
  #[serde(default)]
  pub launch_type: LaunchType,
  #[serde(default)]
  pub network: NetworkConfig,
}
