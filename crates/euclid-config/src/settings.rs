//! Pipeline settings.
//!
//! Explicit configuration for the ingest → compute pipeline. Everything the
//! workflow factory needs (storage container, image, region, network) is
//! carried here instead of living in process-wide globals.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::enums::LaunchType;
use crate::error::ConfigError;
use crate::state::RetryPolicy;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
  pub workflow_name: String,
  /// Storage container (bucket) the ingest step writes into.
  pub storage_container: String,
  /// Name the ingest function is registered under.
  pub ingest_function: String,
  pub cluster: String,
  pub task_definition: String,
  pub container_name: String,
  pub image: String,
  pub region: String,
  pub launch_type: LaunchType,
  pub subnets: Vec<String>,
  pub assign_public_ip: bool,
  /// How often a running container task is polled for its status.
  pub poll_interval_ms: u64,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub task_timeout_ms: Option<u64>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub retry: Option<RetryPolicy>,
}

impl Default for PipelineSettings {
  fn default() -> Self {
    Self {
      workflow_name: "euclid".to_string(),
      storage_container: "euclid-bucket".to_string(),
      ingest_function: "s3-upload".to_string(),
      cluster: "dev".to_string(),
      task_definition: "euclid-service".to_string(),
      container_name: "euclid".to_string(),
      image: "euclid:latest".to_string(),
      region: "us-east-1".to_string(),
      launch_type: LaunchType::Fargate,
      subnets: Vec::new(),
      assign_public_ip: true,
      poll_interval_ms: 500,
      task_timeout_ms: None,
      retry: None,
    }
  }
}

impl PipelineSettings {
  /// Load settings from a JSON file. Missing fields take their defaults.
  pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
      path: path.display().to_string(),
      source: e,
    })?;
    serde_json::from_str(&content).map_err(|e| ConfigError::Parse {
      path: path.display().to_string(),
      source: e,
    })
  }
}
