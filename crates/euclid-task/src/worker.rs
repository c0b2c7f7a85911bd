//! The compute worker: sums two operands and writes the result next to the
//! ingested request.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use euclid_artifact::{Store, get_bytes, layout, put_bytes};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::container::{LaunchRequest, env_var_name};
use crate::error::TaskError;
use crate::local::ContainerWorker;
use crate::storage::StoreResolver;

/// Launch parameters the compute worker understands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerParams {
  pub operand_a: String,
  pub operand_b: String,
  pub storage_container: String,
  pub object_key: String,
  pub region: String,
}

impl WorkerParams {
  pub fn from_parameters(parameters: &BTreeMap<String, String>) -> Result<Self, TaskError> {
    Self::from_lookup(|name| parameters.get(name).cloned())
  }

  /// Read parameters from `OPERAND_A`, `OPERAND_B`, ... as set by
  /// [`ProcessLauncher`](crate::ProcessLauncher).
  pub fn from_env() -> Result<Self, TaskError> {
    Self::from_lookup(|name| std::env::var(env_var_name(name)).ok())
  }

  fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, TaskError> {
    let required = |name: &str| {
      lookup(name).ok_or_else(|| TaskError::validation(format!("missing parameter '{}'", name)))
    };
    Ok(Self {
      operand_a: required("operandA")?,
      operand_b: required("operandB")?,
      storage_container: required("storageContainer")?,
      object_key: required("objectKey")?,
      region: lookup("region").unwrap_or_default(),
    })
  }
}

/// Body written to the output object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComputeResult {
  pub operand_a: i64,
  pub operand_b: i64,
  pub result: i64,
}

/// Sum the operands and write the result to `output/<basename of objectKey>`.
/// Returns the output key.
pub async fn compute(store: &dyn Store, params: &WorkerParams) -> Result<String, TaskError> {
  let parse = |raw: &str, name: &str| {
    raw.trim().parse::<i64>().map_err(|_| {
      TaskError::validation(format!(
        "you provided {} as input for '{}', please provide a valid integer",
        raw, name
      ))
    })
  };
  let a = parse(&params.operand_a, "a")?;
  let b = parse(&params.operand_b, "b")?;
  let result = a
    .checked_add(b)
    .ok_or_else(|| TaskError::failed(format!("{} + {} overflows", a, b)))?;

  let output_key = layout::output_key(&params.object_key);
  let body = ComputeResult {
    operand_a: a,
    operand_b: b,
    result,
  };
  let bytes = serde_json::to_vec(&body).map_err(|e| TaskError::failed(e.to_string()))?;
  match put_bytes(store, &output_key, bytes.clone(), "application/json").await {
    Ok(()) => {}
    // a rerun for the same request finds its own result already written
    Err(euclid_artifact::Error::AlreadyExists(_)) => {
      let existing = get_bytes(store, &output_key).await?;
      if existing.as_ref() != bytes.as_slice() {
        return Err(TaskError::failed(format!(
          "a different result is already stored at {}",
          output_key
        )));
      }
    }
    Err(e) => return Err(e.into()),
  }

  info!(
    storage_container = %params.storage_container,
    output_key = %output_key,
    result,
    "result written"
  );
  Ok(output_key)
}

/// [`ContainerWorker`] running [`compute`] in-process.
pub struct SumWorker {
  stores: Arc<dyn StoreResolver>,
}

impl SumWorker {
  pub fn new(stores: Arc<dyn StoreResolver>) -> Self {
    Self { stores }
  }
}

#[async_trait]
impl ContainerWorker for SumWorker {
  async fn run(&self, request: &LaunchRequest, cancel: CancellationToken) -> Result<(), TaskError> {
    let params = WorkerParams::from_parameters(&request.parameters)?;
    let store = self.stores.resolve(&params.storage_container)?;
    tokio::select! {
      result = compute(store.as_ref(), &params) => result.map(|_| ()),
      _ = cancel.cancelled() => Err(TaskError::failed("cancelled")),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use euclid_artifact::MemoryStore;

  fn params(a: &str, b: &str) -> WorkerParams {
    WorkerParams {
      operand_a: a.to_string(),
      operand_b: b.to_string(),
      storage_container: "bucket".to_string(),
      object_key: "input/2024-01-01T00:00:00.000000Z.json".to_string(),
      region: "us-east-1".to_string(),
    }
  }

  #[tokio::test]
  async fn test_compute_writes_output() {
    let store = MemoryStore::new();
    let key = compute(&store, &params("6", "9")).await.unwrap();
    assert_eq!(key, "output/2024-01-01T00:00:00.000000Z.json");

    let body = get_bytes(&store, &key).await.unwrap();
    let result: ComputeResult = serde_json::from_slice(&body).unwrap();
    assert_eq!(
      result,
      ComputeResult {
        operand_a: 6,
        operand_b: 9,
        result: 15
      }
    );
  }

  #[tokio::test]
  async fn test_compute_rerun_keeps_first_result() {
    let store = MemoryStore::new();
    compute(&store, &params("6", "9")).await.unwrap();
    assert!(compute(&store, &params("6", "9")).await.is_ok());

    let err = compute(&store, &params("6", "10")).await.unwrap_err();
    assert!(matches!(err, TaskError::Failed { .. }));

    let body = get_bytes(&store, "output/2024-01-01T00:00:00.000000Z.json").await.unwrap();
    let result: ComputeResult = serde_json::from_slice(&body).unwrap();
    assert_eq!(result.result, 15);
  }

  #[tokio::test]
  async fn test_compute_rejects_bad_operand() {
    let store = MemoryStore::new();
    let err = compute(&store, &params("x", "9")).await.unwrap_err();
    assert!(err.is_validation());
    assert!(store.keys().await.is_empty());
  }

  #[tokio::test]
  async fn test_compute_overflow_fails() {
    let store = MemoryStore::new();
    let err = compute(&store, &params(&i64::MAX.to_string(), "1")).await.unwrap_err();
    assert!(matches!(err, TaskError::Failed { .. }));
  }

  #[test]
  fn test_params_from_parameters() {
    let mut map = BTreeMap::new();
    map.insert("operandA".to_string(), "1".to_string());
    map.insert("operandB".to_string(), "2".to_string());
    map.insert("storageContainer".to_string(), "bucket".to_string());
    map.insert("objectKey".to_string(), "input/x.json".to_string());

    let params = WorkerParams::from_parameters(&map).unwrap();
    assert_eq!(params.operand_a, "1");
    assert_eq!(params.region, "");

    map.remove("objectKey");
    assert!(WorkerParams::from_parameters(&map).is_err());
  }
}
