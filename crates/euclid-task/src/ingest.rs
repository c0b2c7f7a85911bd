//! The ingestion step: validate the two operands, persist the raw request,
//! and hand back a locator plus normalized operands for the compute state.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{TimeDelta, Utc};
use euclid_artifact::{Store, layout, put_bytes};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::TaskError;
use crate::function::{FunctionInvoker, InvocationContext};

pub const OPERAND_A_FIELD: &str = "a";
pub const OPERAND_B_FIELD: &str = "b";

const KEY_ATTEMPTS: usize = 16;

/// Structured result of a successful ingestion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestResult {
  pub message: String,
  pub storage_container: String,
  pub object_key: String,
  pub normalized_operand_a: String,
  pub normalized_operand_b: String,
}

/// Writes the request body to `input/<timestamp>.json` in one storage
/// container.
pub struct IngestFunction {
  store: Arc<dyn Store>,
  storage_container: String,
}

impl IngestFunction {
  pub fn new(store: Arc<dyn Store>, storage_container: impl Into<String>) -> Self {
    Self {
      store,
      storage_container: storage_container.into(),
    }
  }

  pub async fn ingest(&self, payload: &Value) -> Result<IngestResult, TaskError> {
    let a = operand(payload, OPERAND_A_FIELD);
    let b = operand(payload, OPERAND_B_FIELD);
    let (normalized_a, normalized_b) = match (a, b) {
      (Ok(a), Ok(b)) => (a, b),
      _ => {
        return Err(TaskError::validation(format!(
          "you provided {} and {} as input, please provide valid integers",
          display_field(payload, OPERAND_A_FIELD),
          display_field(payload, OPERAND_B_FIELD)
        )));
      }
    };

    let body = serde_json::to_vec(payload).map_err(|e| TaskError::failed(e.to_string()))?;
    let key = self.store_request(body).await?;
    debug!(storage_container = %self.storage_container, object_key = %key, "request ingested");

    Ok(IngestResult {
      message: "successfully stored request".to_string(),
      storage_container: self.storage_container.clone(),
      object_key: key,
      normalized_operand_a: normalized_a,
      normalized_operand_b: normalized_b,
    })
  }

  /// Write under a fresh `input/` key. Requests landing on the same
  /// microsecond move to the next free one.
  async fn store_request(&self, body: Vec<u8>) -> Result<String, TaskError> {
    let mut at = Utc::now();
    for _ in 0..KEY_ATTEMPTS {
      let key = layout::input_key(at);
      match put_bytes(self.store.as_ref(), &key, body.clone(), "application/json").await {
        Ok(()) => return Ok(key),
        Err(euclid_artifact::Error::AlreadyExists(_)) => at += TimeDelta::microseconds(1),
        Err(e) => return Err(e.into()),
      }
    }
    Err(TaskError::failed(format!(
      "no free input key after {} attempts",
      KEY_ATTEMPTS
    )))
  }
}

#[async_trait]
impl FunctionInvoker for IngestFunction {
  async fn invoke(&self, _ctx: &InvocationContext, input: Value) -> Result<Value, TaskError> {
    let result = self.ingest(&input).await?;
    serde_json::to_value(result).map_err(|e| TaskError::failed(e.to_string()))
  }
}

fn operand(payload: &Value, field: &str) -> Result<String, TaskError> {
  let value = payload
    .get(field)
    .ok_or_else(|| TaskError::validation(format!("missing operand '{}'", field)))?;
  normalize_operand(value)
}

/// Canonical decimal form of an integer operand.
///
/// Accepts JSON integers and strings holding a base-10 integer
/// (surrounding whitespace and a leading `+` are tolerated). Fractions,
/// booleans, null and anything outside the 64-bit signed range are rejected.
pub fn normalize_operand(value: &Value) -> Result<String, TaskError> {
  let parsed = match value {
    Value::Number(n) => n.as_i64(),
    Value::String(s) => s.trim().parse::<i64>().ok(),
    _ => None,
  };
  parsed
    .map(|n| n.to_string())
    .ok_or_else(|| TaskError::validation(format!("{} is not a valid integer", value)))
}

fn display_field(payload: &Value, field: &str) -> String {
  match payload.get(field) {
    Some(Value::String(s)) => s.clone(),
    Some(other) => other.to_string(),
    None => "undefined".to_string(),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use euclid_artifact::{MemoryStore, get_bytes};
  use serde_json::json;

  #[test]
  fn test_normalize_operand() {
    assert_eq!(normalize_operand(&json!(6)).unwrap(), "6");
    assert_eq!(normalize_operand(&json!(-42)).unwrap(), "-42");
    assert_eq!(normalize_operand(&json!("9")).unwrap(), "9");
    assert_eq!(normalize_operand(&json!(" +07 ")).unwrap(), "7");

    for bad in [json!("x"), json!(6.5), json!("6.5"), json!(true), json!(null), json!("")] {
      let err = normalize_operand(&bad).unwrap_err();
      assert!(err.is_validation(), "expected {} to be rejected", bad);
    }
  }

  #[tokio::test]
  async fn test_ingest_writes_payload() {
    let store = Arc::new(MemoryStore::new());
    let ingest = IngestFunction::new(store.clone(), "euclid-data");

    let payload = json!({"a": 6, "b": "9"});
    let result = ingest.ingest(&payload).await.unwrap();

    assert_eq!(result.storage_container, "euclid-data");
    assert_eq!(result.normalized_operand_a, "6");
    assert_eq!(result.normalized_operand_b, "9");
    assert!(result.object_key.starts_with("input/"));
    assert!(result.object_key.ends_with(".json"));

    let body = get_bytes(store.as_ref(), &result.object_key).await.unwrap();
    let stored: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(stored, payload);
  }

  #[tokio::test]
  async fn test_rapid_requests_get_distinct_keys() {
    let store = Arc::new(MemoryStore::new());
    let ingest = Arc::new(IngestFunction::new(store.clone(), "euclid-data"));

    let requests: Vec<_> = (0..200)
      .map(|i| {
        let ingest = ingest.clone();
        tokio::spawn(async move { ingest.ingest(&json!({"a": i, "b": 1})).await })
      })
      .collect();
    for request in requests {
      request.await.unwrap().unwrap();
    }

    assert_eq!(store.keys().await.len(), 200);
  }

  #[tokio::test]
  async fn test_ingest_rejects_without_writing() {
    let store = Arc::new(MemoryStore::new());
    let ingest = IngestFunction::new(store.clone(), "euclid-data");

    let err = ingest.ingest(&json!({"a": "x", "b": 9})).await.unwrap_err();
    assert!(err.is_validation());
    assert!(err.to_string().contains("x and 9"));

    let err = ingest.ingest(&json!({"a": 1})).await.unwrap_err();
    assert!(err.is_validation());

    assert!(store.keys().await.is_empty());
  }

  #[tokio::test]
  async fn test_invoke_returns_camel_case_fields() {
    let store = Arc::new(MemoryStore::new());
    let ingest = IngestFunction::new(store, "bucket");
    let ctx = InvocationContext {
      execution_id: "exec-1".to_string(),
      state_id: "ingest".to_string(),
      attempt: 1,
    };

    let out = ingest.invoke(&ctx, json!({"a": 1, "b": 2})).await.unwrap();
    assert_eq!(out["storageContainer"], "bucket");
    assert_eq!(out["normalizedOperandA"], "1");
    assert_eq!(out["normalizedOperandB"], "2");
    assert!(out["objectKey"].as_str().unwrap().starts_with("input/"));
  }
}
