use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use euclid_artifact::{get_bytes, layout};
use euclid_runtime::{RuntimeError, WorkflowResult};
use euclid_store::{ExecutionRecord, ExecutionStatus};
use serde::Serialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::ApiError;
use crate::{ServiceState, WaitMode};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct HealthResponse {
  status: &'static str,
  service: &'static str,
  workflow_id: String,
}

pub(crate) async fn health(State(state): State<ServiceState>) -> Json<HealthResponse> {
  Json(HealthResponse {
    status: "ok",
    service: "euclid",
    workflow_id: state.runtime.workflow().workflow_id.clone(),
  })
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ExecutionResponse {
  execution_id: String,
  status: ExecutionStatus,
  #[serde(skip_serializing_if = "Option::is_none")]
  output_key: Option<String>,
}

pub(crate) async fn start_execution(
  State(state): State<ServiceState>,
  body: Bytes,
) -> Result<Response, ApiError> {
  let payload: Value = serde_json::from_slice(&body)
    .map_err(|e| ApiError::bad_request(format!("invalid JSON body: {}", e)))?;
  if !payload.is_object() {
    return Err(ApiError::bad_request("request body must be a JSON object"));
  }

  let execution_id = uuid::Uuid::new_v4().to_string();
  let cancel = CancellationToken::new();
  info!(execution_id = %execution_id, wait = %state.config.wait, "execution requested");

  let runtime = state.runtime.clone();
  let id = execution_id.clone();
  let token = cancel.clone();
  let mut handle = tokio::spawn(async move {
    runtime
      .execute_workflow_with_id(id, payload, token)
      .wait()
      .await
  });

  if state.config.wait == WaitMode::Async {
    let response = ExecutionResponse {
      execution_id,
      status: ExecutionStatus::Running,
      output_key: None,
    };
    return Ok((StatusCode::ACCEPTED, Json(response)).into_response());
  }

  // Dropped with the request future if the client disconnects.
  let guard = cancel.clone().drop_guard();
  let joined = match state.config.request_timeout {
    Some(limit) => tokio::select! {
      joined = &mut handle => joined,
      _ = tokio::time::sleep(limit) => {
        warn!(execution_id = %execution_id, timeout_ms = limit.as_millis() as u64, "request timed out");
        cancel.cancel();
        handle.await
      }
    },
    None => handle.await,
  };
  guard.disarm();

  let result = joined.map_err(|e| ApiError::internal(format!("execution task failed: {}", e)))?;
  respond(execution_id, result)
}

fn respond(
  execution_id: String,
  result: Result<WorkflowResult, RuntimeError>,
) -> Result<Response, ApiError> {
  match result {
    Ok(result) => {
      let output_key = result
        .accumulated
        .get("objectKey")
        .and_then(Value::as_str)
        .map(layout::output_key);
      let response = ExecutionResponse {
        execution_id,
        status: ExecutionStatus::Succeeded,
        output_key,
      };
      Ok((StatusCode::OK, Json(response)).into_response())
    }
    Err(error) => Err(ApiError::Execution {
      execution_id,
      error,
    }),
  }
}

pub(crate) async fn get_execution(
  State(state): State<ServiceState>,
  Path(execution_id): Path<String>,
) -> Result<Json<ExecutionRecord>, ApiError> {
  let record = state
    .runtime
    .store()
    .get_execution(&execution_id)
    .await
    .map_err(|e| match e {
      euclid_store::Error::NotFound(_) => {
        ApiError::not_found(format!("execution '{}' not found", execution_id))
      }
      other => other.into(),
    })?;
  Ok(Json(record))
}

/// The object the compute task wrote for this execution.
pub(crate) async fn get_result(
  State(state): State<ServiceState>,
  Path(execution_id): Path<String>,
) -> Result<Response, ApiError> {
  let Json(record) = get_execution(State(state.clone()), Path(execution_id.clone())).await?;

  let data = &record.accumulated.0;
  let locator = data
    .get("storageContainer")
    .and_then(Value::as_str)
    .zip(data.get("objectKey").and_then(Value::as_str));
  let Some((container, object_key)) = locator else {
    return Err(ApiError::not_found(format!(
      "execution '{}' has no stored request",
      execution_id
    )));
  };

  let store = state.artifacts.resolve(container)?;
  let output_key = layout::output_key(object_key);
  let body = get_bytes(store.as_ref(), &output_key)
    .await
    .map_err(|e| match e {
      euclid_artifact::Error::NotFound(_) => ApiError::not_found(format!(
        "result for execution '{}' not available",
        execution_id
      )),
      other => other.into(),
    })?;

  Ok(([(header::CONTENT_TYPE, "application/json")], body).into_response())
}
