//! Router tests driving the full pipeline with in-process workers.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode};
use euclid_api::{ApiConfig, ServiceState, WaitMode, build_router};
use euclid_artifact::MemoryStore as ArtifactStore;
use euclid_config::PipelineSettings;
use euclid_runtime::{RuntimeConfig, WorkflowRuntime};
use euclid_store::{MemoryStore as RecordStore, Store as _};
use euclid_task::{
  ContainerWorker, IngestFunction, LaunchRequest, LocalLauncher, SingleStoreResolver, SumWorker,
  TaskError, TaskRegistry,
};
use euclid_workflow::compute_pipeline;
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

const CONTAINER: &str = "bucket";

/// Runs until stopped.
struct Stall;

#[async_trait]
impl ContainerWorker for Stall {
  async fn run(&self, _request: &LaunchRequest, cancel: CancellationToken) -> Result<(), TaskError> {
    cancel.cancelled().await;
    Err(TaskError::failed("stopped"))
  }
}

enum Worker {
  Sum,
  Stall,
  NoCapacity,
}

struct App {
  router: Router,
  records: Arc<RecordStore>,
}

fn app(worker: Worker, config: ApiConfig) -> App {
  let settings = PipelineSettings {
    storage_container: CONTAINER.to_string(),
    poll_interval_ms: 5,
    ..PipelineSettings::default()
  };
  let artifacts = Arc::new(ArtifactStore::new());
  let resolver = Arc::new(SingleStoreResolver::new(CONTAINER, artifacts.clone()));
  let launcher = match worker {
    Worker::Sum => LocalLauncher::new(Arc::new(SumWorker::new(resolver.clone()))),
    Worker::Stall => LocalLauncher::new(Arc::new(Stall)),
    Worker::NoCapacity => LocalLauncher::new(Arc::new(Stall)).with_capacity(0),
  };
  let registry = TaskRegistry::new(Arc::new(launcher)).with_function(
    settings.ingest_function.clone(),
    Arc::new(IngestFunction::new(artifacts, CONTAINER)),
  );
  let records = Arc::new(RecordStore::new());
  let runtime = WorkflowRuntime::new(
    RuntimeConfig::from(&settings),
    compute_pipeline(&settings).unwrap(),
    registry,
    records.clone(),
  );

  App {
    router: build_router(ServiceState::new(Arc::new(runtime), resolver, config)),
    records,
  }
}

async fn send(router: &Router, method: &str, uri: &str, body: Option<String>) -> (StatusCode, Value) {
  let mut request = Request::builder().method(method).uri(uri);
  if body.is_some() {
    request = request.header("content-type", "application/json");
  }
  let response = router
    .clone()
    .oneshot(request.body(body.map(Body::from).unwrap_or_else(Body::empty)).unwrap())
    .await
    .unwrap();

  let status = response.status();
  let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
  let body = if bytes.is_empty() {
    Value::Null
  } else {
    serde_json::from_slice(&bytes).unwrap()
  };
  (status, body)
}

async fn post_euclid(router: &Router, body: Value) -> (StatusCode, Value) {
  send(router, "POST", "/euclid", Some(body.to_string())).await
}

#[tokio::test]
async fn test_sum_request_succeeds() {
  let app = app(Worker::Sum, ApiConfig::default());

  let (status, body) = post_euclid(&app.router, json!({"a": 6, "b": 9})).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["status"], "succeeded");
  let execution_id = body["executionId"].as_str().unwrap().to_string();
  let output_key = body["outputKey"].as_str().unwrap();
  assert!(output_key.starts_with("output/"));

  let (status, record) = send(&app.router, "GET", &format!("/executions/{}", execution_id), None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(record["status"], "succeeded");
  assert_eq!(record["history"].as_array().unwrap().len(), 2);
  assert_eq!(record["accumulatedData"]["normalizedOperandB"], "9");

  let (status, result) = send(
    &app.router,
    "GET",
    &format!("/executions/{}/result", execution_id),
    None,
  )
  .await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(result, json!({"operandA": 6, "operandB": 9, "result": 15}));
}

#[tokio::test]
async fn test_invalid_operand_is_client_error() {
  let app = app(Worker::Sum, ApiConfig::default());

  let (status, body) = post_euclid(&app.router, json!({"a": "x", "b": 9})).await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
  assert_eq!(body["kind"], "validation");
  let execution_id = body["executionId"].as_str().unwrap();

  let record = app.records.get_execution(execution_id).await.unwrap();
  assert_eq!(record.history.0.len(), 1);
}

#[tokio::test]
async fn test_malformed_body_is_client_error() {
  let app = app(Worker::Sum, ApiConfig::default());

  let (status, body) = post_euclid(&app.router, json!([6, 9])).await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
  assert!(body.get("executionId").is_none());

  let (status, _) = send(&app.router, "POST", "/euclid", Some("{not json".to_string())).await;
  assert_eq!(status, StatusCode::BAD_REQUEST);

  assert!(app.records.list_executions("euclid").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_launch_failure_is_server_error() {
  let app = app(Worker::NoCapacity, ApiConfig::default());

  let (status, body) = post_euclid(&app.router, json!({"a": 6, "b": 9})).await;
  assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
  assert_eq!(body["kind"], "invocation");
  assert!(body["error"].as_str().unwrap().contains("launch rejected"));
  assert!(body["executionId"].is_string());
}

#[tokio::test]
async fn test_request_timeout_cancels_execution() {
  let config = ApiConfig {
    wait: WaitMode::Sync,
    request_timeout: Some(Duration::from_millis(100)),
  };
  let app = app(Worker::Stall, config);

  let (status, body) = post_euclid(&app.router, json!({"a": 6, "b": 9})).await;
  assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
  assert_eq!(body["kind"], "cancelled");

  let record = app
    .records
    .get_execution(body["executionId"].as_str().unwrap())
    .await
    .unwrap();
  let failure = record.failure.unwrap().0;
  assert_eq!(failure.state, "compute");
}

#[tokio::test]
async fn test_async_mode_returns_handle() {
  let config = ApiConfig {
    wait: WaitMode::Async,
    request_timeout: None,
  };
  let app = app(Worker::Sum, config);

  let (status, body) = post_euclid(&app.router, json!({"a": 2, "b": 3})).await;
  assert_eq!(status, StatusCode::ACCEPTED);
  assert_eq!(body["status"], "running");
  let execution_id = body["executionId"].as_str().unwrap().to_string();

  let uri = format!("/executions/{}", execution_id);
  let mut record = Value::Null;
  for _ in 0..200 {
    let (status, body) = send(&app.router, "GET", &uri, None).await;
    if status == StatusCode::OK && body["status"] == "succeeded" {
      record = body;
      break;
    }
    tokio::time::sleep(Duration::from_millis(10)).await;
  }
  assert_eq!(record["status"], "succeeded");

  let (status, result) = send(&app.router, "GET", &format!("{}/result", uri), None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(result["result"], 5);
}

#[tokio::test]
async fn test_unknown_execution_is_not_found() {
  let app = app(Worker::Sum, ApiConfig::default());

  let (status, _) = send(&app.router, "GET", "/executions/missing", None).await;
  assert_eq!(status, StatusCode::NOT_FOUND);

  let (status, _) = send(&app.router, "GET", "/executions/missing/result", None).await;
  assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_result_not_found_for_failed_execution() {
  let app = app(Worker::NoCapacity, ApiConfig::default());

  let (_, body) = post_euclid(&app.router, json!({"a": 6, "b": 9})).await;
  let uri = format!("/executions/{}/result", body["executionId"].as_str().unwrap());
  let (status, _) = send(&app.router, "GET", &uri, None).await;
  assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_health() {
  let app = app(Worker::Sum, ApiConfig::default());
  let (status, body) = send(&app.router, "GET", "/health", None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["status"], "ok");
  assert_eq!(body["workflowId"], "euclid");
}
