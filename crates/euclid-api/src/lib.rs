//! HTTP ingress for Euclid.
//!
//! ```text
//! POST /euclid                    start an execution for a JSON object body
//! GET  /executions/:id            the execution record
//! GET  /executions/:id/result     the result object written by the compute task
//! GET  /health
//! ```
//!
//! In [`WaitMode::Sync`] a `POST` answers once the execution is terminal. The
//! execution runs on its own task; if the client goes away or the request
//! timeout elapses, the execution is cancelled rather than abandoned, so any
//! running container task is stopped and the record ends `failed`.

mod error;
mod routes;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::routing::{get, post};
use euclid_runtime::WorkflowRuntime;
use euclid_task::StoreResolver;
use serde::{Deserialize, Serialize};

pub use error::ApiError;

/// Whether `POST /euclid` waits for the execution to finish.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaitMode {
  /// Respond with the terminal status.
  #[default]
  Sync,
  /// Respond `202 Accepted` with the execution ID right away.
  Async,
}

impl FromStr for WaitMode {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_ascii_lowercase().as_str() {
      "sync" => Ok(WaitMode::Sync),
      "async" => Ok(WaitMode::Async),
      other => Err(format!("unknown wait mode '{}', expected sync or async", other)),
    }
  }
}

impl fmt::Display for WaitMode {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      WaitMode::Sync => write!(f, "sync"),
      WaitMode::Async => write!(f, "async"),
    }
  }
}

#[derive(Debug, Clone, Default)]
pub struct ApiConfig {
  pub wait: WaitMode,
  /// Upper bound on a synchronous request. Elapsing cancels the execution.
  pub request_timeout: Option<Duration>,
}

#[derive(Clone)]
pub struct ServiceState {
  pub runtime: Arc<WorkflowRuntime>,
  /// Locates the storage container named in an execution's data.
  pub artifacts: Arc<dyn StoreResolver>,
  pub config: ApiConfig,
}

impl ServiceState {
  pub fn new(
    runtime: Arc<WorkflowRuntime>,
    artifacts: Arc<dyn StoreResolver>,
    config: ApiConfig,
  ) -> Self {
    Self {
      runtime,
      artifacts,
      config,
    }
  }
}

pub fn build_router(state: ServiceState) -> Router {
  Router::new()
    .route("/health", get(routes::health))
    .route("/euclid", post(routes::start_execution))
    .route("/executions/:execution_id", get(routes::get_execution))
    .route("/executions/:execution_id/result", get(routes::get_result))
    .with_state(state)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_wait_mode_parse() {
    assert_eq!("sync".parse::<WaitMode>().unwrap(), WaitMode::Sync);
    assert_eq!("ASYNC".parse::<WaitMode>().unwrap(), WaitMode::Async);
    assert!("later".parse::<WaitMode>().is_err());
    assert_eq!(WaitMode::default().to_string(), "sync");
  }
}
