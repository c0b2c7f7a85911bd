use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use euclid_runtime::RuntimeError;
use euclid_store::FailureKind;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
  #[error("{message}")]
  Http { status: StatusCode, message: String },

  /// The execution ran and failed.
  #[error("execution {execution_id} failed: {error}")]
  Execution {
    execution_id: String,
    error: RuntimeError,
  },

  #[error(transparent)]
  Store(#[from] euclid_store::Error),

  #[error(transparent)]
  Artifact(#[from] euclid_artifact::Error),

  #[error(transparent)]
  Task(#[from] euclid_task::TaskError),
}

impl ApiError {
  pub(crate) fn not_found(message: impl Into<String>) -> Self {
    Self::Http {
      status: StatusCode::NOT_FOUND,
      message: message.into(),
    }
  }

  pub(crate) fn bad_request(message: impl Into<String>) -> Self {
    Self::Http {
      status: StatusCode::BAD_REQUEST,
      message: message.into(),
    }
  }

  pub(crate) fn internal(message: impl Into<String>) -> Self {
    Self::Http {
      status: StatusCode::INTERNAL_SERVER_ERROR,
      message: message.into(),
    }
  }

  pub fn status(&self) -> StatusCode {
    match self {
      ApiError::Http { status, .. } => *status,
      ApiError::Execution { error, .. } => match error.kind() {
        FailureKind::Validation => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
      },
      ApiError::Store(euclid_store::Error::NotFound(_)) => StatusCode::NOT_FOUND,
      ApiError::Artifact(euclid_artifact::Error::NotFound(_)) => StatusCode::NOT_FOUND,
      ApiError::Store(_) | ApiError::Artifact(_) | ApiError::Task(_) => {
        StatusCode::INTERNAL_SERVER_ERROR
      }
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = self.status();
    match self {
      ApiError::Execution {
        execution_id,
        error,
      } => (
        status,
        Json(serde_json::json!({
          "executionId": execution_id,
          "error": error.detail(),
          "kind": error.kind(),
        })),
      )
        .into_response(),
      other => (status, Json(serde_json::json!({ "error": other.to_string() }))).into_response(),
    }
  }
}
