use async_trait::async_trait;

use crate::error::TaskError;

/// Identifies the invocation a unit of work belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvocationContext {
  pub execution_id: String,
  pub state_id: String,
  /// 1-based attempt number.
  pub attempt: u32,
}

/// A short-lived function that returns a structured value.
#[async_trait]
pub trait FunctionInvoker: Send + Sync {
  async fn invoke(
    &self,
    ctx: &InvocationContext,
    input: serde_json::Value,
  ) -> Result<serde_json::Value, TaskError>;
}
