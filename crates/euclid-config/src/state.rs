use serde::{Deserialize, Serialize};

use crate::binding::ParameterDef;
use crate::enums::RetryBackoff;
use crate::resource::{ContainerTaskRef, FunctionRef};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateDef {
  pub state_id: String,
  #[serde(flatten)]
  pub state_type: StateType,
  #[serde(default)]
  pub parameters: Vec<ParameterDef>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub next: Option<String>,
  #[serde(default)]
  pub end: bool,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub timeout_ms: Option<u64>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub retry: Option<RetryPolicy>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StateType {
  /// Fire-and-await a short-lived function; its object output is merged.
  InvokeFunction {
    #[serde(flatten)]
    function: FunctionRef,
  },
  /// Launch a container task and block until it stops.
  InvokeContainerTaskSync {
    #[serde(flatten)]
    task: ContainerTaskRef,
  },
}

/// Bounded retry on invocation failure. Absent means fail fast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
  /// Total attempts including the first one.
  pub max_attempts: u32,
  pub backoff: RetryBackoff,
  pub initial_delay_ms: u64,
}

impl RetryPolicy {
  /// Delay to wait after the given failed attempt (1-based).
  pub fn delay_ms(&self, attempt: u32) -> u64 {
    let attempt = attempt.max(1) as u64;
    match self.backoff {
      RetryBackoff::Constant => self.initial_delay_ms,
      RetryBackoff::Linear => self.initial_delay_ms.saturating_mul(attempt),
      RetryBackoff::Exponential => {
        let factor = 1u64.checked_shl((attempt - 1) as u32).unwrap_or(u64::MAX);
        self.initial_delay_ms.saturating_mul(factor)
      }
    }
  }
}
