use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::container::{ContainerLauncher, LaunchRequest, TaskHandle, TaskStatus};
use crate::error::TaskError;

/// Work run by [`LocalLauncher`] in place of a container image.
#[async_trait]
pub trait ContainerWorker: Send + Sync {
  /// Run to completion. `Ok` maps to exit code 0, `Err` to exit code 1.
  async fn run(&self, request: &LaunchRequest, cancel: CancellationToken) -> Result<(), TaskError>;
}

struct LocalTask {
  status: Arc<Mutex<TaskStatus>>,
  cancel: CancellationToken,
}

/// Runs container tasks as tokio tasks in the current process.
///
/// Useful for tests and single-process deployments. An optional capacity
/// bounds the number of unfinished tasks; launches beyond it are rejected
/// the way a saturated cluster would.
pub struct LocalLauncher {
  worker: Arc<dyn ContainerWorker>,
  capacity: Option<usize>,
  tasks: Mutex<HashMap<String, LocalTask>>,
}

impl LocalLauncher {
  pub fn new(worker: Arc<dyn ContainerWorker>) -> Self {
    Self {
      worker,
      capacity: None,
      tasks: Mutex::new(HashMap::new()),
    }
  }

  pub fn with_capacity(mut self, capacity: usize) -> Self {
    self.capacity = Some(capacity);
    self
  }

  /// Tasks not yet released, including finished ones the caller has not
  /// picked up.
  pub async fn tracked(&self) -> usize {
    self.tasks.lock().await.len()
  }
}

async fn active(tasks: &HashMap<String, LocalTask>) -> usize {
  let mut count = 0;
  for task in tasks.values() {
    if !task.status.lock().await.is_terminal() {
      count += 1;
    }
  }
  count
}

#[async_trait]
impl ContainerLauncher for LocalLauncher {
  async fn launch(&self, request: LaunchRequest) -> Result<TaskHandle, TaskError> {
    // count and insert under one lock so concurrent launches respect capacity
    let mut tasks = self.tasks.lock().await;
    if let Some(capacity) = self.capacity {
      if active(&tasks).await >= capacity {
        return Err(TaskError::launch_rejected(format!(
          "capacity of {} running tasks reached",
          capacity
        )));
      }
    }

    let task_id = uuid::Uuid::new_v4().to_string();
    let status = Arc::new(Mutex::new(TaskStatus::Provisioning));
    let cancel = CancellationToken::new();

    tasks.insert(
      task_id.clone(),
      LocalTask {
        status: status.clone(),
        cancel: cancel.clone(),
      },
    );
    drop(tasks);

    let worker = self.worker.clone();
    let id = task_id.clone();
    tokio::spawn(async move {
      *status.lock().await = TaskStatus::Running;
      debug!(task_id = %id, state = %request.state_id, "local task running");

      let outcome = tokio::select! {
        result = worker.run(&request, cancel.clone()) => Some(result),
        _ = cancel.cancelled() => None,
      };

      let stopped = match outcome {
        Some(Ok(())) => TaskStatus::Stopped {
          exit_code: Some(0),
          reason: "essential container exited".to_string(),
        },
        Some(Err(e)) => {
          warn!(task_id = %id, error = %e, "local task failed");
          TaskStatus::Stopped {
            exit_code: Some(1),
            reason: e.to_string(),
          }
        }
        None => TaskStatus::Stopped {
          exit_code: None,
          reason: "task stopped".to_string(),
        },
      };
      let mut current = status.lock().await;
      // a stop request may already have recorded its reason
      if !current.is_terminal() {
        *current = stopped;
      }
    });

    Ok(TaskHandle { task_id })
  }

  async fn describe(&self, handle: &TaskHandle) -> Result<TaskStatus, TaskError> {
    let tasks = self.tasks.lock().await;
    let task = tasks
      .get(&handle.task_id)
      .ok_or_else(|| TaskError::TaskNotFound(handle.task_id.clone()))?;
    let status = task.status.lock().await.clone();
    Ok(status)
  }

  async fn stop(&self, handle: &TaskHandle, reason: &str) -> Result<(), TaskError> {
    let tasks = self.tasks.lock().await;
    let task = tasks
      .get(&handle.task_id)
      .ok_or_else(|| TaskError::TaskNotFound(handle.task_id.clone()))?;

    let mut status = task.status.lock().await;
    if !status.is_terminal() {
      *status = TaskStatus::Stopped {
        exit_code: None,
        reason: reason.to_string(),
      };
    }
    task.cancel.cancel();
    Ok(())
  }

  async fn release(&self, handle: &TaskHandle) {
    if let Some(task) = self.tasks.lock().await.remove(&handle.task_id) {
      // nobody will observe a released task, stop it if still running
      task.cancel.cancel();
    }
  }
}
