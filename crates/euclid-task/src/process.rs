use std::collections::HashMap;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::container::{ContainerLauncher, LaunchRequest, TaskHandle, TaskStatus, env_var_name};
use crate::error::TaskError;

const IMAGE: &str = "{image}";
const TASK_ID: &str = "{task_id}";
const ENV_FLAGS: &str = "{env}";

struct ProcessTask {
  child: Child,
  stop_reason: Option<String>,
  stopped: Option<TaskStatus>,
}

/// Runs each container task as an OS process.
///
/// Launch parameters are exported to the process as environment variables
/// (`objectKey` → `OBJECT_KEY`). Arguments may contain the placeholders
/// `{image}` and `{task_id}`; a standalone `{env}` argument expands to one
/// `-e NAME` pair per parameter, for container CLIs that forward variables
/// from their own environment.
pub struct ProcessLauncher {
  program: String,
  args: Vec<String>,
  tasks: Mutex<HashMap<String, ProcessTask>>,
}

impl ProcessLauncher {
  pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
    Self {
      program: program.into(),
      args,
      tasks: Mutex::new(HashMap::new()),
    }
  }

  /// `docker run --rm --name <task id> <run_args> -e ... <image> <command>`
  pub fn docker(run_args: Vec<String>, command: Vec<String>) -> Self {
    let mut args: Vec<String> = ["run", "--rm", "--name", TASK_ID]
      .into_iter()
      .map(String::from)
      .collect();
    args.extend(run_args);
    args.push(ENV_FLAGS.to_string());
    args.push(IMAGE.to_string());
    args.extend(command);
    Self::new("docker", args)
  }

  pub fn program(&self) -> &str {
    &self.program
  }

  pub fn args(&self) -> &[String] {
    &self.args
  }

  /// Tasks not yet released.
  pub async fn tracked(&self) -> usize {
    self.tasks.lock().await.len()
  }

  fn command(&self, task_id: &str, request: &LaunchRequest) -> Command {
    let mut command = Command::new(&self.program);
    for arg in &self.args {
      if arg == ENV_FLAGS {
        for name in request.parameters.keys() {
          command.arg("-e").arg(env_var_name(name));
        }
        continue;
      }
      command.arg(
        arg
          .replace(IMAGE, &request.task.image)
          .replace(TASK_ID, task_id),
      );
    }
    for (name, value) in &request.parameters {
      command.env(env_var_name(name), value);
    }
    command
      .stdin(Stdio::null())
      .stdout(Stdio::inherit())
      .stderr(Stdio::inherit())
      .kill_on_drop(true);
    command
  }
}

#[async_trait]
impl ContainerLauncher for ProcessLauncher {
  async fn launch(&self, request: LaunchRequest) -> Result<TaskHandle, TaskError> {
    let task_id = format!("euclid-{}", uuid::Uuid::new_v4());
    let child = self
      .command(&task_id, &request)
      .spawn()
      .map_err(|e| TaskError::launch_rejected(format!("failed to start '{}': {}", self.program, e)))?;

    info!(task_id = %task_id, program = %self.program, image = %request.task.image, "process task launched");
    self.tasks.lock().await.insert(
      task_id.clone(),
      ProcessTask {
        child,
        stop_reason: None,
        stopped: None,
      },
    );
    Ok(TaskHandle { task_id })
  }

  async fn describe(&self, handle: &TaskHandle) -> Result<TaskStatus, TaskError> {
    let mut tasks = self.tasks.lock().await;
    let task = tasks
      .get_mut(&handle.task_id)
      .ok_or_else(|| TaskError::TaskNotFound(handle.task_id.clone()))?;

    if let Some(stopped) = &task.stopped {
      return Ok(stopped.clone());
    }

    match task.child.try_wait()? {
      None => Ok(TaskStatus::Running),
      Some(exit) => {
        let reason = task
          .stop_reason
          .clone()
          .unwrap_or_else(|| format!("process exited: {}", exit));
        let status = TaskStatus::Stopped {
          exit_code: exit.code(),
          reason,
        };
        debug!(task_id = %handle.task_id, ?status, "process task stopped");
        task.stopped = Some(status.clone());
        Ok(status)
      }
    }
  }

  async fn stop(&self, handle: &TaskHandle, reason: &str) -> Result<(), TaskError> {
    let mut tasks = self.tasks.lock().await;
    let task = tasks
      .get_mut(&handle.task_id)
      .ok_or_else(|| TaskError::TaskNotFound(handle.task_id.clone()))?;

    if task.stopped.is_some() || task.child.try_wait()?.is_some() {
      return Ok(());
    }
    task.stop_reason = Some(reason.to_string());
    task.child.start_kill()?;
    Ok(())
  }

  async fn release(&self, handle: &TaskHandle) {
    // dropping the child kills it if still running; tokio reaps it
    if self.tasks.lock().await.remove(&handle.task_id).is_some() {
      debug!(task_id = %handle.task_id, "process task released");
    }
  }
}

#[cfg(all(test, unix))]
mod tests {
  use super::*;
  use std::collections::BTreeMap;
  use std::time::Duration;

  use euclid_config::{ContainerTaskRef, LaunchType, NetworkConfig};

  fn request(parameters: &[(&str, &str)]) -> LaunchRequest {
    LaunchRequest {
      execution_id: "exec-1".to_string(),
      state_id: "compute".to_string(),
      task: ContainerTaskRef {
        cluster: "local".to_string(),
        task_definition: "euclid-compute".to_string(),
        container_name: "worker".to_string(),
        image: "euclid:latest".to_string(),
        launch_type: LaunchType::Local,
        network: NetworkConfig::default(),
      },
      parameters: parameters
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect::<BTreeMap<_, _>>(),
    }
  }

  async fn wait_terminal(launcher: &ProcessLauncher, handle: &TaskHandle) -> TaskStatus {
    loop {
      let status = launcher.describe(handle).await.unwrap();
      if status.is_terminal() {
        return status;
      }
      tokio::time::sleep(Duration::from_millis(10)).await;
    }
  }

  #[tokio::test]
  async fn test_parameters_become_env() {
    let launcher = ProcessLauncher::new(
      "sh",
      vec!["-c".to_string(), "test \"$OPERAND_A\" = 6 && test \"$OBJECT_KEY\" = input/x.json".to_string()],
    );
    let handle = launcher
      .launch(request(&[("operandA", "6"), ("objectKey", "input/x.json")]))
      .await
      .unwrap();

    assert!(wait_terminal(&launcher, &handle).await.succeeded());
  }

  #[tokio::test]
  async fn test_nonzero_exit() {
    let launcher = ProcessLauncher::new("sh", vec!["-c".to_string(), "exit 3".to_string()]);
    let handle = launcher.launch(request(&[])).await.unwrap();

    match wait_terminal(&launcher, &handle).await {
      TaskStatus::Stopped { exit_code, .. } => assert_eq!(exit_code, Some(3)),
      other => panic!("unexpected status {:?}", other),
    }
  }

  #[tokio::test]
  async fn test_stop_kills_process() {
    let launcher = ProcessLauncher::new("sleep", vec!["30".to_string()]);
    let handle = launcher.launch(request(&[])).await.unwrap();

    launcher.stop(&handle, "execution cancelled").await.unwrap();
    match wait_terminal(&launcher, &handle).await {
      TaskStatus::Stopped { exit_code, reason } => {
        assert_eq!(exit_code, None);
        assert_eq!(reason, "execution cancelled");
      }
      other => panic!("unexpected status {:?}", other),
    }
  }

  #[tokio::test]
  async fn test_release_forgets_reaped_processes() {
    let launcher = ProcessLauncher::new("true", vec![]);
    for _ in 0..10 {
      let handle = launcher.launch(request(&[])).await.unwrap();
      assert!(wait_terminal(&launcher, &handle).await.succeeded());
      launcher.release(&handle).await;
    }
    assert_eq!(launcher.tracked().await, 0);

    let running = ProcessLauncher::new("sleep", vec!["30".to_string()]);
    let handle = running.launch(request(&[])).await.unwrap();
    running.stop(&handle, "execution cancelled").await.unwrap();
    running.release(&handle).await;
    assert_eq!(running.tracked().await, 0);
    assert!(matches!(
      running.describe(&handle).await,
      Err(TaskError::TaskNotFound(_))
    ));
  }

  #[test]
  fn test_docker_command_line() {
    let launcher = ProcessLauncher::docker(
      vec!["-v".to_string(), "/data:/data".to_string()],
      vec!["worker".to_string()],
    );
    let command = launcher.command(
      "euclid-1",
      &request(&[("operandA", "6"), ("objectKey", "input/x.json")]),
    );
    let std = command.as_std();
    let args: Vec<_> = std.get_args().map(|a| a.to_string_lossy().into_owned()).collect();
    assert_eq!(std.get_program(), "docker");
    assert_eq!(
      args,
      vec![
        "run", "--rm", "--name", "euclid-1", "-v", "/data:/data", "-e", "OBJECT_KEY", "-e",
        "OPERAND_A", "euclid:latest", "worker",
      ]
    );
  }

  #[tokio::test]
  async fn test_missing_program_is_rejected() {
    let launcher = ProcessLauncher::new("/nonexistent/euclid-worker", vec![]);
    let err = launcher.launch(request(&[])).await.unwrap_err();
    assert!(matches!(err, TaskError::LaunchRejected { .. }));
  }
}
