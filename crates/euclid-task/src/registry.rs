use std::collections::HashMap;
use std::sync::Arc;

use crate::container::ContainerLauncher;
use crate::error::TaskError;
use crate::function::FunctionInvoker;

/// The capabilities a runtime may invoke.
///
/// Functions are looked up by the name in a state's `FunctionRef`; every
/// container state goes to the single launcher.
#[derive(Clone)]
pub struct TaskRegistry {
  functions: HashMap<String, Arc<dyn FunctionInvoker>>,
  launcher: Arc<dyn ContainerLauncher>,
}

impl TaskRegistry {
  pub fn new(launcher: Arc<dyn ContainerLauncher>) -> Self {
    Self {
      functions: HashMap::new(),
      launcher,
    }
  }

  pub fn with_function(mut self, name: impl Into<String>, function: Arc<dyn FunctionInvoker>) -> Self {
    self.register_function(name, function);
    self
  }

  pub fn register_function(&mut self, name: impl Into<String>, function: Arc<dyn FunctionInvoker>) {
    self.functions.insert(name.into(), function);
  }

  pub fn function(&self, name: &str) -> Result<Arc<dyn FunctionInvoker>, TaskError> {
    self
      .functions
      .get(name)
      .cloned()
      .ok_or_else(|| TaskError::FunctionNotFound(name.to_string()))
  }

  pub fn launcher(&self) -> &Arc<dyn ContainerLauncher> {
    &self.launcher
  }
}
