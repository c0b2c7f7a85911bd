//! Orchestration engine for Euclid.
//!
//! # Architecture
//!
//! ```text
//! WorkflowRuntime
//! ├── new(config, workflow, registry, store) - one runtime per locked workflow
//! └── execute_workflow(payload, cancel) -> WorkflowExecution
//!
//! WorkflowExecution
//! └── wait() - walks the chain from the start state:
//!     resolve bindings -> dispatch by kind -> merge output -> checkpoint
//! ```
//!
//! Function states return a value that is merged into the accumulated data.
//! Container states are launched and then polled until the task reports a
//! terminal status; they never contribute data. Every failure is terminal
//! for the execution unless the state carries a retry policy, and only
//! invocation failures are retried.
//!
//! # Usage
//!
//! ```ignore
//! use euclid_runtime::{RuntimeConfig, WorkflowRuntime};
//!
//! let runtime = WorkflowRuntime::new(RuntimeConfig::default(), workflow, registry, store);
//! let result = runtime.execute_workflow(payload, cancel).wait().await?;
//! ```

mod binding;
mod error;
mod events;
mod execution;
mod runtime;
mod task;

pub use binding::{launch_parameters, merge_output, resolve_parameters};
pub use error::RuntimeError;
pub use events::{ChannelNotifier, ExecutionEvent, ExecutionNotifier, NoopNotifier};
pub use execution::{WorkflowExecution, WorkflowResult};
pub use runtime::{RuntimeConfig, WorkflowRuntime};
