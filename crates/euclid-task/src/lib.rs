//! Euclid Task
//!
//! Contracts for the units of work a workflow state can invoke, and the
//! implementations Euclid ships with.
//!
//! Two kinds of unit exist:
//!
//! - [`FunctionInvoker`]: a short-lived call that returns a structured value.
//! - [`ContainerLauncher`]: an asynchronous, isolated worker. The caller gets a
//!   [`TaskHandle`] back from `launch` and must `describe` it until it reports
//!   [`TaskStatus::Stopped`]. The worker never returns a value; results travel
//!   through the result channel (`euclid-artifact`).
//!
//! Implementations are registered explicitly in a [`TaskRegistry`] and handed
//! to the runtime; nothing is looked up from ambient state.

mod container;
mod error;
mod function;
mod ingest;
mod local;
mod process;
mod registry;
mod storage;
mod worker;

pub use container::{ContainerLauncher, LaunchRequest, TaskHandle, TaskStatus, env_var_name};
pub use error::TaskError;
pub use function::{FunctionInvoker, InvocationContext};
pub use ingest::{IngestFunction, IngestResult, OPERAND_A_FIELD, OPERAND_B_FIELD, normalize_operand};
pub use local::{ContainerWorker, LocalLauncher};
pub use process::ProcessLauncher;
pub use registry::TaskRegistry;
pub use storage::{FsStoreResolver, SingleStoreResolver, StoreResolver};
pub use worker::{ComputeResult, SumWorker, WorkerParams, compute};
