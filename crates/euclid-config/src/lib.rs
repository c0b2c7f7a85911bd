//! Euclid Config
//!
//! This crate contains the serializable configuration types for Euclid.
//! These types represent workflow definitions before they are validated and
//! locked by `euclid-workflow`, plus the [`PipelineSettings`] that parameterize
//! the compute pipeline (storage container, image, region, network).
//!
//! Configuration can be loaded from JSON files (via CLI with `--settings`).

mod binding;
mod enums;
mod error;
mod resource;
mod settings;
mod state;
mod workflow;

pub use binding::{ParameterBinding, ParameterDef};
pub use enums::{LaunchType, RetryBackoff};
pub use error::ConfigError;
pub use resource::{ContainerTaskRef, FunctionRef, NetworkConfig};
pub use settings::PipelineSettings;
pub use state::{RetryPolicy, StateDef, StateType};
pub use workflow::WorkflowDef;
