//! Euclid Workflow
//!
//! This crate provides the "locked" workflow representation for Euclid.
//! A locked workflow is a validated form of a [`euclid_config::WorkflowDef`]
//! that is ready for execution.
//!
//! Key differences from `euclid-config`:
//! - Every `next` resolves to an existing state
//! - Exactly one entry point (the start state); every state is reachable from it
//! - No state is visited twice when following transitions from the start
//! - Reference bindings are parsed into [`BindingPath`]s
//!
//! Validation happens once, when the workflow is locked. The runtime assumes
//! a [`Workflow`] is well formed.

mod builder;
mod error;
mod path;
mod pipeline;
mod state;
mod workflow;

pub use builder::WorkflowBuilder;
pub use error::WorkflowError;
pub use path::{BindingPath, PathSegment};
pub use pipeline::{COMPUTE_STATE, INGEST_STATE, compute_pipeline};
pub use state::{Binding, Parameter, State, StateKind, Transition};
pub use workflow::Workflow;
