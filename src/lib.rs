//! # recipe-runner
//!
//! Compiles declarative data-transformation recipes into task graphs and
//! drives them through an Argo-style workflow engine.
//!
//! ## Modules
//!
//! - `recipe` - Loading and validating a recipe directory (`meta.yml` plus scripts)
//! - `partition` - Splitting input files into fixed-size partitions
//! - `dataone` - Resolving DataONE dataset identifiers to data objects
//! - `compiler` - Turning a recipe into an engine-neutral task graph
//! - `engine` - The workflow engine seam, its Argo client and a scripted mock
//! - `lifecycle` - Submitting executions and waiting for them to finish
//! - `publish` - Checking for and clearing previously published output
//! - `api` - The operations the CLI exposes
//! - `app` - Logging and fatal error handling for the binary
//! - `error` - The crate's error type and error codes
pub mod api;
pub mod app;
pub mod compiler;
pub mod dataone;
pub mod engine;
pub mod error;
pub mod lifecycle;
pub mod partition;
pub mod publish;
pub mod recipe;

pub use compiler::{compile, TaskGraph};
pub use engine::{EngineConfig, ExecutionPhase, WorkflowEngine};
pub use error::{ErrorCode, Result, RunnerError};
pub use lifecycle::{LifecycleController, PollOptions};
pub use recipe::Recipe;
