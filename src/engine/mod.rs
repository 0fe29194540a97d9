//! Workflow execution engine abstraction
//!
//! The engine runs compiled task graphs; this crate only submits them,
//! reads their status and deletes them. [`ArgoEngine`] talks to Argo
//! Workflows over HTTP and [`mock::MockEngine`] is a scripted stand-in for
//! tests.

pub mod argo;
pub mod config;
pub mod mock;

pub use argo::ArgoEngine;
pub use config::EngineConfig;

use crate::compiler::TaskGraph;
use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Phase of an execution as reported by the engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ExecutionPhase {
    Pending,
    Running,
    Succeeded,
    Failed,
    Error,
    /// Anything else, including an execution the engine no longer knows
    Unknown(String),
}

impl ExecutionPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Error)
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed | Self::Error)
    }
}

impl From<String> for ExecutionPhase {
    fn from(value: String) -> Self {
        match value.as_str() {
            "Pending" => Self::Pending,
            "Running" => Self::Running,
            "Succeeded" => Self::Succeeded,
            "Failed" => Self::Failed,
            "Error" => Self::Error,
            _ => Self::Unknown(value),
        }
    }
}

impl From<ExecutionPhase> for String {
    fn from(phase: ExecutionPhase) -> Self {
        phase.to_string()
    }
}

impl fmt::Display for ExecutionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => f.write_str("Pending"),
            Self::Running => f.write_str("Running"),
            Self::Succeeded => f.write_str("Succeeded"),
            Self::Failed => f.write_str("Failed"),
            Self::Error => f.write_str("Error"),
            Self::Unknown(other) => f.write_str(other),
        }
    }
}

/// Snapshot of one execution
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ExecutionInfo {
    pub name: String,
    pub phase: Option<ExecutionPhase>,
    /// Task name -> output parameter name -> value
    #[serde(default)]
    pub outputs: BTreeMap<String, BTreeMap<String, String>>,
}

impl ExecutionInfo {
    pub fn phase(&self) -> ExecutionPhase {
        self.phase
            .clone()
            .unwrap_or_else(|| ExecutionPhase::Unknown(String::new()))
    }

    pub fn output(&self, task: &str, parameter: &str) -> Option<&str> {
        self.outputs
            .get(task)
            .and_then(|params| params.get(parameter))
            .map(String::as_str)
    }
}

/// Operations the lifecycle controller needs from an engine
#[async_trait]
pub trait WorkflowEngine: Send + Sync {
    /// Create an execution; returns the engine-assigned name
    ///
    /// `Ok(None)` means the engine accepted the request but reported no name.
    async fn submit(&self, graph: &TaskGraph, config: &EngineConfig) -> Result<Option<String>>;

    /// Look an execution up by name; `Ok(None)` when the engine has no such execution
    async fn get_execution(
        &self,
        name: &str,
        config: &EngineConfig,
    ) -> Result<Option<ExecutionInfo>>;

    async fn delete(&self, name: &str, config: &EngineConfig) -> Result<()>;
}
