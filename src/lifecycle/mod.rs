//! Execution lifecycle: submit, poll, wait, clean up
//!
//! An execution moves from submitted through any number of non-terminal
//! phases to `Succeeded` or `Failed`/`Error`. Phases the controller does not
//! recognize, and executions the engine does not (yet) report, are treated
//! as still running.

use crate::compiler::TaskGraph;
use crate::engine::{ArgoEngine, EngineConfig, ExecutionInfo, ExecutionPhase, WorkflowEngine};
use crate::error::{ErrorCode, Result, RunnerError};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Phase reported for executions the engine does not know about
pub const ABSENT_PHASE: &str = "absent";

/// How to wait for an execution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollOptions {
    pub interval: Duration,
    /// Give up after this long; waits forever when unset
    pub deadline: Option<Duration>,
}

impl Default for PollOptions {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            deadline: None,
        }
    }
}

impl PollOptions {
    pub fn every(interval: Duration) -> Self {
        Self {
            interval,
            deadline: None,
        }
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }
}

/// Talks to one engine with one immutable configuration
#[derive(Clone)]
pub struct LifecycleController {
    engine: Arc<dyn WorkflowEngine>,
    config: Arc<EngineConfig>,
}

impl LifecycleController {
    pub fn new(engine: Arc<dyn WorkflowEngine>, config: EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            engine,
            config: Arc::new(config),
        })
    }

    /// Controller backed by the Argo REST API
    pub fn argo(config: EngineConfig) -> Result<Self> {
        Self::new(Arc::new(ArgoEngine::new()?), config)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Same engine, different configuration
    pub fn rebind(&self, config: EngineConfig) -> Result<Self> {
        Self::new(Arc::clone(&self.engine), config)
    }

    /// Create one execution and return its name
    pub async fn submit(&self, graph: &TaskGraph) -> Result<String> {
        let name = self.engine.submit(graph, &self.config).await?;
        let name = name.ok_or_else(|| {
            RunnerError::submission(
                ErrorCode::ENGINE_NO_HANDLE,
                format!(
                    "Problem with submitting workflow {}: engine returned no name",
                    graph.generate_name
                ),
            )
        })?;
        info!("Submitted workflow {}", name);
        Ok(name)
    }

    /// Current phase of `name`; absent executions report `Unknown("absent")`
    pub async fn poll(&self, name: &str) -> Result<ExecutionPhase> {
        Ok(self
            .execution(name)
            .await?
            .map(|info| info.phase())
            .unwrap_or_else(|| ExecutionPhase::Unknown(ABSENT_PHASE.to_string())))
    }

    pub async fn execution(&self, name: &str) -> Result<Option<ExecutionInfo>> {
        self.engine.get_execution(name, &self.config).await
    }

    /// Poll `name` until it reaches a terminal phase
    ///
    /// Returns the final snapshot on success. Failure, or passing the
    /// optional deadline, is an execution error naming the execution.
    pub async fn wait_for_completion(
        &self,
        name: &str,
        options: &PollOptions,
    ) -> Result<ExecutionInfo> {
        let started = Instant::now();
        loop {
            tokio::time::sleep(options.interval).await;

            let info = self.execution(name).await?;
            let phase = info
                .as_ref()
                .map(ExecutionInfo::phase)
                .unwrap_or_else(|| ExecutionPhase::Unknown(ABSENT_PHASE.to_string()));
            debug!("Workflow {} phase: {}", name, phase);

            match (phase, info) {
                (ExecutionPhase::Succeeded, Some(info)) => return Ok(info),
                (phase, _) if phase.is_failure() => {
                    return Err(RunnerError::execution(
                        ErrorCode::ENGINE_EXECUTION_FAILED,
                        format!("Workflow {} finished with phase {}", name, phase),
                        Some(name.to_string()),
                    ));
                }
                _ => {}
            }

            if let Some(deadline) = options.deadline {
                if started.elapsed() >= deadline {
                    return Err(RunnerError::execution(
                        ErrorCode::ENGINE_TIMEOUT,
                        format!("Workflow {} timed out after {:?}", name, deadline),
                        Some(name.to_string()),
                    ));
                }
            }
        }
    }

    /// Submit `graph` once and wait for it to finish
    pub async fn run_to_completion(
        &self,
        graph: &TaskGraph,
        options: &PollOptions,
    ) -> Result<ExecutionInfo> {
        let name = self.submit(graph).await?;
        self.wait_for_completion(&name, options).await
    }

    /// Delete an execution, logging instead of failing
    pub async fn delete_best_effort(&self, name: &str) {
        match self.engine.delete(name, &self.config).await {
            Ok(()) => debug!("Deleted workflow {}", name),
            Err(e) => warn!("Failed to delete workflow {}: {}", name, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::TaskGraphBuilder;
    use crate::engine::mock::MockEngine;

    fn controller(engine: &MockEngine) -> LifecycleController {
        LifecycleController::new(Arc::new(engine.clone()), EngineConfig::default()).unwrap()
    }

    fn fast() -> PollOptions {
        PollOptions::every(Duration::from_millis(1))
    }

    fn graph() -> TaskGraph {
        TaskGraphBuilder::new("wf-").build()
    }

    #[tokio::test]
    async fn test_failure_after_three_polls() {
        let engine = MockEngine::new();
        engine
            .expect_submission("wf-")
            .phases([ExecutionPhase::Running, ExecutionPhase::Running, ExecutionPhase::Failed])
            .finish();

        let err = controller(&engine).run_to_completion(&graph(), &fast()).await.unwrap_err();

        let name = err.workflow_name().unwrap().to_string();
        assert_eq!(err.code(), ErrorCode::ENGINE_EXECUTION_FAILED);
        assert!(err.to_string().contains(&name));
        assert_eq!(engine.poll_count(&name), 3);
    }

    #[tokio::test]
    async fn test_success_after_two_polls() {
        let engine = MockEngine::new();
        engine
            .expect_submission("wf-")
            .phases([ExecutionPhase::Running, ExecutionPhase::Succeeded])
            .finish();

        let info = controller(&engine).run_to_completion(&graph(), &fast()).await.unwrap();
        assert_eq!(info.phase(), ExecutionPhase::Succeeded);
        assert_eq!(engine.poll_count(&info.name), 2);
        assert_eq!(engine.submit_count(), 1);
    }

    #[tokio::test]
    async fn test_missing_name_fails_without_polling() {
        let engine = MockEngine::new();
        engine.expect_submission("wf-").returns_no_name().finish();

        let err = controller(&engine).run_to_completion(&graph(), &fast()).await.unwrap_err();
        assert!(matches!(err, RunnerError::Submission { .. }));
        assert_eq!(err.code(), ErrorCode::ENGINE_NO_HANDLE);
        assert!(engine
            .get_call_history()
            .iter()
            .all(|call| !matches!(call, crate::engine::mock::MockCall::Get { .. })));
    }

    #[tokio::test]
    async fn test_error_phase_is_failure() {
        let engine = MockEngine::new();
        engine.expect_submission("wf-").phases([ExecutionPhase::Error]).finish();
        let err = controller(&engine).run_to_completion(&graph(), &fast()).await.unwrap_err();
        assert!(matches!(err, RunnerError::Execution { .. }));
    }

    #[tokio::test]
    async fn test_unknown_phases_keep_waiting() {
        let engine = MockEngine::new();
        engine
            .expect_submission("wf-")
            .phases([
                ExecutionPhase::Pending,
                ExecutionPhase::Unknown(String::new()),
                ExecutionPhase::Succeeded,
            ])
            .finish();
        let info = controller(&engine).run_to_completion(&graph(), &fast()).await.unwrap();
        assert_eq!(engine.poll_count(&info.name), 3);
    }

    #[tokio::test]
    async fn test_deadline_turns_into_timeout() {
        let engine = MockEngine::new();
        engine.expect_submission("wf-").phases([ExecutionPhase::Running]).finish();
        let options = fast().with_deadline(Duration::from_millis(20));
        let err = controller(&engine).run_to_completion(&graph(), &options).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::ENGINE_TIMEOUT);
    }

    #[tokio::test]
    async fn test_poll_absent_is_unknown() {
        let engine = MockEngine::new();
        let phase = controller(&engine).poll("missing").await.unwrap();
        assert_eq!(phase, ExecutionPhase::Unknown(ABSENT_PHASE.to_string()));
    }

    #[tokio::test]
    async fn test_delete_failure_is_swallowed() {
        let engine = MockEngine::new();
        engine.fail_deletes(true);
        controller(&engine).delete_best_effort("wf-1").await;
        assert_eq!(engine.delete_count(), 1);
    }

    #[test]
    fn test_rebind_validates_new_config() {
        let engine = MockEngine::new();
        let ctl = controller(&engine);
        let rebound = ctl
            .rebind(EngineConfig {
                namespace: "other".to_string(),
                ..EngineConfig::default()
            })
            .unwrap();
        assert_eq!(rebound.config().namespace, "other");
        assert_eq!(ctl.config().namespace, "argo-helm");

        let bad = EngineConfig {
            max_parallelism: 0,
            ..EngineConfig::default()
        };
        assert!(ctl.rebind(bad).is_err());
    }
}
