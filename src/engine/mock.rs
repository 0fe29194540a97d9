//! Scripted in-memory engine for tests
//!
//! Each submission can be scripted with the phases later status calls
//! observe. Unscripted submissions succeed on the first poll. The mock also
//! keeps a simulated shared volume (the set of recipe ids with published
//! data) so publish-state checks and clears have observable effects.

use super::{EngineConfig, ExecutionInfo, ExecutionPhase, WorkflowEngine};
use crate::compiler::{TaskGraph, RECIPE_ID_LABEL};
use crate::error::{ErrorCode, Result, RunnerError};
use crate::publish::{CHECK_TASK, CLEAR_TASK, PUBLISHED_PARAMETER};
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::sync::{Arc, Mutex};

/// A call made against the mock
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockCall {
    Submit { generate_name: String },
    Get { name: String },
    Delete { name: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SubmitResponse {
    Named,
    NoName,
    Reject,
}

struct MockExpectation {
    name_prefix: String,
    response: SubmitResponse,
    phases: Vec<ExecutionPhase>,
}

struct MockExecution {
    phases: VecDeque<ExecutionPhase>,
    last: ExecutionPhase,
    outputs: BTreeMap<String, BTreeMap<String, String>>,
}

#[derive(Default)]
struct MockState {
    expectations: Vec<MockExpectation>,
    executions: HashMap<String, MockExecution>,
    call_history: Vec<MockCall>,
    submitted: Vec<TaskGraph>,
    volume: BTreeSet<String>,
    fail_deletes: bool,
    counter: usize,
}

#[derive(Clone, Default)]
pub struct MockEngine {
    state: Arc<Mutex<MockState>>,
}

pub struct MockSubmissionConfig {
    engine: MockEngine,
    expectation: MockExpectation,
}

impl MockEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the next submission whose generate name starts with `name_prefix`
    pub fn expect_submission(&self, name_prefix: &str) -> MockSubmissionConfig {
        MockSubmissionConfig {
            engine: self.clone(),
            expectation: MockExpectation {
                name_prefix: name_prefix.to_string(),
                response: SubmitResponse::Named,
                phases: vec![ExecutionPhase::Succeeded],
            },
        }
    }

    /// Pretend `recipe_id` already has data on the shared volume
    pub fn seed_published(&self, recipe_id: &str) {
        self.state.lock().unwrap().volume.insert(recipe_id.to_string());
    }

    pub fn is_published(&self, recipe_id: &str) -> bool {
        self.state.lock().unwrap().volume.contains(recipe_id)
    }

    pub fn fail_deletes(&self, fail: bool) {
        self.state.lock().unwrap().fail_deletes = fail;
    }

    pub fn get_call_history(&self) -> Vec<MockCall> {
        self.state.lock().unwrap().call_history.clone()
    }

    pub fn submitted_graphs(&self) -> Vec<TaskGraph> {
        self.state.lock().unwrap().submitted.clone()
    }

    pub fn submit_count(&self) -> usize {
        self.count(|call| matches!(call, MockCall::Submit { .. }))
    }

    /// Status calls made for `name`
    pub fn poll_count(&self, name: &str) -> usize {
        self.count(|call| matches!(call, MockCall::Get { name: n } if n == name))
    }

    pub fn delete_count(&self) -> usize {
        self.count(|call| matches!(call, MockCall::Delete { .. }))
    }

    fn count(&self, predicate: impl Fn(&MockCall) -> bool) -> usize {
        self.state
            .lock()
            .unwrap()
            .call_history
            .iter()
            .filter(|call| predicate(call))
            .count()
    }
}

impl MockState {
    /// Apply what a successful run of `graph` does to the shared volume
    fn apply_effects(&mut self, graph: &TaskGraph) -> BTreeMap<String, BTreeMap<String, String>> {
        let mut outputs = BTreeMap::new();
        let recipe_id = graph.labels.get(RECIPE_ID_LABEL).cloned().unwrap_or_default();

        if graph.task(CHECK_TASK).is_some() {
            let published = if self.volume.contains(&recipe_id) { "yes" } else { "no" };
            outputs.insert(
                CHECK_TASK.to_string(),
                BTreeMap::from([(PUBLISHED_PARAMETER.to_string(), published.to_string())]),
            );
        }
        if graph.task(CLEAR_TASK).is_some() {
            self.volume.remove(&recipe_id);
        }
        for task in graph.tasks() {
            for mount in &task.container.volume_mounts {
                if let Some(sub_path) = &mount.sub_path {
                    self.volume.insert(sub_path.clone());
                }
            }
        }
        outputs
    }
}

#[async_trait]
impl WorkflowEngine for MockEngine {
    async fn submit(&self, graph: &TaskGraph, _config: &EngineConfig) -> Result<Option<String>> {
        let mut state = self.state.lock().unwrap();
        state.call_history.push(MockCall::Submit {
            generate_name: graph.generate_name.clone(),
        });
        state.submitted.push(graph.clone());

        let expectation = state
            .expectations
            .iter()
            .position(|e| graph.generate_name.starts_with(&e.name_prefix))
            .map(|idx| state.expectations.remove(idx));
        let (response, phases) = match expectation {
            Some(e) => (e.response, e.phases),
            None => (SubmitResponse::Named, vec![ExecutionPhase::Succeeded]),
        };

        match response {
            SubmitResponse::Reject => {
                return Err(RunnerError::submission(
                    ErrorCode::ENGINE_SUBMISSION_FAILED,
                    "mock engine rejected the workflow",
                ))
            }
            SubmitResponse::NoName => return Ok(None),
            SubmitResponse::Named => {}
        }

        state.counter += 1;
        let name = format!("{}{:05}", graph.generate_name, state.counter);
        let last = phases
            .last()
            .cloned()
            .unwrap_or(ExecutionPhase::Succeeded);
        let outputs = if last == ExecutionPhase::Succeeded {
            state.apply_effects(graph)
        } else {
            BTreeMap::new()
        };

        state.executions.insert(
            name.clone(),
            MockExecution {
                phases: phases.into(),
                last,
                outputs,
            },
        );
        Ok(Some(name))
    }

    async fn get_execution(
        &self,
        name: &str,
        _config: &EngineConfig,
    ) -> Result<Option<ExecutionInfo>> {
        let mut state = self.state.lock().unwrap();
        state.call_history.push(MockCall::Get {
            name: name.to_string(),
        });

        let Some(execution) = state.executions.get_mut(name) else {
            return Ok(None);
        };
        let phase = execution
            .phases
            .pop_front()
            .unwrap_or_else(|| execution.last.clone());
        let outputs = if phase.is_terminal() {
            execution.outputs.clone()
        } else {
            BTreeMap::new()
        };

        Ok(Some(ExecutionInfo {
            name: name.to_string(),
            phase: Some(phase),
            outputs,
        }))
    }

    async fn delete(&self, name: &str, _config: &EngineConfig) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.call_history.push(MockCall::Delete {
            name: name.to_string(),
        });
        if state.fail_deletes {
            return Err(RunnerError::engine(format!("mock engine failed to delete {}", name)));
        }
        state.executions.remove(name);
        Ok(())
    }
}

impl MockSubmissionConfig {
    /// Phases returned by successive status calls; the last one repeats
    pub fn phases(mut self, phases: impl IntoIterator<Item = ExecutionPhase>) -> Self {
        self.expectation.phases = phases.into_iter().collect();
        self
    }

    pub fn returns_no_name(mut self) -> Self {
        self.expectation.response = SubmitResponse::NoName;
        self
    }

    pub fn rejects(mut self) -> Self {
        self.expectation.response = SubmitResponse::Reject;
        self
    }

    pub fn finish(self) {
        self.engine
            .state
            .lock()
            .unwrap()
            .expectations
            .push(self.expectation);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::TaskGraphBuilder;

    fn graph(name: &str) -> TaskGraph {
        TaskGraphBuilder::new(name).build()
    }

    #[tokio::test]
    async fn test_unscripted_submission_succeeds() {
        let engine = MockEngine::new();
        let config = EngineConfig::default();
        let name = engine.submit(&graph("wf-"), &config).await.unwrap().unwrap();
        assert!(name.starts_with("wf-"));
        let info = engine.get_execution(&name, &config).await.unwrap().unwrap();
        assert_eq!(info.phase(), ExecutionPhase::Succeeded);
    }

    #[tokio::test]
    async fn test_scripted_phases_then_last_repeats() {
        let engine = MockEngine::new();
        engine
            .expect_submission("wf-")
            .phases([ExecutionPhase::Running, ExecutionPhase::Failed])
            .finish();
        let config = EngineConfig::default();
        let name = engine.submit(&graph("wf-"), &config).await.unwrap().unwrap();

        let mut seen = Vec::new();
        for _ in 0..3 {
            seen.push(engine.get_execution(&name, &config).await.unwrap().unwrap().phase());
        }
        assert_eq!(
            seen,
            vec![ExecutionPhase::Running, ExecutionPhase::Failed, ExecutionPhase::Failed]
        );
        assert_eq!(engine.poll_count(&name), 3);
    }

    #[tokio::test]
    async fn test_unknown_execution_is_absent() {
        let engine = MockEngine::new();
        let info = engine.get_execution("nope", &EngineConfig::default()).await.unwrap();
        assert!(info.is_none());
    }

    #[tokio::test]
    async fn test_expectations_match_by_prefix_once() {
        let engine = MockEngine::new();
        engine.expect_submission("a-").returns_no_name().finish();
        let config = EngineConfig::default();
        assert!(engine.submit(&graph("b-"), &config).await.unwrap().is_some());
        assert!(engine.submit(&graph("a-"), &config).await.unwrap().is_none());
        assert!(engine.submit(&graph("a-"), &config).await.unwrap().is_some());
        assert_eq!(engine.submit_count(), 3);
    }

    #[tokio::test]
    async fn test_failing_delete() {
        let engine = MockEngine::new();
        engine.fail_deletes(true);
        assert!(engine.delete("wf", &EngineConfig::default()).await.is_err());
        assert_eq!(engine.delete_count(), 1);
    }
}
