//! Task graph produced by the compiler
//!
//! A graph is an ordered list of stages. Every task in a stage depends on
//! every task of the stage before it, and stages are only ever appended, so
//! a graph built through [`TaskGraphBuilder`] cannot contain a cycle.

use std::collections::BTreeMap;

/// Volume mount of the shared workflow volume
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeMount {
    pub mount_path: String,
    pub sub_path: Option<String>,
}

impl VolumeMount {
    pub fn at(mount_path: impl Into<String>) -> Self {
        Self {
            mount_path: mount_path.into(),
            sub_path: None,
        }
    }

    pub fn with_sub_path(mut self, sub_path: impl Into<String>) -> Self {
        self.sub_path = Some(sub_path.into());
        self
    }
}

/// A named directory or file handed between tasks by the engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub name: String,
    pub path: String,
    /// Fetch the artifact from this URL instead of a prior task
    pub http_url: Option<String>,
    /// Whether the engine should compress the artifact when storing it
    pub archive: bool,
}

impl Artifact {
    pub fn new(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            http_url: None,
            archive: true,
        }
    }

    pub fn from_url(mut self, url: impl Into<String>) -> Self {
        self.http_url = Some(url.into());
        self
    }

    pub fn unarchived(mut self) -> Self {
        self.archive = false;
        self
    }
}

/// A scalar a task writes to a file and the engine reports back
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputParameter {
    pub name: String,
    pub path: String,
}

/// What a task runs
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ContainerSpec {
    /// Image override; the engine's default image is used when unset
    pub image: Option<String>,
    pub command: Vec<String>,
    pub args: Vec<String>,
    pub env: BTreeMap<String, String>,
    pub input_artifacts: Vec<Artifact>,
    pub output_artifacts: Vec<Artifact>,
    pub output_parameters: Vec<OutputParameter>,
    pub volume_mounts: Vec<VolumeMount>,
}

impl ContainerSpec {
    /// `sh -c <script>`
    pub fn shell(script: impl Into<String>) -> Self {
        Self {
            command: vec!["sh".to_string(), "-c".to_string()],
            args: vec![script.into()],
            ..Self::default()
        }
    }

    pub fn image(mut self, image: Option<&str>) -> Self {
        self.image = image.map(str::to_string);
        self
    }

    pub fn env(mut self, key: &str, value: impl Into<String>) -> Self {
        self.env.insert(key.to_string(), value.into());
        self
    }

    pub fn input_artifact(mut self, artifact: Artifact) -> Self {
        self.input_artifacts.push(artifact);
        self
    }

    pub fn output_artifact(mut self, artifact: Artifact) -> Self {
        self.output_artifacts.push(artifact);
        self
    }

    pub fn output_parameter(mut self, name: &str, path: &str) -> Self {
        self.output_parameters.push(OutputParameter {
            name: name.to_string(),
            path: path.to_string(),
        });
        self
    }

    pub fn volume_mount(mut self, mount: VolumeMount) -> Self {
        self.volume_mounts.push(mount);
        self
    }

    /// The script passed to `sh -c`, if this is a shell container
    pub fn script(&self) -> Option<&str> {
        match self.command.as_slice() {
            [sh, flag] if sh == "sh" && flag == "-c" => self.args.first().map(String::as_str),
            _ => None,
        }
    }
}

/// "Consume the named output artifact of `from_task` as my input `as_input`"
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataDependency {
    pub from_task: String,
    pub artifact: String,
    pub as_input: String,
}

/// Run a task once per element of a JSON list another task printed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FanOut {
    pub from_task: String,
    /// Env var receiving the current element
    pub item_env: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    pub name: String,
    pub container: ContainerSpec,
    /// Filled in by the builder from the previous stage
    pub dependencies: Vec<String>,
    pub consumes: Option<DataDependency>,
    pub fan_out: Option<FanOut>,
}

impl Task {
    pub fn new(name: impl Into<String>, container: ContainerSpec) -> Self {
        Self {
            name: name.into(),
            container,
            dependencies: Vec::new(),
            consumes: None,
            fan_out: None,
        }
    }

    pub fn consuming(mut self, from_task: &str, artifact: &str, as_input: &str) -> Self {
        self.consumes = Some(DataDependency {
            from_task: from_task.to_string(),
            artifact: artifact.to_string(),
            as_input: as_input.to_string(),
        });
        self
    }

    pub fn fan_out_over(mut self, from_task: &str, item_env: &str) -> Self {
        self.fan_out = Some(FanOut {
            from_task: from_task.to_string(),
            item_env: item_env.to_string(),
        });
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageKind {
    Fetch,
    /// Processing stage; for shell workflows the index of the command it runs
    Process(usize),
    Publish,
    /// Setup, check or cleanup work outside the fetch/process/publish pipeline
    Auxiliary,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stage {
    pub name: String,
    pub kind: StageKind,
    pub tasks: Vec<Task>,
}

/// Compiled, engine-independent description of a workflow
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskGraph {
    /// Prefix the engine extends into a unique execution name
    pub generate_name: String,
    pub stages: Vec<Stage>,
    pub labels: BTreeMap<String, String>,
    /// Whether any task mounts the shared workflow volume
    pub uses_workflow_volume: bool,
}

impl TaskGraph {
    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.stages.iter().flat_map(|stage| stage.tasks.iter())
    }

    pub fn task(&self, name: &str) -> Option<&Task> {
        self.tasks().find(|task| task.name == name)
    }

    pub fn task_count(&self) -> usize {
        self.stages.iter().map(|stage| stage.tasks.len()).sum()
    }

    pub fn process_stages(&self) -> impl Iterator<Item = &Stage> {
        self.stages
            .iter()
            .filter(|stage| matches!(stage.kind, StageKind::Process(_)))
    }
}

/// Appends stages in pipeline order
#[derive(Debug)]
pub struct TaskGraphBuilder {
    graph: TaskGraph,
}

impl TaskGraphBuilder {
    pub fn new(generate_name: impl Into<String>) -> Self {
        Self {
            graph: TaskGraph {
                generate_name: generate_name.into(),
                stages: Vec::new(),
                labels: BTreeMap::new(),
                uses_workflow_volume: false,
            },
        }
    }

    pub fn label(mut self, key: &str, value: &str) -> Self {
        self.graph.labels.insert(key.to_string(), value.to_string());
        self
    }

    /// Append a stage whose tasks all depend on every task of the last stage
    pub fn append_stage(&mut self, name: &str, kind: StageKind, mut tasks: Vec<Task>) -> &mut Self {
        let predecessors: Vec<String> = self
            .graph
            .stages
            .last()
            .map(|stage| stage.tasks.iter().map(|t| t.name.clone()).collect())
            .unwrap_or_default();

        for task in tasks.iter_mut() {
            task.dependencies = predecessors.clone();
            if !task.container.volume_mounts.is_empty() {
                self.graph.uses_workflow_volume = true;
            }
        }

        self.graph.stages.push(Stage {
            name: name.to_string(),
            kind,
            tasks,
        });
        self
    }

    /// Name of the single task in the last stage, if it has exactly one
    pub fn last_task_name(&self) -> Option<&str> {
        match self.graph.stages.last().map(|s| s.tasks.as_slice()) {
            Some([only]) => Some(only.name.as_str()),
            _ => None,
        }
    }

    pub fn build(self) -> TaskGraph {
        self.graph
    }
}
