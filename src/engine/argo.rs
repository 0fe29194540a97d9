//! Argo Workflows client
//!
//! Renders a [`TaskGraph`] into an Argo `Workflow` manifest with a single DAG
//! entrypoint and one container template per task, and drives the Argo
//! server's REST API.

use super::{EngineConfig, ExecutionInfo, ExecutionPhase, WorkflowEngine};
use crate::compiler::{Artifact, Task, TaskGraph};
use crate::error::{ErrorCode, Result, RunnerError};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info};

const ENTRYPOINT: &str = "main";
const VOLUME_NAME: &str = "workflow-volume";
const ITEM_PARAMETER: &str = "item";
const ARCHIVE_LABEL: &str = "workflows.argoproj.io/archive-strategy";

/// HTTP client for an Argo server
pub struct ArgoEngine {
    client: Client,
}

impl ArgoEngine {
    pub fn new() -> Result<Self> {
        let client = Client::builder().build().map_err(|e| {
            RunnerError::config(format!("Failed to create HTTP client: {}", e)).with_source(e)
        })?;
        Ok(Self { client })
    }

    fn workflows_url(config: &EngineConfig) -> String {
        format!(
            "{}/api/v1/workflows/{}",
            config.base_url.trim_end_matches('/'),
            config.namespace
        )
    }
}

#[async_trait]
impl WorkflowEngine for ArgoEngine {
    async fn submit(&self, graph: &TaskGraph, config: &EngineConfig) -> Result<Option<String>> {
        let manifest = render_manifest(graph, config);
        debug!("Submitting workflow {}", graph.generate_name);

        let response = self
            .client
            .post(Self::workflows_url(config))
            .timeout(config.request_timeout)
            .json(&json!({ "workflow": manifest }))
            .send()
            .await
            .map_err(|e| {
                RunnerError::submission(
                    ErrorCode::ENGINE_SUBMISSION_FAILED,
                    format!("Problem with submitting workflow: {}", e),
                )
                .with_source(e)
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RunnerError::submission(
                ErrorCode::ENGINE_SUBMISSION_FAILED,
                format!("Engine rejected workflow ({}): {}", status, body),
            ));
        }

        let created: WorkflowResource = response.json().await.map_err(|e| {
            RunnerError::submission(
                ErrorCode::ENGINE_SUBMISSION_FAILED,
                format!("Unreadable submission response: {}", e),
            )
            .with_source(e)
        })?;

        if let Some(name) = &created.metadata.name {
            info!("Created workflow {}", name);
        }
        Ok(created.metadata.name)
    }

    async fn get_execution(
        &self,
        name: &str,
        config: &EngineConfig,
    ) -> Result<Option<ExecutionInfo>> {
        let response = self
            .client
            .get(format!("{}/{}", Self::workflows_url(config), name))
            .timeout(config.request_timeout)
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let resource: WorkflowResource = response.error_for_status()?.json().await?;
        Ok(Some(resource.into_info(name)))
    }

    async fn delete(&self, name: &str, config: &EngineConfig) -> Result<()> {
        let response = self
            .client
            .delete(format!("{}/{}", Self::workflows_url(config), name))
            .timeout(config.request_timeout)
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(());
        }
        response.error_for_status()?;
        Ok(())
    }
}

/// Pure: Argo `Workflow` manifest for `graph`
pub fn render_manifest(graph: &TaskGraph, config: &EngineConfig) -> Value {
    let mut labels: BTreeMap<String, String> = graph.labels.clone();
    if !config.archive_workflows {
        labels.insert(ARCHIVE_LABEL.to_string(), "false".to_string());
    }

    let dag_tasks: Vec<Value> = graph.tasks().map(dag_task).collect();
    let mut templates = vec![json!({
        "name": ENTRYPOINT,
        "dag": { "tasks": dag_tasks },
    })];
    templates.extend(graph.tasks().map(|task| task_template(task, config)));

    let mut spec = json!({
        "entrypoint": ENTRYPOINT,
        "serviceAccountName": config.service_account,
        "parallelism": config.max_parallelism,
        "templates": templates,
    });
    if graph.uses_workflow_volume {
        spec["volumes"] = json!([{
            "name": VOLUME_NAME,
            "persistentVolumeClaim": { "claimName": config.workflow_volume_claim },
        }]);
    }

    json!({
        "metadata": {
            "generateName": graph.generate_name,
            "namespace": config.namespace,
            "labels": labels,
        },
        "spec": spec,
    })
}

fn dag_task(task: &Task) -> Value {
    let mut value = json!({
        "name": task.name,
        "template": task.name,
    });
    if !task.dependencies.is_empty() {
        value["dependencies"] = json!(task.dependencies);
    }

    let mut arguments = Map::new();
    if let Some(dep) = &task.consumes {
        arguments.insert(
            "artifacts".to_string(),
            json!([{
                "name": dep.as_input,
                "from": format!(
                    "{{{{tasks.{}.outputs.artifacts.{}}}}}",
                    dep.from_task, dep.artifact
                ),
            }]),
        );
    }
    if let Some(fan_out) = &task.fan_out {
        arguments.insert(
            "parameters".to_string(),
            json!([{ "name": ITEM_PARAMETER, "value": "{{item}}" }]),
        );
        value["withParam"] = json!(format!("{{{{tasks.{}.outputs.result}}}}", fan_out.from_task));
    }
    if !arguments.is_empty() {
        value["arguments"] = Value::Object(arguments);
    }
    value
}

fn task_template(task: &Task, config: &EngineConfig) -> Value {
    let spec = &task.container;

    let mut env: Vec<Value> = spec
        .env
        .iter()
        .map(|(name, value)| json!({ "name": name, "value": value }))
        .collect();
    if let Some(fan_out) = &task.fan_out {
        env.push(json!({
            "name": fan_out.item_env,
            "value": format!("{{{{inputs.parameters.{}}}}}", ITEM_PARAMETER),
        }));
    }

    let mounts: Vec<Value> = spec
        .volume_mounts
        .iter()
        .map(|mount| {
            let mut value = json!({ "name": VOLUME_NAME, "mountPath": mount.mount_path });
            if let Some(sub_path) = &mount.sub_path {
                value["subPath"] = json!(sub_path);
            }
            value
        })
        .collect();

    let mut container = json!({
        "image": spec.image.as_deref().unwrap_or(&config.image),
        "imagePullPolicy": config.image_pull_policy,
        "command": spec.command,
        "args": spec.args,
    });
    if !env.is_empty() {
        container["env"] = json!(env);
    }
    if !mounts.is_empty() {
        container["volumeMounts"] = json!(mounts);
    }

    let mut template = json!({ "name": task.name, "container": container });

    let mut inputs = Map::new();
    if !spec.input_artifacts.is_empty() {
        inputs.insert(
            "artifacts".to_string(),
            json!(spec.input_artifacts.iter().map(input_artifact).collect::<Vec<_>>()),
        );
    }
    if task.fan_out.is_some() {
        inputs.insert("parameters".to_string(), json!([{ "name": ITEM_PARAMETER }]));
    }
    if !inputs.is_empty() {
        template["inputs"] = Value::Object(inputs);
    }

    let mut outputs = Map::new();
    if !spec.output_artifacts.is_empty() {
        outputs.insert(
            "artifacts".to_string(),
            json!(spec.output_artifacts.iter().map(output_artifact).collect::<Vec<_>>()),
        );
    }
    if !spec.output_parameters.is_empty() {
        let params: Vec<Value> = spec
            .output_parameters
            .iter()
            .map(|p| json!({ "name": p.name, "valueFrom": { "path": p.path } }))
            .collect();
        outputs.insert("parameters".to_string(), json!(params));
    }
    if !outputs.is_empty() {
        template["outputs"] = Value::Object(outputs);
    }

    template
}

fn input_artifact(artifact: &Artifact) -> Value {
    let mut value = json!({ "name": artifact.name, "path": artifact.path });
    if let Some(url) = &artifact.http_url {
        value["http"] = json!({ "url": url });
    }
    value
}

fn output_artifact(artifact: &Artifact) -> Value {
    let mut value = json!({ "name": artifact.name, "path": artifact.path });
    if !artifact.archive {
        value["archive"] = json!({ "none": {} });
    }
    value
}

#[derive(Debug, Deserialize)]
struct WorkflowResource {
    #[serde(default)]
    metadata: ResourceMetadata,
    #[serde(default)]
    status: Option<WorkflowStatus>,
}

#[derive(Debug, Default, Deserialize)]
struct ResourceMetadata {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WorkflowStatus {
    phase: Option<String>,
    #[serde(default)]
    nodes: HashMap<String, NodeStatus>,
}

#[derive(Debug, Deserialize)]
struct NodeStatus {
    #[serde(rename = "displayName")]
    display_name: Option<String>,
    outputs: Option<NodeOutputs>,
}

#[derive(Debug, Deserialize)]
struct NodeOutputs {
    #[serde(default)]
    parameters: Vec<NodeParameter>,
}

#[derive(Debug, Deserialize)]
struct NodeParameter {
    name: String,
    value: Option<String>,
}

impl WorkflowResource {
    fn into_info(self, requested_name: &str) -> ExecutionInfo {
        let name = self
            .metadata
            .name
            .unwrap_or_else(|| requested_name.to_string());
        let Some(status) = self.status else {
            return ExecutionInfo {
                name,
                ..ExecutionInfo::default()
            };
        };

        let mut outputs: BTreeMap<String, BTreeMap<String, String>> = BTreeMap::new();
        for node in status.nodes.into_values() {
            let (Some(task), Some(node_outputs)) = (node.display_name, node.outputs) else {
                continue;
            };
            let params = outputs.entry(task).or_default();
            for param in node_outputs.parameters {
                if let Some(value) = param.value {
                    params.insert(param.name, value);
                }
            }
        }

        ExecutionInfo {
            name,
            phase: status.phase.map(ExecutionPhase::from),
            outputs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::{ContainerSpec, StageKind, TaskGraphBuilder, VolumeMount};

    fn sample_graph() -> TaskGraph {
        let mut builder =
            TaskGraphBuilder::new("demo-shell-").label("recipe-runner/recipe-id", "demo");
        builder
            .append_stage(
                "fetch",
                StageKind::Fetch,
                vec![Task::new(
                    "fetch-inputs",
                    ContainerSpec::shell("mkdir -p /output_dir/")
                        .output_artifact(Artifact::new("output-dir", "/output_dir/")),
                )],
            )
            .append_stage(
                "step-0",
                StageKind::Process(0),
                vec![Task::new(
                    "step-0",
                    ContainerSpec::shell("echo hi")
                        .image(Some("custom:1"))
                        .input_artifact(Artifact::new("input-dir", "/input_dir/")),
                )
                .consuming("fetch-inputs", "output-dir", "input-dir")],
            )
            .append_stage(
                "publish",
                StageKind::Publish,
                vec![Task::new(
                    "publish-data",
                    ContainerSpec::shell("true")
                        .volume_mount(VolumeMount::at("/output_dir/").with_sub_path("demo"))
                        .output_artifact(
                            Artifact::new("published-zip", "/output_dir/demo.zip").unarchived(),
                        ),
                )],
            );
        builder.build()
    }

    #[test]
    fn test_manifest_spec() {
        let manifest = render_manifest(&sample_graph(), &EngineConfig::default());
        assert_eq!(manifest["metadata"]["generateName"], "demo-shell-");
        assert_eq!(manifest["metadata"]["labels"]["recipe-runner/recipe-id"], "demo");
        assert_eq!(manifest["spec"]["entrypoint"], "main");
        assert_eq!(manifest["spec"]["serviceAccountName"], "argo-workflow");
        assert_eq!(manifest["spec"]["parallelism"], 5);
        assert_eq!(
            manifest["spec"]["volumes"][0]["persistentVolumeClaim"]["claimName"],
            "ogdc-workflow-pvc"
        );
        // dag + one template per task
        assert_eq!(manifest["spec"]["templates"].as_array().unwrap().len(), 4);
    }

    #[test]
    fn test_dag_wires_artifacts_and_dependencies() {
        let manifest = render_manifest(&sample_graph(), &EngineConfig::default());
        let tasks = &manifest["spec"]["templates"][0]["dag"]["tasks"];
        assert!(tasks[0].get("dependencies").is_none());
        assert_eq!(tasks[1]["dependencies"], json!(["fetch-inputs"]));
        assert_eq!(
            tasks[1]["arguments"]["artifacts"][0]["from"],
            "{{tasks.fetch-inputs.outputs.artifacts.output-dir}}"
        );
    }

    #[test]
    fn test_templates_carry_images_and_mounts() {
        let config = EngineConfig::default();
        let manifest = render_manifest(&sample_graph(), &config);
        let templates = &manifest["spec"]["templates"];
        assert_eq!(templates[1]["container"]["image"], "ogdc-runner");
        assert_eq!(templates[1]["container"]["imagePullPolicy"], "Never");
        assert_eq!(templates[2]["container"]["image"], "custom:1");
        assert_eq!(templates[3]["container"]["volumeMounts"][0]["subPath"], "demo");
        assert_eq!(templates[3]["outputs"]["artifacts"][0]["archive"], json!({ "none": {} }));
    }

    #[test]
    fn test_fan_out_renders_with_param() {
        let mut builder = TaskGraphBuilder::new("viz-");
        builder
            .append_stage(
                "prepare",
                StageKind::Auxiliary,
                vec![Task::new("batching", ContainerSpec::shell("true"))],
            )
            .append_stage(
                "tiling",
                StageKind::Process(0),
                vec![Task::new("tiling", ContainerSpec::shell("true"))
                    .fan_out_over("batching", "CHUNK_FILEPATH")],
            );
        let manifest = render_manifest(&builder.build(), &EngineConfig::default());
        let dag_task = &manifest["spec"]["templates"][0]["dag"]["tasks"][1];
        assert_eq!(dag_task["withParam"], "{{tasks.batching.outputs.result}}");
        assert_eq!(dag_task["arguments"]["parameters"][0]["value"], "{{item}}");
        let env = &manifest["spec"]["templates"][2]["container"]["env"][0];
        assert_eq!(env["name"], "CHUNK_FILEPATH");
        assert_eq!(env["value"], "{{inputs.parameters.item}}");
        assert!(manifest["spec"].get("volumes").is_none());
    }

    #[test]
    fn test_archive_opt_out_label() {
        let config = EngineConfig {
            archive_workflows: false,
            ..EngineConfig::default()
        };
        let manifest = render_manifest(&sample_graph(), &config);
        assert_eq!(manifest["metadata"]["labels"][ARCHIVE_LABEL], "false");
    }

    #[test]
    fn test_status_response_parsing() {
        let body = json!({
            "metadata": { "name": "demo-check-published-x7k2p" },
            "status": {
                "phase": "Succeeded",
                "nodes": {
                    "demo-check-published-x7k2p": { "displayName": "demo-check-published-x7k2p" },
                    "demo-check-published-x7k2p-123": {
                        "displayName": "check-already-published",
                        "outputs": { "parameters": [{ "name": "data-published", "value": "yes" }] }
                    }
                }
            }
        });
        let resource: WorkflowResource = serde_json::from_value(body).unwrap();
        let info = resource.into_info("ignored");
        assert_eq!(info.name, "demo-check-published-x7k2p");
        assert_eq!(info.phase(), ExecutionPhase::Succeeded);
        assert_eq!(info.output("check-already-published", "data-published"), Some("yes"));
    }

    #[test]
    fn test_status_without_phase_is_unknown() {
        let resource: WorkflowResource =
            serde_json::from_value(json!({ "metadata": { "name": "wf" } })).unwrap();
        let info = resource.into_info("wf");
        assert!(matches!(info.phase(), ExecutionPhase::Unknown(_)));
    }
}
