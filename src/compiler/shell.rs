//! Shell workflow compilation, sequential and partitioned

use super::address::{inputs_dir, scratch_dir, PartitionAddress, WORKFLOW_MOUNT};
use super::fetch::{
    ensure_unique_filenames, fetch_command, shell_quote, FetchItem, FetchNaming,
};
use super::graph::{Artifact, ContainerSpec, StageKind, Task, TaskGraph, VolumeMount};
use super::publish_stage::{publish_task, PublishSource};
use super::{
    graph_builder, FETCH_TASK, INPUT_DIR, INPUT_DIR_ARTIFACT, OUTPUT_DIR, OUTPUT_DIR_ARTIFACT,
};
use crate::error::{ErrorCode, Result, RunnerError};
use crate::partition::{partition, FilePartition};
use crate::recipe::{Recipe, ShellWorkflow};
use std::collections::HashMap;

/// One fetch task, one task per command, one publish task
///
/// Each command consumes the `output-dir` artifact of the task before it.
pub(crate) fn compile_sequential(
    recipe: &Recipe,
    shell: &ShellWorkflow,
    items: &[FetchItem],
) -> Result<TaskGraph> {
    let mut builder = graph_builder(recipe, "shell");

    let fetch = Task::new(
        FETCH_TASK,
        ContainerSpec::shell(fetch_command(items, OUTPUT_DIR, FetchNaming::Server))
            .output_artifact(Artifact::new(OUTPUT_DIR_ARTIFACT, OUTPUT_DIR)),
    );
    builder.append_stage("fetch", StageKind::Fetch, vec![fetch]);

    let mut previous = FETCH_TASK.to_string();
    for (idx, command) in shell.commands.iter().enumerate() {
        let name = format!("step-{}", idx);
        let container = ContainerSpec::shell(format!("mkdir -p {} && {}", OUTPUT_DIR, command))
            .image(recipe.image())
            .env("INPUT_DIR", INPUT_DIR)
            .env("OUTPUT_DIR", OUTPUT_DIR)
            .input_artifact(Artifact::new(INPUT_DIR_ARTIFACT, INPUT_DIR))
            .output_artifact(Artifact::new(OUTPUT_DIR_ARTIFACT, OUTPUT_DIR));
        let task = Task::new(name.clone(), container).consuming(
            &previous,
            OUTPUT_DIR_ARTIFACT,
            INPUT_DIR_ARTIFACT,
        );
        builder.append_stage(&name, StageKind::Process(idx), vec![task]);
        previous = name;
    }

    let publish = publish_task(recipe, PublishSource::Artifact { from_task: &previous })?;
    builder.append_stage("publish", StageKind::Publish, vec![publish]);

    Ok(builder.build())
}

/// Fetch onto the shared volume, then one stage per command with one task
/// per partition, then a publish task that gathers the last stage
pub(crate) fn compile_parallel(
    recipe: &Recipe,
    shell: &ShellWorkflow,
    items: &[FetchItem],
) -> Result<TaskGraph> {
    ensure_unique_filenames(items)?;

    let id = recipe.id();
    let staging_dir = inputs_dir(id);
    let mut builder = graph_builder(recipe, "shell");

    // leftovers of an earlier run would be gathered by the publish task
    let fetch = Task::new(
        FETCH_TASK,
        ContainerSpec::shell(format!(
            "rm -rf {} && {}",
            scratch_dir(id),
            fetch_command(items, &staging_dir, FetchNaming::Pinned)
        ))
            .volume_mount(VolumeMount::at(WORKFLOW_MOUNT)),
    );
    builder.append_stage("fetch", StageKind::Fetch, vec![fetch]);

    let sources: Vec<String> = items.iter().map(|item| item.source().to_string()).collect();
    let by_source: HashMap<&str, &FetchItem> =
        items.iter().map(|item| (item.source(), item)).collect();
    let size = shell.parallel.effective_partition_size() as i64;

    for (command_index, command) in shell.commands.iter().enumerate() {
        let stage_name = format!("cmd-{}", command_index);
        let partitions = partition(&sources, size, &stage_name)?;

        let tasks = partitions
            .iter()
            .map(|part| {
                let address = PartitionAddress::new(id, command_index, part.partition_id);
                partition_task(recipe, &address, part, &by_source, &staging_dir, command)
            })
            .collect::<Result<Vec<_>>>()?;

        builder.append_stage(&stage_name, StageKind::Process(command_index), tasks);
    }

    let last_command = shell.commands.len().saturating_sub(1);
    let publish = publish_task(recipe, PublishSource::Partitions { last_command })?;
    builder.append_stage("publish", StageKind::Publish, vec![publish]);

    Ok(builder.build())
}

fn partition_task(
    recipe: &Recipe,
    address: &PartitionAddress,
    part: &FilePartition,
    by_source: &HashMap<&str, &FetchItem>,
    staging_dir: &str,
    command: &str,
) -> Result<Task> {
    let files = part
        .files
        .iter()
        .map(|source| {
            by_source.get(source.as_str()).copied().ok_or_else(|| {
                RunnerError::validation_with_code(
                    ErrorCode::COMPILE_EMPTY_PARTITION_INPUT,
                    format!("partition file {} has no fetch entry", source),
                    None,
                )
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let manifest: Vec<&str> = files.iter().map(|item| item.filename()).collect();
    let script = partition_script(address, &files, staging_dir, command);

    let container = ContainerSpec::shell(script)
        .image(recipe.image())
        .env("RECIPE_ID", address.recipe_id.as_str())
        .env("CMD_INDEX", address.command_index.to_string())
        .env("PARTITION_ID", address.partition_id.to_string())
        .env("INPUT_DIR", address.input_dir())
        .env("OUTPUT_DIR", address.output_dir())
        .env("PARTITION_FILES", manifest.join("\n"))
        .volume_mount(VolumeMount::at(WORKFLOW_MOUNT));

    Ok(Task::new(address.task_name(), container))
}

/// Pure: Script running `command` once per file of a partition
///
/// The first command reads the partition's own files from the staging area.
/// Later commands read whatever the previous command left in this
/// partition's directory.
pub fn partition_script(
    address: &PartitionAddress,
    files: &[&FetchItem],
    staging_dir: &str,
    command: &str,
) -> String {
    let mut lines = vec!["set -e".to_string(), "mkdir -p \"$OUTPUT_DIR\"".to_string()];

    if address.command_index == 0 {
        for item in files {
            lines.push(format!(
                "export INPUT_FILE={}",
                shell_quote(&item.input_path(staging_dir))
            ));
            lines.push(format!(
                "export OUTPUT_FILE=\"$OUTPUT_DIR\"/{}",
                shell_quote(item.filename())
            ));
            lines.push(command.to_string());
        }
    } else {
        lines.push(
            "[ -d \"$INPUT_DIR\" ] || \
             { echo \"ERROR: Input directory does not exist: $INPUT_DIR\"; exit 1; }"
                .to_string(),
        );
        lines.push("for INPUT_FILE in \"$INPUT_DIR\"/*; do".to_string());
        lines.push("  [ -f \"$INPUT_FILE\" ] || continue".to_string());
        lines.push("  export INPUT_FILE".to_string());
        lines.push("  export OUTPUT_FILE=\"$OUTPUT_DIR/$(basename \"$INPUT_FILE\")\"".to_string());
        lines.push(format!("  {}", command));
        lines.push("done".to_string());
    }

    lines.join("\n")
}
