//! Final publish task, one template per output kind

use super::address::{scratch_dir, stage_output_glob, WORKFLOW_MOUNT};
use super::graph::{Artifact, ContainerSpec, Task, VolumeMount};
use super::{INPUT_DIR, INPUT_DIR_ARTIFACT, OUTPUT_DIR, OUTPUT_DIR_ARTIFACT};
use crate::error::{ErrorCode, Result, RunnerError};
use crate::recipe::{Recipe, RecipeOutput};

pub const PUBLISH_TASK: &str = "publish-data";
pub const PUBLISHED_ZIP_ARTIFACT: &str = "published-zip";

/// Where the publish task finds the data it publishes
#[derive(Debug, Clone, Copy)]
pub(crate) enum PublishSource<'a> {
    /// The `output-dir` artifact of a single task
    Artifact { from_task: &'a str },
    /// Every partition directory of the last command stage on the shared volume
    Partitions { last_command: usize },
}

pub(crate) fn publish_task(recipe: &Recipe, source: PublishSource<'_>) -> Result<Task> {
    let id = recipe.id();
    let publish = match recipe.output() {
        RecipeOutput::Pvc => format!("rsync --progress {}* {}", INPUT_DIR, OUTPUT_DIR),
        RecipeOutput::Temporary => format!(
            "mkdir -p {out} && cd {input} && zip -r {out}{id}.zip ./*",
            out = OUTPUT_DIR,
            input = INPUT_DIR,
            id = id
        ),
        RecipeOutput::DataOne => {
            return Err(RunnerError::validation_with_code(
                ErrorCode::RECIPE_UNSUPPORTED_OUTPUT,
                "publishing to DataONE is not supported yet",
                Some("output.type".to_string()),
            ));
        }
    };

    let mut task = match source {
        PublishSource::Artifact { from_task } => Task::new(
            PUBLISH_TASK,
            ContainerSpec::shell(publish)
                .input_artifact(Artifact::new(INPUT_DIR_ARTIFACT, INPUT_DIR)),
        )
        .consuming(from_task, OUTPUT_DIR_ARTIFACT, INPUT_DIR_ARTIFACT),
        PublishSource::Partitions { last_command } => {
            let gather = format!(
                "mkdir -p {input} && \
                 for d in {glob}; do [ -d \"$d\" ] && cp -r \"$d\"/. {input}; done",
                input = INPUT_DIR,
                glob = stage_output_glob(id, last_command),
            );
            Task::new(
                PUBLISH_TASK,
                ContainerSpec::shell(format!(
                    "{} && {} && rm -rf {}",
                    gather,
                    publish,
                    scratch_dir(id)
                ))
                    .volume_mount(VolumeMount::at(WORKFLOW_MOUNT)),
            )
        }
    };

    task.container = match recipe.output() {
        RecipeOutput::Temporary => task.container.output_artifact(
            Artifact::new(PUBLISHED_ZIP_ARTIFACT, format!("{}{}.zip", OUTPUT_DIR, id)).unarchived(),
        ),
        _ => task
            .container
            .volume_mount(VolumeMount::at(OUTPUT_DIR).with_sub_path(id)),
    };

    Ok(task)
}
