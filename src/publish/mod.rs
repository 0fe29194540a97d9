//! Publish-state protocol
//!
//! Decides whether a recipe's output already exists before a new run is
//! compiled. The shared volume is only reachable from inside the engine, so
//! both the existence check and the clear run as short executions of their
//! own, which are deleted once their result has been read.

use crate::compiler::{
    ContainerSpec, StageKind, Task, TaskGraph, TaskGraphBuilder, VolumeMount, RECIPE_ID_LABEL,
};
use crate::error::{ErrorCode, Result, RunnerError};
use crate::lifecycle::{LifecycleController, PollOptions};
use crate::recipe::Recipe;
use tracing::{info, warn};

pub const CHECK_TASK: &str = "check-already-published";
pub const CLEAR_TASK: &str = "remove-existing-data";
pub const PUBLISHED_PARAMETER: &str = "data-published";

/// Where the whole shared volume is mounted by check and clear tasks
const VOLUME_ROOT: &str = "/mnt/";
const RESULT_FILE: &str = "/tmp/published.txt";

/// Pure: Execution that reports whether `recipe_id` has published data
pub fn check_graph(recipe_id: &str) -> TaskGraph {
    let script = format!(
        "test -d {root}{id} && echo \"yes\" > {out} || echo \"no\" > {out}",
        root = VOLUME_ROOT,
        id = recipe_id,
        out = RESULT_FILE
    );
    single_task_graph(
        recipe_id,
        "-check-published-",
        Task::new(
            CHECK_TASK,
            ContainerSpec::shell(script)
                .output_parameter(PUBLISHED_PARAMETER, RESULT_FILE)
                .volume_mount(VolumeMount::at(VOLUME_ROOT)),
        ),
    )
}

/// Pure: Execution that removes everything published for `recipe_id`
pub fn clear_graph(recipe_id: &str) -> TaskGraph {
    single_task_graph(
        recipe_id,
        "-remove-existing-data-",
        Task::new(
            CLEAR_TASK,
            ContainerSpec::shell(format!("rm -rf {}{}", VOLUME_ROOT, recipe_id))
                .volume_mount(VolumeMount::at(VOLUME_ROOT)),
        ),
    )
}

fn single_task_graph(recipe_id: &str, suffix: &str, task: Task) -> TaskGraph {
    let mut builder = TaskGraphBuilder::new(format!("{}{}", recipe_id, suffix))
        .label(RECIPE_ID_LABEL, recipe_id);
    builder.append_stage(&task.name.clone(), StageKind::Auxiliary, vec![task]);
    builder.build()
}

/// Returns `true` when the recipe's output already exists
///
/// With `overwrite` any existing output is removed first, whatever the
/// output kind, and the answer is always `false`. Otherwise outputs with no
/// location to query are never reported as published.
pub async fn resolve_publish_state(
    recipe: &Recipe,
    overwrite: bool,
    controller: &LifecycleController,
    poll: &PollOptions,
) -> Result<bool> {
    if overwrite {
        remove_existing_data(recipe.id(), controller, poll).await?;
        return Ok(false);
    }

    if !recipe.output().is_queryable() {
        warn!(
            "Assuming {} data are not published for recipe {}; skipping check",
            recipe.output().as_str(),
            recipe.id()
        );
        return Ok(false);
    }

    data_already_published(recipe.id(), controller, poll).await
}

/// Run the check execution for `recipe_id` and read its answer
pub async fn data_already_published(
    recipe_id: &str,
    controller: &LifecycleController,
    poll: &PollOptions,
) -> Result<bool> {
    let info = controller.run_to_completion(&check_graph(recipe_id), poll).await?;
    let answer = info.output(CHECK_TASK, PUBLISHED_PARAMETER).map(str::trim);
    let published = match answer {
        Some("yes") => true,
        Some("no") => false,
        other => {
            let err = RunnerError::execution(
                ErrorCode::ENGINE_MISSING_OUTPUT,
                format!(
                    "Failed to determine publication status for {}: {} output was {:?}",
                    recipe_id, PUBLISHED_PARAMETER, other
                ),
                Some(info.name.clone()),
            );
            controller.delete_best_effort(&info.name).await;
            return Err(err);
        }
    };
    controller.delete_best_effort(&info.name).await;

    info!(
        "Recipe {} {} published data",
        recipe_id,
        if published { "has" } else { "has no" }
    );
    Ok(published)
}

/// Run the clear execution for `recipe_id`
pub async fn remove_existing_data(
    recipe_id: &str,
    controller: &LifecycleController,
    poll: &PollOptions,
) -> Result<()> {
    info!("Removing existing published data for {}", recipe_id);
    let info = controller.run_to_completion(&clear_graph(recipe_id), poll).await?;
    controller.delete_best_effort(&info.name).await;
    Ok(())
}
