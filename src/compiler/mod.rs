//! Recipe to task graph compilation
//!
//! Compilation is pure: it reads a loaded recipe and produces an
//! engine-independent [`TaskGraph`]. Every failure (unsupported inputs,
//! unresolved datasets, unsupported outputs) surfaces before a graph exists,
//! so nothing half-built ever reaches the engine.

pub mod address;
pub mod fetch;
pub mod graph;
pub mod publish_stage;
pub mod shell;
pub mod viz;

pub use address::PartitionAddress;
pub use graph::{
    Artifact, ContainerSpec, DataDependency, FanOut, OutputParameter, Stage, StageKind, Task,
    TaskGraph, TaskGraphBuilder, VolumeMount,
};

use crate::error::Result;
use crate::recipe::{Recipe, Workflow};
use tracing::debug;

/// Where a sequential task receives its input directory
pub const INPUT_DIR: &str = "/input_dir/";
/// Where a sequential task writes its output directory
pub const OUTPUT_DIR: &str = "/output_dir/";
pub const INPUT_DIR_ARTIFACT: &str = "input-dir";
pub const OUTPUT_DIR_ARTIFACT: &str = "output-dir";

pub const FETCH_TASK: &str = "fetch-inputs";

/// Label carrying the recipe id on every submitted execution
pub const RECIPE_ID_LABEL: &str = "recipe-runner/recipe-id";

/// Compile a loaded recipe into a task graph
pub fn compile(recipe: &Recipe) -> Result<TaskGraph> {
    // every input kind is checked here, whichever workflow uses them
    let items = fetch::fetch_items(recipe.input())?;
    let graph = match recipe.workflow() {
        Workflow::Shell(shell) => {
            if shell.parallel.enabled {
                shell::compile_parallel(recipe, shell, &items)?
            } else {
                shell::compile_sequential(recipe, shell, &items)?
            }
        }
        Workflow::Visualization(viz) => viz::compile_viz(recipe, viz)?,
    };

    debug!(
        "Compiled recipe {} into {} stages / {} tasks",
        recipe.id(),
        graph.stages.len(),
        graph.task_count()
    );
    Ok(graph)
}

fn graph_builder(recipe: &Recipe, kind: &str) -> TaskGraphBuilder {
    TaskGraphBuilder::new(format!("{}-{}-", recipe.id(), kind))
        .label(RECIPE_ID_LABEL, recipe.id())
}
