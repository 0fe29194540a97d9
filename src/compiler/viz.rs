//! Visualization workflow compilation
//!
//! Stages the visualization config and splits the input into chunks in
//! parallel, then tiles every chunk in its own task. Everything is written
//! under the recipe's directory on the shared volume, which is also where
//! published data lives, so there is no separate publish stage.

use super::address::WORKFLOW_MOUNT;
use super::graph::{Artifact, ContainerSpec, StageKind, Task, TaskGraph, VolumeMount};
use super::graph_builder;
use crate::error::{ErrorCode, Result, RunnerError};
use crate::recipe::{InputKind, Recipe, RecipeOutput, VizWorkflow};

pub const VIZ_IMAGE: &str = "ghcr.io/rushirajnenuji/viz-staging:latest";
pub const CONFIG_IMAGE: &str = "alpine:latest";

pub const STAGE_CONFIG_TASK: &str = "stage-viz-config";
pub const BATCHING_TASK: &str = "batching";
pub const TILING_TASK: &str = "tiling";

const BATCH_SCRIPT: &str = r#"import json
import os
import sys
from pathlib import Path

import geopandas as gpd

gdf = gpd.read_file(os.environ["INPUT_PATH"])
size = int(os.environ["BATCH_SIZE"])
out = Path(os.environ["BATCH_DIR"])
out.mkdir(parents=True, exist_ok=True)

chunks = []
for idx, start in enumerate(range(0, len(gdf), size)):
    path = out / f"chunk-{idx}.gpkg"
    print(f"Writing chunk {idx} to {path}", file=sys.stderr)
    gdf[start:start + size].to_file(filename=path, driver="GPKG")
    chunks.append(str(path))

print(json.dumps(chunks))
"#;

const TILING_SCRIPT: &str = r#"import json
import os
import sys
from pathlib import Path

from pdgstaging import TileStager

config = json.loads(Path(os.environ["CONFIG_PATH"]).read_text())
chunk = os.environ["CHUNK_FILEPATH"]
print(f"Staging {chunk}", file=sys.stderr)
TileStager(config, check_footprints=False).stage(chunk)
print("Staging done", file=sys.stderr)
"#;

pub(crate) fn compile_viz(recipe: &Recipe, viz: &VizWorkflow) -> Result<TaskGraph> {
    if recipe.output() != RecipeOutput::Pvc {
        return Err(RunnerError::validation_with_code(
            ErrorCode::RECIPE_UNSUPPORTED_OUTPUT,
            format!(
                "visualization workflows require pvc output, got {}",
                recipe.output().as_str()
            ),
            Some("output.type".to_string()),
        ));
    }

    // validated non-empty at load
    let Some(input) = recipe.input().params.first() else {
        return Err(RunnerError::validation_with_code(
            ErrorCode::RECIPE_EMPTY_INPUT,
            "visualization workflows need an input",
            Some("input.params".to_string()),
        ));
    };
    if input.kind != InputKind::Url {
        return Err(RunnerError::unsupported_input(
            input.kind.to_string(),
            input.value.as_str(),
        ));
    }

    let root = format!("{}/{}", WORKFLOW_MOUNT, recipe.id());
    let image = recipe.image().unwrap_or(VIZ_IMAGE);

    let stage_config = Task::new(
        STAGE_CONFIG_TASK,
        ContainerSpec::shell(stage_config_script(&root, &viz.config_json))
            .image(Some(CONFIG_IMAGE))
            .volume_mount(VolumeMount::at(WORKFLOW_MOUNT)),
    );

    let input_path = format!("{}/input/input.gpkg", root);
    let batch_dir = format!("{}/batch", root);
    let batching = Task::new(
        BATCHING_TASK,
        python(BATCH_SCRIPT, image)
            .env("INPUT_PATH", input_path.as_str())
            .env("BATCH_DIR", batch_dir.as_str())
            .env("BATCH_SIZE", viz.batch_size.to_string())
            .input_artifact(
                Artifact::new("batch-input", input_path.as_str()).from_url(input.value.as_str()),
            )
            .output_artifact(Artifact::new("batch-output", batch_dir.as_str())),
    );

    let tiling = Task::new(
        TILING_TASK,
        python(TILING_SCRIPT, image).env("CONFIG_PATH", format!("{}/config.json", root)),
    )
    .fan_out_over(BATCHING_TASK, "CHUNK_FILEPATH");

    let mut builder = graph_builder(recipe, "visualization");
    builder
        .append_stage("prepare", StageKind::Auxiliary, vec![stage_config, batching])
        .append_stage(TILING_TASK, StageKind::Process(0), vec![tiling]);
    Ok(builder.build())
}

fn python(script: &str, image: &str) -> ContainerSpec {
    ContainerSpec {
        command: vec!["python".to_string(), "-c".to_string()],
        args: vec![script.to_string()],
        ..ContainerSpec::default()
    }
    .image(Some(image))
    .volume_mount(VolumeMount::at(WORKFLOW_MOUNT))
}

/// Pure: Create the recipe's directories and write its config
pub fn stage_config_script(root: &str, config_json: &str) -> String {
    let dirs = ["input", "batch", "output/staged", "output/geotiff", "output/3dtiles"]
        .iter()
        .map(|sub| format!("mkdir -p {}/{}", root, sub))
        .collect::<Vec<_>>()
        .join(" && \\\n");
    format!(
        "{} && \\\ncat > {}/config.json << 'EOF'\n{}\nEOF",
        dirs, root, config_json
    )
}
