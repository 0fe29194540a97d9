//! Operations exposed to the CLI
//!
//! Thin orchestration over the recipe loader, dataset resolution, the
//! publish-state protocol, the compiler and the lifecycle controller.

use crate::compiler::compile;
use crate::dataone::{resolve_recipe_inputs, DatasetResolver};
use crate::engine::argo::render_manifest;
use crate::engine::{EngineConfig, ExecutionPhase};
use crate::error::{ErrorCode, Result, RunnerError};
use crate::lifecycle::{LifecycleController, PollOptions};
use crate::publish::resolve_publish_state;
use crate::recipe::{Recipe, RECIPE_CONFIG_FILENAME};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

/// How a recipe is submitted
#[derive(Debug, Clone, Default)]
pub struct SubmitOptions {
    /// Block until the execution finishes
    pub wait: bool,
    /// Replace previously published output instead of refusing to run
    pub overwrite: bool,
    pub poll: PollOptions,
}

/// Outcome of validating every recipe under a directory
#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    pub valid: Vec<PathBuf>,
    pub invalid: Vec<(PathBuf, String)>,
}

impl ValidationReport {
    pub fn is_ok(&self) -> bool {
        self.invalid.is_empty()
    }
}

/// Load, resolve, check publish state, compile and submit a recipe
///
/// Returns the execution name. Fails with an already-published error,
/// without compiling, when output exists and `overwrite` is not set.
pub async fn submit_recipe(
    recipe_dir: &Path,
    options: &SubmitOptions,
    controller: &LifecycleController,
    resolver: Option<&dyn DatasetResolver>,
) -> Result<String> {
    let recipe = load_resolved(recipe_dir, resolver).await?;
    info!("Submitting recipe '{}' ({})", recipe.name(), recipe.id());

    if resolve_publish_state(&recipe, options.overwrite, controller, &options.poll).await? {
        return Err(RunnerError::already_published(recipe.id()));
    }

    let graph = compile(&recipe)?;
    let name = controller.submit(&graph).await?;

    if options.wait {
        controller.wait_for_completion(&name, &options.poll).await?;
        info!("Workflow {} succeeded", name);
    }
    Ok(name)
}

/// Current phase of an execution
pub async fn check_status(name: &str, controller: &LifecycleController) -> Result<ExecutionPhase> {
    controller.poll(name).await
}

/// Load a recipe and make sure it compiles
///
/// Recipes with dataset inputs are only loaded: compiling them needs the
/// network to resolve the datasets first.
pub fn validate_recipe(recipe_dir: &Path) -> Result<Recipe> {
    let recipe = Recipe::from_directory(recipe_dir)?;
    if recipe.input().has_datasets() {
        debug!(
            "Skipping compile check for {}: dataset inputs are unresolved",
            recipe.id()
        );
    } else {
        compile(&recipe)?;
    }
    Ok(recipe)
}

/// Directories directly under `root` that hold a recipe, sorted by path
pub fn find_recipe_dirs(root: &Path) -> Result<Vec<PathBuf>> {
    if !root.is_dir() {
        return Err(RunnerError::recipe_not_found(
            ErrorCode::RECIPE_DIR_NOT_FOUND,
            "Recipes directory not found",
            root.to_path_buf(),
        ));
    }

    let mut dirs = Vec::new();
    for entry in WalkDir::new(root)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        if entry.file_type().is_dir() && path.join(RECIPE_CONFIG_FILENAME).is_file() {
            dirs.push(path.to_path_buf());
        }
    }
    Ok(dirs)
}

/// Validate every recipe under `root`
pub fn validate_all(root: &Path) -> Result<ValidationReport> {
    let mut report = ValidationReport::default();
    for dir in find_recipe_dirs(root)? {
        match validate_recipe(&dir) {
            Ok(recipe) => {
                debug!("{} is valid ({})", dir.display(), recipe.id());
                report.valid.push(dir);
            }
            Err(e) => report.invalid.push((dir, e.to_string())),
        }
    }
    Ok(report)
}

/// Engine manifest a submission of this recipe would send
pub async fn render_recipe(
    recipe_dir: &Path,
    config: &EngineConfig,
    resolver: Option<&dyn DatasetResolver>,
) -> Result<serde_json::Value> {
    let recipe = load_resolved(recipe_dir, resolver).await?;
    let graph = compile(&recipe)?;
    Ok(render_manifest(&graph, config))
}

async fn load_resolved(
    recipe_dir: &Path,
    resolver: Option<&dyn DatasetResolver>,
) -> Result<Recipe> {
    let mut recipe = Recipe::from_directory(recipe_dir)?;
    if recipe.input().has_datasets() {
        let resolver = resolver.ok_or_else(|| {
            RunnerError::resolution(
                ErrorCode::RESOLUTION_UNRESOLVED,
                format!(
                    "recipe {} has dataone inputs but no dataset resolver is configured",
                    recipe.id()
                ),
            )
        })?;
        let context = format!("while resolving inputs of recipe {}", recipe.id());
        resolve_recipe_inputs(&mut recipe, resolver)
            .await
            .map_err(|e| e.with_context(context))?;
    }
    Ok(recipe)
}
