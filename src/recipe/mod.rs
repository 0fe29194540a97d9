//! Recipe data model
//!
//! A recipe is a directory holding a `meta.yml` configuration plus the files
//! it references (a shell script or a visualization config). Loading parses
//! the configuration against a closed schema, checks the referenced files and
//! derives the recipe id used to namespace everything the recipe produces.

pub mod input;
pub mod output;
pub mod workflow;

pub use input::{InputKind, InputParam, RecipeInput};
pub use output::RecipeOutput;
pub use workflow::{
    ParallelConfig, PartitionStrategy, ShellWorkflow, VizWorkflow, Workflow, WorkflowConfig,
};

use crate::error::{ErrorCode, Result, RunnerError};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Name of the configuration file inside a recipe directory
pub const RECIPE_CONFIG_FILENAME: &str = "meta.yml";

static NAME_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z0-9 .\-]+$").unwrap());
static ID_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-z0-9.\-]+$").unwrap());

/// `meta.yml` as written by the user
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RecipeConfig {
    pub name: String,

    /// Custom container image for processing steps
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,

    pub input: RecipeInput,

    #[serde(default)]
    pub output: RecipeOutput,

    pub workflow: WorkflowConfig,
}

/// A validated recipe
#[derive(Debug, Clone, PartialEq)]
pub struct Recipe {
    name: String,
    id: String,
    image: Option<String>,
    input: RecipeInput,
    output: RecipeOutput,
    workflow: Workflow,
    recipe_directory: PathBuf,
}

impl Recipe {
    /// Load the recipe stored in `recipe_directory`
    pub fn from_directory(recipe_directory: &Path) -> Result<Self> {
        let config_path = recipe_directory.join(RECIPE_CONFIG_FILENAME);
        let raw = std::fs::read_to_string(&config_path).map_err(|_| {
            RunnerError::recipe_not_found(
                ErrorCode::RECIPE_DIR_NOT_FOUND,
                "Recipe directory not found or has no meta.yml",
                recipe_directory.to_path_buf(),
            )
        })?;
        Self::load(&raw, recipe_directory)
    }

    /// Parse a raw `meta.yml` document, resolving file references against
    /// `recipe_directory`
    pub fn load(raw_config: &str, recipe_directory: &Path) -> Result<Self> {
        let config: RecipeConfig = serde_yaml::from_str(raw_config)?;
        Self::from_config(config, recipe_directory)
    }

    pub fn from_config(config: RecipeConfig, recipe_directory: &Path) -> Result<Self> {
        let id = derive_id(&config.name)?;
        config.input.validate()?;
        let workflow = config.workflow.load(recipe_directory)?;

        debug!(
            "Loaded recipe '{}' (id={}, workflow={}, inputs={})",
            config.name,
            id,
            workflow.kind(),
            config.input.params.len()
        );

        Ok(Self {
            name: config.name,
            id,
            image: config.image,
            input: config.input,
            output: config.output,
            workflow,
            recipe_directory: recipe_directory.to_path_buf(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Resource-name-safe identifier derived from the name
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn image(&self) -> Option<&str> {
        self.image.as_deref()
    }

    pub fn input(&self) -> &RecipeInput {
        &self.input
    }

    pub(crate) fn input_mut(&mut self) -> &mut RecipeInput {
        &mut self.input
    }

    pub fn output(&self) -> RecipeOutput {
        self.output
    }

    pub fn workflow(&self) -> &Workflow {
        &self.workflow
    }

    pub fn recipe_directory(&self) -> &Path {
        &self.recipe_directory
    }

    /// Parallel settings; visualization workflows are never partitioned here
    pub fn parallel(&self) -> ParallelConfig {
        match &self.workflow {
            Workflow::Shell(shell) => shell.parallel.clone(),
            Workflow::Visualization(_) => ParallelConfig::default(),
        }
    }
}

/// Derive a recipe id from its display name
///
/// "My Recipe" becomes "my-recipe".
pub fn derive_id(name: &str) -> Result<String> {
    if !NAME_PATTERN.is_match(name) {
        return Err(RunnerError::validation_with_code(
            ErrorCode::RECIPE_INVALID_NAME,
            format!(
                "name '{}' may only contain letters, digits, spaces, '.' and '-'",
                name
            ),
            Some("name".to_string()),
        ));
    }

    let id = name.to_lowercase().replace(' ', "-");
    if !ID_PATTERN.is_match(&id) {
        return Err(RunnerError::validation_with_code(
            ErrorCode::RECIPE_INVALID_NAME,
            format!("derived id '{}' is not a valid resource name", id),
            Some("name".to_string()),
        ));
    }
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn recipe_dir(meta: &str, sh: Option<&str>) -> TempDir {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(RECIPE_CONFIG_FILENAME), meta).unwrap();
        if let Some(sh) = sh {
            std::fs::write(dir.path().join("recipe.sh"), sh).unwrap();
        }
        dir
    }

    const SHELL_META: &str = r#"
name: "Test OGDC workflow"
input:
  params:
    - type: url
      value: https://example.com/a.nc
output:
  type: pvc
workflow:
  type: shell
  sh_file: recipe.sh
"#;

    #[test]
    fn test_derive_id() {
        assert_eq!(derive_id("My Recipe").unwrap(), "my-recipe");
        assert_eq!(derive_id("v1.2 Data-Set").unwrap(), "v1.2-data-set");
    }

    #[test]
    fn test_name_with_star_rejected() {
        let err = derive_id("bad*name").unwrap_err();
        assert_eq!(err.code(), ErrorCode::RECIPE_INVALID_NAME);
    }

    #[test]
    fn test_name_with_underscore_rejected() {
        assert!(derive_id("bad_name").is_err());
    }

    #[test]
    fn test_load_shell_recipe() {
        let dir = recipe_dir(SHELL_META, Some("# header\ncp $INPUT_FILE $OUTPUT_FILE\n"));
        let recipe = Recipe::from_directory(dir.path()).unwrap();

        assert_eq!(recipe.id(), "test-ogdc-workflow");
        assert_eq!(recipe.output(), RecipeOutput::Pvc);
        assert!(!recipe.parallel().enabled);
        match recipe.workflow() {
            Workflow::Shell(shell) => {
                assert_eq!(shell.commands, vec!["cp $INPUT_FILE $OUTPUT_FILE"]);
            }
            other => panic!("expected shell workflow, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_meta_is_not_found() {
        let dir = TempDir::new().unwrap();
        let err = Recipe::from_directory(dir.path()).unwrap_err();
        assert_eq!(err.code(), ErrorCode::RECIPE_DIR_NOT_FOUND);
    }

    #[test]
    fn test_missing_sh_file_is_not_found() {
        let dir = recipe_dir(SHELL_META, None);
        let err = Recipe::from_directory(dir.path()).unwrap_err();
        assert!(matches!(err, RunnerError::RecipeNotFound { .. }));
        assert_eq!(err.code(), ErrorCode::RECIPE_FILE_NOT_FOUND);
    }

    #[test]
    fn test_unknown_top_level_key_rejected() {
        let meta = format!("{}\nextra_key: true\n", SHELL_META);
        let dir = recipe_dir(&meta, Some("echo hi\n"));
        let err = Recipe::from_directory(dir.path()).unwrap_err();
        assert_eq!(err.code(), ErrorCode::RECIPE_INVALID_YAML);
    }

    #[test]
    fn test_unknown_workflow_key_rejected() {
        let meta = SHELL_META.replace("sh_file: recipe.sh", "sh_file: recipe.sh\n  shell: bash");
        let dir = recipe_dir(&meta, Some("echo hi\n"));
        assert!(Recipe::from_directory(dir.path()).is_err());
    }

    #[test]
    fn test_empty_input_rejected() {
        let meta = r#"
name: "empty"
input:
  params: []
workflow:
  type: shell
"#;
        let dir = recipe_dir(meta, Some("echo hi\n"));
        let err = Recipe::from_directory(dir.path()).unwrap_err();
        assert_eq!(err.code(), ErrorCode::RECIPE_EMPTY_INPUT);
    }

    #[test]
    fn test_output_defaults_to_pvc() {
        let meta = SHELL_META.replace("output:\n  type: pvc\n", "");
        let dir = recipe_dir(&meta, Some("echo hi\n"));
        let recipe = Recipe::from_directory(dir.path()).unwrap();
        assert_eq!(recipe.output(), RecipeOutput::Pvc);
    }

    #[test]
    fn test_parallel_recipe_config() {
        let meta = r#"
name: "Test parallel shell workflow"
input:
  params:
    - {type: url, value: "https://example.com/1.txt"}
    - {type: url, value: "https://example.com/2.txt"}
    - {type: url, value: "https://example.com/3.txt"}
    - {type: url, value: "https://example.com/4.txt"}
    - {type: url, value: "https://example.com/5.txt"}
workflow:
  type: shell
  parallel:
    enabled: true
    partition_strategy: files
    partition_size: 2
"#;
        let dir = recipe_dir(meta, Some("echo hi\n"));
        let recipe = Recipe::from_directory(dir.path()).unwrap();
        assert_eq!(recipe.id(), "test-parallel-shell-workflow");
        let parallel = recipe.parallel();
        assert!(parallel.enabled);
        assert_eq!(parallel.partition_strategy, PartitionStrategy::Files);
        assert_eq!(parallel.partition_size, Some(2));
    }

    #[test]
    fn test_visualization_recipe_with_config() {
        let meta = r#"
name: "viz test"
input:
  params:
    - type: url
      value: https://example.com/basins.gpkg
workflow:
  type: visualization
  batch_size: 50
  config_file: config.json
"#;
        let dir = recipe_dir(meta, None);
        std::fs::write(
            dir.path().join("config.json"),
            r#"{"deduplicate_clip_to_footprint": false}"#,
        )
        .unwrap();
        let recipe = Recipe::from_directory(dir.path()).unwrap();
        match recipe.workflow() {
            Workflow::Visualization(viz) => {
                assert_eq!(viz.batch_size, 50);
                let value: serde_json::Value = serde_json::from_str(&viz.config_json).unwrap();
                assert_eq!(value["deduplicate_clip_to_footprint"], false);
            }
            other => panic!("expected visualization workflow, got {:?}", other),
        }
        assert!(!recipe.parallel().enabled);
    }
}
