//! Workflow variants a recipe can declare
//!
//! The YAML form (`WorkflowConfig`) names files relative to the recipe
//! directory. Loading turns it into a `Workflow` whose referenced files have
//! been read and checked.

use crate::error::{ErrorCode, Result, RunnerError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const DEFAULT_SH_FILE: &str = "recipe.sh";
const DEFAULT_BATCH_SIZE: u32 = 200;

/// How inputs are grouped into partitions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PartitionStrategy {
    /// Fixed number of files per partition
    #[default]
    #[serde(rename = "files", alias = "by_file_count")]
    Files,
}

/// Parallel execution settings for a shell workflow
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ParallelConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default)]
    pub partition_strategy: PartitionStrategy,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partition_size: Option<i64>,
}

impl ParallelConfig {
    pub fn enabled(partition_size: i64) -> Self {
        Self {
            enabled: true,
            partition_strategy: PartitionStrategy::Files,
            partition_size: Some(partition_size),
        }
    }

    /// Files per partition, defaulting to one
    pub fn effective_partition_size(&self) -> usize {
        self.partition_size
            .map(|size| size.max(1) as usize)
            .unwrap_or(1)
    }

    fn validate(&self) -> Result<()> {
        match self.partition_size {
            Some(size) if size < 1 => Err(RunnerError::validation_with_code(
                ErrorCode::RECIPE_INVALID_VALUE,
                format!("partition_size must be at least 1, got {}", size),
                Some("workflow.parallel.partition_size".to_string()),
            )),
            _ => Ok(()),
        }
    }
}

/// `workflow` section as written in `meta.yml`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkflowConfig {
    Shell(ShellWorkflowConfig),
    Visualization(VizWorkflowConfig),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ShellWorkflowConfig {
    #[serde(default = "default_sh_file")]
    pub sh_file: String,

    #[serde(default)]
    pub parallel: ParallelConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VizWorkflowConfig {
    #[serde(default = "default_batch_size")]
    pub batch_size: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_file: Option<String>,
}

fn default_sh_file() -> String {
    DEFAULT_SH_FILE.to_string()
}

fn default_batch_size() -> u32 {
    DEFAULT_BATCH_SIZE
}

/// A loaded workflow
#[derive(Debug, Clone, PartialEq)]
pub enum Workflow {
    Shell(ShellWorkflow),
    Visualization(VizWorkflow),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ShellWorkflow {
    pub sh_file: PathBuf,
    /// Commands in file order, comments and blank lines removed
    pub commands: Vec<String>,
    pub parallel: ParallelConfig,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VizWorkflow {
    pub batch_size: u32,
    pub config_file: Option<PathBuf>,
    /// Visualization config as compact JSON (`{}` when no file is given)
    pub config_json: String,
}

impl Workflow {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Shell(_) => "shell",
            Self::Visualization(_) => "visualization",
        }
    }
}

impl WorkflowConfig {
    /// Read and check every file the workflow references
    pub(crate) fn load(self, recipe_directory: &Path) -> Result<Workflow> {
        match self {
            Self::Shell(cfg) => {
                cfg.parallel.validate()?;
                let sh_file = recipe_directory.join(&cfg.sh_file);
                let content = read_recipe_file(&sh_file, "shell file")?;
                let commands = parse_commands(&content);
                if commands.is_empty() {
                    return Err(RunnerError::validation_with_code(
                        ErrorCode::RECIPE_NO_COMMANDS,
                        format!("{} contains no commands", cfg.sh_file),
                        Some("workflow.sh_file".to_string()),
                    ));
                }
                Ok(Workflow::Shell(ShellWorkflow {
                    sh_file,
                    commands,
                    parallel: cfg.parallel,
                }))
            }
            Self::Visualization(cfg) => {
                if cfg.batch_size == 0 {
                    return Err(RunnerError::validation_with_code(
                        ErrorCode::RECIPE_INVALID_VALUE,
                        "batch_size must be at least 1",
                        Some("workflow.batch_size".to_string()),
                    ));
                }
                let (config_file, config_json) = match cfg.config_file {
                    Some(name) => {
                        let path = recipe_directory.join(&name);
                        let raw = read_recipe_file(&path, "visualization config file")?;
                        let value: serde_json::Value =
                            serde_json::from_str(&raw).map_err(|e| {
                                RunnerError::validation_with_code(
                                    ErrorCode::RECIPE_INVALID_JSON,
                                    format!("{} is not valid JSON: {}", name, e),
                                    Some("workflow.config_file".to_string()),
                                )
                            })?;
                        (Some(path), value.to_string())
                    }
                    None => (None, "{}".to_string()),
                };
                Ok(Workflow::Visualization(VizWorkflow {
                    batch_size: cfg.batch_size,
                    config_file,
                    config_json,
                }))
            }
        }
    }
}

fn read_recipe_file(path: &Path, what: &str) -> Result<String> {
    std::fs::read_to_string(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => RunnerError::recipe_not_found(
            ErrorCode::RECIPE_FILE_NOT_FOUND,
            format!("{} not found", what),
            path.to_path_buf(),
        ),
        _ => RunnerError::validation_with_code(
            ErrorCode::RECIPE_GENERIC,
            format!("failed to read {} {}: {}", what, path.display(), e),
            None,
        ),
    })
}

/// Split a shell file into commands, dropping blank lines and comments
pub fn parse_commands(content: &str) -> Vec<String> {
    content
        .lines()
        .filter(|line| !line.trim().is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_commands_skips_comments_and_blanks() {
        let content = "#!/bin/sh\n# a comment\n\ncp $INPUT_FILE $OUTPUT_FILE\ngzip $OUTPUT_FILE\n";
        assert_eq!(
            parse_commands(content),
            vec!["cp $INPUT_FILE $OUTPUT_FILE", "gzip $OUTPUT_FILE"]
        );
    }

    #[test]
    fn test_effective_partition_size() {
        assert_eq!(ParallelConfig::default().effective_partition_size(), 1);
        assert_eq!(ParallelConfig::enabled(3).effective_partition_size(), 3);
        assert_eq!(ParallelConfig::enabled(0).effective_partition_size(), 1);
    }

    #[test]
    fn test_partition_strategy_accepts_alias() {
        let cfg: ParallelConfig =
            serde_yaml::from_str("enabled: true\npartition_strategy: by_file_count\n").unwrap();
        assert_eq!(cfg.partition_strategy, PartitionStrategy::Files);
        assert!(serde_yaml::from_str::<ParallelConfig>("partition_strategy: size\n").is_err());
    }

    #[test]
    fn test_shell_workflow_requires_sh_file() {
        let dir = TempDir::new().unwrap();
        let cfg = WorkflowConfig::Shell(ShellWorkflowConfig {
            sh_file: "missing.sh".to_string(),
            parallel: ParallelConfig::default(),
        });
        let err = cfg.load(dir.path()).unwrap_err();
        assert!(matches!(err, RunnerError::RecipeNotFound { .. }));
    }

    #[test]
    fn test_shell_workflow_rejects_zero_partition_size() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("recipe.sh"), "echo hi\n").unwrap();
        let cfg = WorkflowConfig::Shell(ShellWorkflowConfig {
            sh_file: "recipe.sh".to_string(),
            parallel: ParallelConfig::enabled(0),
        });
        assert!(matches!(
            cfg.load(dir.path()),
            Err(RunnerError::Validation { .. })
        ));
    }

    #[test]
    fn test_viz_config_defaults_to_empty_object() {
        let dir = TempDir::new().unwrap();
        let cfg = WorkflowConfig::Visualization(VizWorkflowConfig {
            batch_size: 200,
            config_file: None,
        });
        match cfg.load(dir.path()).unwrap() {
            Workflow::Visualization(viz) => assert_eq!(viz.config_json, "{}"),
            other => panic!("unexpected workflow {:?}", other),
        }
    }

    #[test]
    fn test_viz_config_must_be_json() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("config.json"), "{not json").unwrap();
        let cfg = WorkflowConfig::Visualization(VizWorkflowConfig {
            batch_size: 200,
            config_file: Some("config.json".to_string()),
        });
        let err = cfg.load(dir.path()).unwrap_err();
        assert_eq!(err.code(), ErrorCode::RECIPE_INVALID_JSON);
    }
}
