//! Engine connection configuration
//!
//! Built once from defaults, an optional TOML file and `RECIPE_RUNNER_*`
//! environment variables, then treated as immutable. Switching engines means
//! building a new config and rebinding the controller to it.

use crate::error::{ErrorCode, Result, RunnerError};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

const ENV_PREFIX: &str = "RECIPE_RUNNER_";

/// Connection and submission settings for the workflow engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    /// Base URL of the engine's HTTP API
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Namespace executions are created in
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Service account every execution runs as
    #[serde(default = "default_service_account")]
    pub service_account: String,

    /// Default container image for tasks without an override
    #[serde(default = "default_image")]
    pub image: String,

    #[serde(default = "default_image_pull_policy")]
    pub image_pull_policy: String,

    /// Claim name of the shared workflow volume
    #[serde(default = "default_volume_claim")]
    pub workflow_volume_claim: String,

    /// Global cap on concurrently running tasks per execution
    #[serde(default = "default_max_parallelism")]
    pub max_parallelism: u32,

    /// Timeout for a single HTTP request to the engine
    #[serde(with = "humantime_serde", default = "default_request_timeout")]
    pub request_timeout: Duration,

    /// Ask the engine to archive finished executions
    #[serde(default = "default_true")]
    pub archive_workflows: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            namespace: default_namespace(),
            service_account: default_service_account(),
            image: default_image(),
            image_pull_policy: default_image_pull_policy(),
            workflow_volume_claim: default_volume_claim(),
            max_parallelism: default_max_parallelism(),
            request_timeout: default_request_timeout(),
            archive_workflows: true,
        }
    }
}

impl EngineConfig {
    /// Defaults, then `path` if given, then the process environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        let config = config.with_env_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            RunnerError::config_with_code(
                ErrorCode::CONFIG_NOT_FOUND,
                format!("cannot read engine config {}", path.display()),
            )
            .with_source(e)
        })?;
        Self::from_toml_str(&raw)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self> {
        toml::from_str(raw).map_err(|e| {
            RunnerError::config_with_code(
                ErrorCode::CONFIG_INVALID_TOML,
                format!("invalid engine config: {}", e),
            )
            .with_source(e)
        })
    }

    /// Apply `RECIPE_RUNNER_*` overrides read through `lookup`
    pub fn with_env_overrides<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(&format!("{}{}", ENV_PREFIX, name));

        if let Some(value) = var("ENGINE_URL") {
            self.base_url = value;
        }
        if let Some(value) = var("NAMESPACE") {
            self.namespace = value;
        }
        if let Some(value) = var("SERVICE_ACCOUNT") {
            self.service_account = value;
        }
        if let Some(value) = var("IMAGE") {
            self.image = value;
        }
        if let Some(value) = var("IMAGE_PULL_POLICY") {
            self.image_pull_policy = value;
        }
        if let Some(value) = var("WORKFLOW_PVC") {
            self.workflow_volume_claim = value;
        }
        if let Some(value) = var("MAX_PARALLELISM") {
            self.max_parallelism = value.parse().map_err(|_| {
                invalid_env("MAX_PARALLELISM", &value, "expected a positive integer")
            })?;
        }
        if let Some(value) = var("REQUEST_TIMEOUT") {
            self.request_timeout = humantime_serde::re::humantime::parse_duration(&value)
                .map_err(|_| {
                    invalid_env("REQUEST_TIMEOUT", &value, "expected a duration like 30s")
                })?;
        }
        if let Some(value) = var("ARCHIVE_WORKFLOWS") {
            self.archive_workflows = value
                .parse()
                .map_err(|_| invalid_env("ARCHIVE_WORKFLOWS", &value, "expected true or false"))?;
        }

        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        if self.base_url.trim().is_empty() {
            return Err(invalid_value("base_url must not be empty"));
        }
        url::Url::parse(&self.base_url)
            .map_err(|e| {
                invalid_value(format!("base_url '{}' is not a URL: {}", self.base_url, e))
            })?;
        if self.namespace.trim().is_empty() {
            return Err(invalid_value("namespace must not be empty"));
        }
        if self.max_parallelism == 0 {
            return Err(invalid_value("max_parallelism must be at least 1"));
        }
        Ok(())
    }
}

fn invalid_value(message: impl Into<String>) -> RunnerError {
    RunnerError::config_with_code(ErrorCode::CONFIG_INVALID_VALUE, message)
}

fn invalid_env(name: &str, value: &str, expected: &str) -> RunnerError {
    invalid_value(format!("{}{}='{}': {}", ENV_PREFIX, name, value, expected))
}

fn default_base_url() -> String {
    "http://localhost:2746".to_string()
}

fn default_namespace() -> String {
    "argo-helm".to_string()
}

fn default_service_account() -> String {
    "argo-workflow".to_string()
}

fn default_image() -> String {
    "ogdc-runner".to_string()
}

fn default_image_pull_policy() -> String {
    "Never".to_string()
}

fn default_volume_claim() -> String {
    "ogdc-workflow-pvc".to_string()
}

fn default_max_parallelism() -> u32 {
    5
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_true() -> bool {
    true
}
