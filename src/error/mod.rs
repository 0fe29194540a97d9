use std::fmt::Display;
use std::path::PathBuf;
use thiserror::Error;

pub mod codes;

pub use codes::{describe_error_code, ErrorCode};

/// The unified error type for recipe-runner
///
/// Each variant is one narrowly scoped failure kind so callers can tell a
/// broken recipe apart from a platform failure or an already-completed run.
#[derive(Error, Debug)]
pub enum RunnerError {
    #[error("[E{code:04}] Configuration error: {message}")]
    Config {
        code: u16,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("[E{code:04}] Invalid recipe: {message}")]
    Validation {
        code: u16,
        message: String,
        field: Option<String>,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("[E{code:04}] {message}: {}", path.display())]
    RecipeNotFound {
        code: u16,
        message: String,
        path: PathBuf,
    },

    #[error("[E{code:04}] Unsupported input type '{input_type}' for parameter {value}")]
    UnsupportedInput {
        code: u16,
        input_type: String,
        value: String,
    },

    #[error("[E{code:04}] Data for recipe {recipe_id} have already been published")]
    AlreadyPublished { code: u16, recipe_id: String },

    #[error("[E{code:04}] Workflow submission failed: {message}")]
    Submission {
        code: u16,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("[E{code:04}] Workflow execution failed: {message}")]
    Execution {
        code: u16,
        message: String,
        workflow_name: Option<String>,
    },

    #[error("[E{code:04}] Dataset resolution failed: {message}")]
    Resolution {
        code: u16,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("[E{code:04}] Engine error: {message}")]
    Engine {
        code: u16,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl RunnerError {
    /// Create a configuration error with default code
    pub fn config(message: impl Into<String>) -> Self {
        Self::config_with_code(ErrorCode::CONFIG_GENERIC, message)
    }

    /// Create a configuration error with specific code
    pub fn config_with_code(code: u16, message: impl Into<String>) -> Self {
        Self::Config {
            code,
            message: message.into(),
            source: None,
        }
    }

    /// Create a validation error with default code
    pub fn validation(message: impl Into<String>) -> Self {
        Self::validation_with_code(ErrorCode::RECIPE_GENERIC, message, None)
    }

    /// Create a validation error with specific code and field
    pub fn validation_with_code(
        code: u16,
        message: impl Into<String>,
        field: Option<String>,
    ) -> Self {
        Self::Validation {
            code,
            message: message.into(),
            field,
            source: None,
        }
    }

    /// Create a file-not-found error for a path referenced by a recipe
    pub fn recipe_not_found(code: u16, message: impl Into<String>, path: PathBuf) -> Self {
        Self::RecipeNotFound {
            code,
            message: message.into(),
            path,
        }
    }

    pub fn unsupported_input(input_type: impl Into<String>, value: impl Into<String>) -> Self {
        Self::UnsupportedInput {
            code: ErrorCode::COMPILE_UNSUPPORTED_INPUT,
            input_type: input_type.into(),
            value: value.into(),
        }
    }

    pub fn already_published(recipe_id: impl Into<String>) -> Self {
        Self::AlreadyPublished {
            code: ErrorCode::PUBLISH_ALREADY_PUBLISHED,
            recipe_id: recipe_id.into(),
        }
    }

    /// Create a submission error with specific code
    pub fn submission(code: u16, message: impl Into<String>) -> Self {
        Self::Submission {
            code,
            message: message.into(),
            source: None,
        }
    }

    /// Create an execution error naming the workflow to inspect
    pub fn execution(
        code: u16,
        message: impl Into<String>,
        workflow_name: Option<String>,
    ) -> Self {
        Self::Execution {
            code,
            message: message.into(),
            workflow_name,
        }
    }

    /// Create a dataset resolution error with specific code
    pub fn resolution(code: u16, message: impl Into<String>) -> Self {
        Self::Resolution {
            code,
            message: message.into(),
            source: None,
        }
    }

    /// Create an engine transport error
    pub fn engine(message: impl Into<String>) -> Self {
        Self::Engine {
            code: ErrorCode::ENGINE_TRANSPORT,
            message: message.into(),
            source: None,
        }
    }

    /// Add a source error to this error
    ///
    /// Variants without a source slot are returned unchanged.
    pub fn with_source(
        mut self,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        match &mut self {
            Self::Config { source: src, .. }
            | Self::Validation { source: src, .. }
            | Self::Submission { source: src, .. }
            | Self::Resolution { source: src, .. }
            | Self::Engine { source: src, .. } => {
                *src = Some(source.into());
            }
            Self::RecipeNotFound { .. }
            | Self::UnsupportedInput { .. }
            | Self::AlreadyPublished { .. }
            | Self::Execution { .. } => {}
        }
        self
    }

    /// Add context to the error message
    pub fn with_context(mut self, context: impl Display) -> Self {
        match &mut self {
            Self::Config { message, .. }
            | Self::Validation { message, .. }
            | Self::RecipeNotFound { message, .. }
            | Self::Submission { message, .. }
            | Self::Execution { message, .. }
            | Self::Resolution { message, .. }
            | Self::Engine { message, .. } => {
                *message = format!("{}: {}", message, context);
            }
            Self::UnsupportedInput { .. } | Self::AlreadyPublished { .. } => {}
        }
        self
    }

    /// Get the error code
    pub fn code(&self) -> u16 {
        match self {
            Self::Config { code, .. }
            | Self::Validation { code, .. }
            | Self::RecipeNotFound { code, .. }
            | Self::UnsupportedInput { code, .. }
            | Self::AlreadyPublished { code, .. }
            | Self::Submission { code, .. }
            | Self::Execution { code, .. }
            | Self::Resolution { code, .. }
            | Self::Engine { code, .. } => *code,
        }
    }

    /// Get the process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config { .. } => 2,
            Self::Validation { .. } | Self::RecipeNotFound { .. } => 3,
            Self::UnsupportedInput { .. } => 4,
            Self::AlreadyPublished { .. } => 5,
            Self::Submission { .. } | Self::Engine { .. } => 6,
            Self::Execution { .. } => 7,
            Self::Resolution { .. } => 8,
        }
    }

    /// Name of the engine-side workflow to inspect, when one is known
    pub fn workflow_name(&self) -> Option<&str> {
        match self {
            Self::Execution { workflow_name, .. } => workflow_name.as_deref(),
            _ => None,
        }
    }
}

/// Type alias for Results using RunnerError
pub type Result<T> = std::result::Result<T, RunnerError>;

impl From<serde_yaml::Error> for RunnerError {
    fn from(err: serde_yaml::Error) -> Self {
        RunnerError::validation_with_code(
            ErrorCode::RECIPE_INVALID_YAML,
            format!("invalid recipe configuration: {}", err),
            None,
        )
        .with_source(err)
    }
}

impl From<reqwest::Error> for RunnerError {
    fn from(err: reqwest::Error) -> Self {
        RunnerError::engine(format!("request failed: {}", err)).with_source(err)
    }
}
