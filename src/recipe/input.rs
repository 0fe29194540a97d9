//! Recipe input parameters
//!
//! Inputs are kept as an open set of kinds at load time. Whether the compiler
//! knows how to fetch a given kind is decided when the recipe is compiled.

use crate::dataone::DataObject;
use crate::error::{ErrorCode, Result, RunnerError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of an input parameter, as written in `meta.yml`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum InputKind {
    Url,
    PvcMount,
    FileSystem,
    DataOne,
    /// Any kind the compiler does not recognize
    Unknown(String),
}

impl From<String> for InputKind {
    fn from(value: String) -> Self {
        match value.as_str() {
            "url" => Self::Url,
            "pvc_mount" => Self::PvcMount,
            "file_system" => Self::FileSystem,
            "dataone" => Self::DataOne,
            _ => Self::Unknown(value),
        }
    }
}

impl From<InputKind> for String {
    fn from(kind: InputKind) -> Self {
        kind.to_string()
    }
}

impl fmt::Display for InputKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Url => "url",
            Self::PvcMount => "pvc_mount",
            Self::FileSystem => "file_system",
            Self::DataOne => "dataone",
            Self::Unknown(other) => other.as_str(),
        };
        f.write_str(s)
    }
}

/// A single input parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InputParam {
    #[serde(rename = "type")]
    pub kind: InputKind,

    pub value: String,

    /// Filename glob used to select objects from a DataONE dataset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,

    /// Objects a DataONE dataset resolved to; filled by an explicit resolution step
    #[serde(skip)]
    pub resolved: Vec<DataObject>,
}

impl InputParam {
    pub fn new(kind: InputKind, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
            filename: None,
            resolved: Vec::new(),
        }
    }

    pub fn url(value: impl Into<String>) -> Self {
        Self::new(InputKind::Url, value)
    }

    pub fn dataone(value: impl Into<String>, filename: Option<String>) -> Self {
        Self {
            filename,
            ..Self::new(InputKind::DataOne, value)
        }
    }

    /// Structural checks that can be made without knowing the compiler
    pub(crate) fn validate(&self, index: usize) -> Result<()> {
        let field = format!("input.params[{}]", index);

        if self.value.trim().is_empty() {
            return Err(RunnerError::validation_with_code(
                ErrorCode::RECIPE_INVALID_VALUE,
                "input value must not be empty",
                Some(field),
            ));
        }

        if self.kind == InputKind::Url {
            url::Url::parse(&self.value).map_err(|e| {
                RunnerError::validation_with_code(
                    ErrorCode::RECIPE_INVALID_VALUE,
                    format!("'{}' is not a valid URL", self.value),
                    Some(field.clone()),
                )
                .with_source(e)
            })?;
        }

        if self.filename.is_some() && self.kind != InputKind::DataOne {
            return Err(RunnerError::validation_with_code(
                ErrorCode::RECIPE_INVALID_VALUE,
                format!("'filename' is only supported for dataone inputs, not {}", self.kind),
                Some(field),
            ));
        }

        Ok(())
    }
}

/// The `input` section of a recipe
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RecipeInput {
    pub params: Vec<InputParam>,
}

impl RecipeInput {
    pub(crate) fn validate(&self) -> Result<()> {
        if self.params.is_empty() {
            return Err(RunnerError::validation_with_code(
                ErrorCode::RECIPE_EMPTY_INPUT,
                "at least one input parameter is required",
                Some("input.params".to_string()),
            ));
        }

        self.params
            .iter()
            .enumerate()
            .try_for_each(|(idx, param)| param.validate(idx))
    }

    pub fn has_datasets(&self) -> bool {
        self.params.iter().any(|p| p.kind == InputKind::DataOne)
    }
}
