use serde::{Deserialize, Serialize};

/// Where a recipe's final output is published
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RecipeOutput {
    /// Persisted on the shared workflow volume under the recipe id
    #[default]
    Pvc,
    /// Zipped and kept as a short-lived engine artifact
    Temporary,
    /// Published to a DataONE repository (reserved)
    #[serde(rename = "dataone")]
    DataOne,
}

impl RecipeOutput {
    /// Whether existing output can be looked up from the recipe alone
    pub fn is_queryable(&self) -> bool {
        matches!(self, Self::Pvc)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pvc => "pvc",
            Self::Temporary => "temporary",
            Self::DataOne => "dataone",
        }
    }
}
