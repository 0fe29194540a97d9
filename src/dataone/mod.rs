//! DataONE dataset resolution
//!
//! Turns a dataset (resource map) identifier into the list of downloadable
//! data objects it contains. Resolution is always an explicit step run
//! before compilation; loading a recipe never touches the network.

use crate::error::{ErrorCode, Result, RunnerError};
use crate::recipe::{InputKind, Recipe};
use async_trait::async_trait;
use glob::{MatchOptions, Pattern};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Environment variable naming the DataONE member node to query
pub const DATAONE_NODE_URL_ENV: &str = "RECIPE_RUNNER_DATAONE_NODE_URL";

const SOLR_ROWS: u32 = 100;

/// A single object inside a dataset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataObject {
    pub identifier: String,
    pub url: String,
    pub filename: String,
    #[serde(default)]
    pub format_id: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub entity_name: String,
}

/// Resolves dataset identifiers to data objects
#[async_trait]
pub trait DatasetResolver: Send + Sync {
    /// List every object in the dataset
    async fn resolve_dataset(&self, dataset_identifier: &str) -> Result<Vec<DataObject>>;

    /// List the dataset's objects, optionally narrowed by a filename glob
    ///
    /// Fails when the dataset is empty or nothing matches the glob.
    async fn resolve(
        &self,
        dataset_identifier: &str,
        filename_glob: Option<&str>,
    ) -> Result<Vec<DataObject>> {
        let objects = self.resolve_dataset(dataset_identifier).await?;
        if objects.is_empty() {
            return Err(RunnerError::resolution(
                ErrorCode::RESOLUTION_NO_OBJECTS,
                format!("No data objects found in dataset {}", dataset_identifier),
            ));
        }

        match filename_glob {
            Some(pattern) => filter_by_filename(objects, pattern),
            None => Ok(objects),
        }
    }
}

/// Keep objects whose filename matches `pattern` (`*` and `?`, case-insensitive)
pub fn filter_by_filename(objects: Vec<DataObject>, pattern: &str) -> Result<Vec<DataObject>> {
    let glob = Pattern::new(pattern).map_err(|e| {
        RunnerError::resolution(
            ErrorCode::RESOLUTION_NO_MATCH,
            format!("invalid filename pattern '{}': {}", pattern, e),
        )
    })?;
    let options = MatchOptions {
        case_sensitive: false,
        require_literal_separator: false,
        require_literal_leading_dot: false,
    };

    let total = objects.len();
    let available: Vec<String> = objects.iter().map(|o| o.filename.clone()).collect();
    let matched: Vec<DataObject> = objects
        .into_iter()
        .filter(|obj| glob.matches_with(&obj.filename, options))
        .collect();

    if matched.is_empty() {
        return Err(RunnerError::resolution(
            ErrorCode::RESOLUTION_NO_MATCH,
            format!(
                "No data objects matching pattern '{}' found in dataset. Available files: {:?}",
                pattern, available
            ),
        ));
    }

    info!(
        "Filtered {} objects to {} matching '{}'",
        total,
        matched.len(),
        pattern
    );
    Ok(matched)
}

/// Resolve every `dataone` input of a recipe in place
pub async fn resolve_recipe_inputs(
    recipe: &mut Recipe,
    resolver: &dyn DatasetResolver,
) -> Result<()> {
    for param in recipe.input_mut().params.iter_mut() {
        if param.kind != InputKind::DataOne {
            continue;
        }
        let objects = resolver
            .resolve(&param.value, param.filename.as_deref())
            .await?;
        debug!("Dataset {} resolved to {} objects", param.value, objects.len());
        param.resolved = objects;
    }
    Ok(())
}

/// Solr-backed resolver for a DataONE member node
pub struct DataOneResolver {
    client: Client,
    node_url: String,
}

#[derive(Debug, Deserialize)]
struct SolrResponse {
    response: SolrDocs,
}

#[derive(Debug, Deserialize)]
struct SolrDocs {
    #[serde(default)]
    docs: Vec<SolrDoc>,
}

#[derive(Debug, Deserialize)]
struct SolrDoc {
    id: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default, rename = "formatId")]
    format_id: Option<String>,
    #[serde(default)]
    size: Option<u64>,
    #[serde(default, rename = "fileName")]
    file_name: Option<FileNameField>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum FileNameField {
    One(String),
    Many(Vec<String>),
}

impl DataOneResolver {
    pub fn new(node_url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| {
                RunnerError::config(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self {
            client,
            node_url: node_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Build a resolver from `RECIPE_RUNNER_DATAONE_NODE_URL`
    pub fn from_env() -> Result<Self> {
        let node_url = std::env::var(DATAONE_NODE_URL_ENV).map_err(|_| {
            RunnerError::config(format!("Must have {} envvar set", DATAONE_NODE_URL_ENV))
        })?;
        Self::new(node_url)
    }

    fn object_url(&self, identifier: &str) -> String {
        let encoded: String = url::form_urlencoded::byte_serialize(identifier.as_bytes()).collect();
        format!("{}/v2/object/{}", self.node_url, encoded)
    }

    fn to_data_object(&self, doc: SolrDoc) -> DataObject {
        let filename = filename_for(&doc);
        DataObject {
            url: self.object_url(&doc.id),
            entity_name: doc.title.clone().unwrap_or_else(|| filename.clone()),
            format_id: doc.format_id.unwrap_or_default(),
            size: doc.size.unwrap_or(0),
            identifier: doc.id,
            filename,
        }
    }
}

fn filename_for(doc: &SolrDoc) -> String {
    match &doc.file_name {
        Some(FileNameField::One(name)) => name.clone(),
        Some(FileNameField::Many(names)) if !names.is_empty() => names[0].clone(),
        _ => doc.id.rsplit(':').next().unwrap_or(&doc.id).to_string(),
    }
}

#[async_trait]
impl DatasetResolver for DataOneResolver {
    async fn resolve_dataset(&self, dataset_identifier: &str) -> Result<Vec<DataObject>> {
        info!("Resolving dataset: {}", dataset_identifier);

        let query = format!(
            "resourceMap:\"{}\" AND -formatType:METADATA",
            dataset_identifier
        );
        let rows = SOLR_ROWS.to_string();
        let response = self
            .client
            .get(format!("{}/v2/query/solr/", self.node_url))
            .query(&[
                ("q", query.as_str()),
                ("fl", "id,title,formatId,size,fileName"),
                ("rows", rows.as_str()),
                ("wt", "json"),
            ])
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| {
                RunnerError::resolution(
                    ErrorCode::RESOLUTION_REQUEST_FAILED,
                    format!("Failed to resolve dataset {}: {}", dataset_identifier, e),
                )
                .with_source(e)
            })?;

        let body: SolrResponse = response.json().await.map_err(|e| {
            RunnerError::resolution(
                ErrorCode::RESOLUTION_REQUEST_FAILED,
                format!(
                    "Failed to parse DataONE response for {}: {}",
                    dataset_identifier, e
                ),
            )
            .with_source(e)
        })?;

        if body.response.docs.is_empty() {
            warn!("No objects found for dataset {}", dataset_identifier);
        }

        let objects: Vec<DataObject> = body
            .response
            .docs
            .into_iter()
            .map(|doc| self.to_data_object(doc))
            .collect();
        info!("Found {} data objects in dataset", objects.len());
        Ok(objects)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::HashMap;

    /// Resolver answering from a fixed table
    pub(crate) struct StaticResolver {
        pub datasets: HashMap<String, Vec<DataObject>>,
    }

    #[async_trait]
    impl DatasetResolver for StaticResolver {
        async fn resolve_dataset(&self, dataset_identifier: &str) -> Result<Vec<DataObject>> {
            Ok(self
                .datasets
                .get(dataset_identifier)
                .cloned()
                .unwrap_or_default())
        }
    }

    pub(crate) fn object(filename: &str) -> DataObject {
        DataObject {
            identifier: format!("urn:uuid:{}", filename),
            url: format!("https://test.org/{}", filename),
            filename: filename.to_string(),
            format_id: String::new(),
            size: 0,
            entity_name: filename.to_string(),
        }
    }

    fn resolver_with(objects: Vec<DataObject>) -> StaticResolver {
        let mut datasets = HashMap::new();
        datasets.insert("resource_map_doi:10.18739/A29G5GD39".to_string(), objects);
        StaticResolver { datasets }
    }

    const PID: &str = "resource_map_doi:10.18739/A29G5GD39";

    #[tokio::test]
    async fn test_resolve_without_pattern_keeps_all() {
        let resolver = resolver_with(vec![object("file1.nc"), object("file2.csv")]);
        let objects = resolver.resolve(PID, None).await.unwrap();
        assert_eq!(objects.len(), 2);
    }

    #[tokio::test]
    async fn test_resolve_with_star_pattern() {
        let resolver = resolver_with(vec![
            object("percent_gris_1.nc"),
            object("percent_gris_2.nc"),
            object("other_data.csv"),
        ]);
        let objects = resolver.resolve(PID, Some("percent_gris_*.nc")).await.unwrap();
        assert_eq!(objects.len(), 2);
        assert!(objects.iter().all(|o| o.filename.starts_with("percent_gris")));
    }

    #[tokio::test]
    async fn test_question_mark_matches_single_character() {
        let resolver = resolver_with(vec![
            object("data1.nc"),
            object("data2.nc"),
            object("data10.nc"),
        ]);
        let objects = resolver.resolve(PID, Some("data?.nc")).await.unwrap();
        let names: Vec<_> = objects.iter().map(|o| o.filename.as_str()).collect();
        assert_eq!(names, vec!["data1.nc", "data2.nc"]);
    }

    #[tokio::test]
    async fn test_matching_is_case_insensitive() {
        let resolver = resolver_with(vec![object("DATA.NC")]);
        let objects = resolver.resolve(PID, Some("data.nc")).await.unwrap();
        assert_eq!(objects[0].filename, "DATA.NC");
    }

    #[tokio::test]
    async fn test_no_match_is_resolution_error() {
        let resolver = resolver_with(vec![object("other_file.nc")]);
        let err = resolver.resolve(PID, Some("nonexistent.nc")).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::RESOLUTION_NO_MATCH);
        assert!(err.to_string().contains("other_file.nc"));
    }

    #[tokio::test]
    async fn test_empty_dataset_is_resolution_error() {
        let resolver = resolver_with(vec![]);
        let err = resolver.resolve(PID, None).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::RESOLUTION_NO_OBJECTS);
    }

    #[test]
    fn test_object_url_is_percent_encoded() {
        let resolver = DataOneResolver::new("https://arcticdata.io/metacat/d1/mn/").unwrap();
        assert_eq!(
            resolver.object_url("urn:uuid:file1"),
            "https://arcticdata.io/metacat/d1/mn/v2/object/urn%3Auuid%3Afile1"
        );
    }

    #[test]
    fn test_filename_falls_back_to_identifier() {
        let doc = SolrDoc {
            id: "urn:uuid:abc".to_string(),
            title: None,
            format_id: None,
            size: None,
            file_name: None,
        };
        assert_eq!(filename_for(&doc), "abc");

        let doc = SolrDoc {
            file_name: Some(FileNameField::Many(vec!["first.nc".to_string()])),
            ..doc
        };
        assert_eq!(filename_for(&doc), "first.nc");
    }
}
