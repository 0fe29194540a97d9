//! Fetch stage construction
//!
//! Each input parameter becomes zero or more fetch items. The items drive
//! both the fetch command and, in parallel mode, the list of files the
//! partitioner splits.

use crate::error::{ErrorCode, Result, RunnerError};
use crate::recipe::{InputKind, RecipeInput};
use std::collections::HashMap;

const NOTHING_TO_FETCH: &str = "echo 'No input files to fetch'";

/// How one input file reaches the working area
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchItem {
    Download { url: String, filename: String },
    Copy { path: String, filename: String },
    /// Already visible inside the container; nothing to fetch
    Mounted { path: String },
}

impl FetchItem {
    /// Identity of the file as the user wrote it (or as it was resolved)
    pub fn source(&self) -> &str {
        match self {
            Self::Download { url, .. } => url,
            Self::Copy { path, .. } | Self::Mounted { path } => path,
        }
    }

    /// Path a processing command reads this file from, given the staging dir
    pub fn input_path(&self, staging_dir: &str) -> String {
        match self {
            Self::Download { filename, .. } | Self::Copy { filename, .. } => {
                format!("{}/{}", staging_dir.trim_end_matches('/'), filename)
            }
            Self::Mounted { path } => path.clone(),
        }
    }

    pub fn filename(&self) -> &str {
        match self {
            Self::Download { filename, .. } | Self::Copy { filename, .. } => filename,
            Self::Mounted { path } => basename(path),
        }
    }

    fn command(&self, dir: &str, naming: FetchNaming) -> Option<String> {
        match (self, naming) {
            (Self::Download { url, .. }, FetchNaming::Server) => Some(format!(
                "wget --content-disposition -P {} {}",
                dir,
                shell_quote(url)
            )),
            (Self::Download { url, filename }, FetchNaming::Pinned) => Some(format!(
                "wget -O {}/{} {}",
                dir.trim_end_matches('/'),
                shell_quote(filename),
                shell_quote(url)
            )),
            (Self::Copy { path, filename }, _) => Some(format!(
                "cp {} {}/{}",
                shell_quote(path),
                dir.trim_end_matches('/'),
                shell_quote(filename)
            )),
            (Self::Mounted { .. }, _) => None,
        }
    }
}

/// Who decides the name a download is saved under
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchNaming {
    /// The server, through `Content-Disposition`; readers list the directory
    Server,
    /// The item's own `filename`; readers open that exact path
    Pinned,
}

/// Pure: Turn every input parameter into fetch items, in input order
///
/// Unknown input kinds and unresolved datasets fail here, before any task
/// exists.
pub fn fetch_items(input: &RecipeInput) -> Result<Vec<FetchItem>> {
    let mut items = Vec::with_capacity(input.params.len());
    for param in &input.params {
        match &param.kind {
            InputKind::Url => items.push(FetchItem::Download {
                filename: url_basename(&param.value),
                url: param.value.clone(),
            }),
            InputKind::FileSystem => items.push(FetchItem::Copy {
                filename: basename(&param.value).to_string(),
                path: param.value.clone(),
            }),
            InputKind::PvcMount => items.push(FetchItem::Mounted {
                path: param.value.clone(),
            }),
            InputKind::DataOne => {
                if param.resolved.is_empty() {
                    return Err(RunnerError::resolution(
                        ErrorCode::RESOLUTION_UNRESOLVED,
                        format!(
                            "dataset {} has not been resolved to any data objects",
                            param.value
                        ),
                    ));
                }
                items.extend(param.resolved.iter().map(|obj| FetchItem::Download {
                    url: obj.url.clone(),
                    filename: obj.filename.clone(),
                }));
            }
            InputKind::Unknown(kind) => {
                return Err(RunnerError::unsupported_input(kind.as_str(), param.value.as_str()));
            }
        }
    }
    Ok(items)
}

/// Pure: Reject inputs that would land on the same file name
///
/// Partition tasks address inputs and outputs by file name, so two inputs
/// sharing one would silently overwrite each other.
pub fn ensure_unique_filenames(items: &[FetchItem]) -> Result<()> {
    let mut seen: HashMap<&str, &str> = HashMap::new();
    for item in items {
        if let Some(first) = seen.insert(item.filename(), item.source()) {
            return Err(RunnerError::validation_with_code(
                ErrorCode::COMPILE_DUPLICATE_FILENAME,
                format!(
                    "inputs {} and {} both resolve to file name '{}'",
                    first,
                    item.source(),
                    item.filename()
                ),
                Some("input.params".to_string()),
            ));
        }
    }
    Ok(())
}

/// Pure: Shell command fetching every item into `dir`
pub fn fetch_command(items: &[FetchItem], dir: &str, naming: FetchNaming) -> String {
    let commands: Vec<String> = items
        .iter()
        .filter_map(|item| item.command(dir, naming))
        .collect();
    let body = if commands.is_empty() {
        NOTHING_TO_FETCH.to_string()
    } else {
        commands.join(" && ")
    };
    format!("mkdir -p {} && {}", dir, body)
}

fn url_basename(url: &str) -> String {
    url::Url::parse(url)
        .ok()
        .and_then(|u| {
            u.path_segments()
                .and_then(|mut segments| segments.next_back().map(str::to_string))
        })
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| basename(url).to_string())
}

fn basename(path: &str) -> &str {
    path.trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or(path)
}

/// Single-quote `value` unless it only holds characters safe in `sh`
pub(crate) fn shell_quote(value: &str) -> String {
    shell_words::quote(value).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataone::tests::object;
    use crate::recipe::InputParam;

    fn input(params: Vec<InputParam>) -> RecipeInput {
        RecipeInput { params }
    }

    #[test]
    fn test_url_input_downloads() {
        let items =
            fetch_items(&input(vec![InputParam::url("https://example.com/data/a.nc")])).unwrap();
        assert_eq!(
            fetch_command(&items, "/output_dir/", FetchNaming::Server),
            "mkdir -p /output_dir/ && \
             wget --content-disposition -P /output_dir/ https://example.com/data/a.nc"
        );
        assert_eq!(items[0].filename(), "a.nc");
    }

    #[test]
    fn test_pinned_download_saves_under_its_filename() {
        let items = fetch_items(&input(vec![InputParam::url(
            "https://example.com/download?id=5",
        )]))
        .unwrap();
        assert_eq!(items[0].filename(), "download");
        assert_eq!(
            fetch_command(&items, "/mnt/in", FetchNaming::Pinned),
            "mkdir -p /mnt/in && wget -O /mnt/in/download 'https://example.com/download?id=5'"
        );
    }

    #[test]
    fn test_duplicate_filenames_rejected() {
        let items = fetch_items(&input(vec![
            InputParam::url("https://a.example.com/data.nc"),
            InputParam::url("https://b.example.com/data.nc"),
        ]))
        .unwrap();
        let err = ensure_unique_filenames(&items).unwrap_err();
        assert_eq!(err.code(), ErrorCode::COMPILE_DUPLICATE_FILENAME);
        assert!(err.to_string().contains("data.nc"));

        let distinct = fetch_items(&input(vec![
            InputParam::url("https://a.example.com/one.nc"),
            InputParam::new(InputKind::FileSystem, "/data/two.nc"),
        ]))
        .unwrap();
        assert!(ensure_unique_filenames(&distinct).is_ok());
    }

    #[test]
    fn test_mixed_inputs_join_in_order() {
        let items = fetch_items(&input(vec![
            InputParam::url("https://example.com/a.nc"),
            InputParam::new(InputKind::FileSystem, "/data/local/b.csv"),
            InputParam::new(InputKind::PvcMount, "/mnt/shared/c.tif"),
        ]))
        .unwrap();
        assert_eq!(items.len(), 3);
        assert_eq!(
            fetch_command(&items, "/output_dir/", FetchNaming::Server),
            "mkdir -p /output_dir/ && \
             wget --content-disposition -P /output_dir/ https://example.com/a.nc && \
             cp /data/local/b.csv /output_dir/b.csv"
        );
    }

    #[test]
    fn test_only_mounted_inputs_fetch_nothing() {
        let items =
            fetch_items(&input(vec![InputParam::new(InputKind::PvcMount, "/mnt/x")])).unwrap();
        assert_eq!(
            fetch_command(&items, "/output_dir/", FetchNaming::Server),
            "mkdir -p /output_dir/ && echo 'No input files to fetch'"
        );
        assert_eq!(items[0].input_path("/ignored"), "/mnt/x");
    }

    #[test]
    fn test_resolved_dataset_expands_to_downloads() {
        let mut param = InputParam::dataone("resource_map_doi:10.1/X", None);
        param.resolved = vec![object("one.nc"), object("two.nc")];
        let items = fetch_items(&input(vec![param])).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[1].source(), "https://test.org/two.nc");
        assert_eq!(items[1].filename(), "two.nc");
    }

    #[test]
    fn test_unresolved_dataset_is_resolution_error() {
        let err = fetch_items(&input(vec![InputParam::dataone("resource_map_doi:10.1/X", None)]))
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::RESOLUTION_UNRESOLVED);
    }

    #[test]
    fn test_unknown_kind_is_unsupported() {
        let err = fetch_items(&input(vec![InputParam::new(
            InputKind::Unknown("unknown".to_string()),
            "foo",
        )]))
        .unwrap_err();
        assert!(matches!(err, RunnerError::UnsupportedInput { .. }));
    }

    #[test]
    fn test_shell_quote() {
        assert_eq!(shell_quote("https://a.b/c?d=1"), "'https://a.b/c?d=1'");
        assert_eq!(shell_quote("plain.nc"), "plain.nc");
        assert!(shell_quote("two words").starts_with('\''));
    }
}
