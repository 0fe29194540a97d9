//! Pure partition planning for parallel recipe execution
//!
//! Files are grouped into contiguous, order-preserving chunks. No shuffling
//! and no size balancing: the last partition simply holds the remainder.
//! Identical input always yields identical partitions in identical order, so
//! recompiling a recipe for a retry reproduces the same plan.

use crate::error::{ErrorCode, Result, RunnerError};
use std::collections::BTreeMap;
use tracing::info;

/// A bounded subset of input files processed together by one task
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePartition {
    /// 0-based position in the order partitions were produced
    pub partition_id: usize,
    pub files: Vec<String>,
    /// Name of the processing stage this partition belongs to
    pub execution_function: String,
    /// Informational counts
    pub metadata: BTreeMap<String, usize>,
}

impl FilePartition {
    pub fn num_files(&self) -> usize {
        self.files.len()
    }
}

/// Pure: Split `files` into partitions of at most `size` files
///
/// The i-th partition holds `files[i*size .. (i+1)*size]`. A `size` below 1
/// is clamped to 1. Fails only when `files` is empty.
pub fn partition(files: &[String], size: i64, function_name: &str) -> Result<Vec<FilePartition>> {
    if files.is_empty() {
        return Err(RunnerError::validation_with_code(
            ErrorCode::COMPILE_EMPTY_PARTITION_INPUT,
            format!("No files provided for execution function '{}'", function_name),
            None,
        ));
    }

    let size = clamp_size(size);
    let partitions: Vec<FilePartition> = files
        .chunks(size)
        .enumerate()
        .map(|(partition_id, chunk)| FilePartition {
            partition_id,
            files: chunk.to_vec(),
            execution_function: function_name.to_string(),
            metadata: BTreeMap::from([("num_files".to_string(), chunk.len())]),
        })
        .collect();

    info!(
        "Created {} partitions for {} (partition_size={})",
        partitions.len(),
        function_name,
        size
    );

    Ok(partitions)
}

/// Pure: Number of partitions `partition` will produce
pub fn partition_count(num_files: usize, size: i64) -> usize {
    num_files.div_ceil(clamp_size(size))
}

fn clamp_size(size: i64) -> usize {
    size.max(1) as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    fn files(n: usize) -> Vec<String> {
        (1..=n)
            .map(|i| format!("https://example.com/file{}.txt", i))
            .collect()
    }

    #[test]
    fn test_partition_sizes() {
        let partitions = partition(&files(5), 2, "cmd-0").unwrap();
        assert_eq!(partitions.len(), 3);
        assert_eq!(
            partitions.iter().map(|p| p.files.len()).collect::<Vec<_>>(),
            vec![2, 2, 1]
        );
        assert_eq!(
            partitions.iter().map(|p| p.partition_id).collect::<Vec<_>>(),
            vec![0, 1, 2]
        );
        assert_eq!(partitions[2].metadata["num_files"], 1);
        assert!(partitions.iter().all(|p| p.execution_function == "cmd-0"));
    }

    #[test]
    fn test_partition_preserves_order() {
        let input = files(5);
        let partitions = partition(&input, 2, "cmd-0").unwrap();
        let flattened: Vec<String> = partitions.into_iter().flat_map(|p| p.files).collect();
        assert_eq!(flattened, input);
    }

    #[test]
    fn test_partition_is_deterministic() {
        let input = files(7);
        assert_eq!(
            partition(&input, 3, "cmd-1").unwrap(),
            partition(&input, 3, "cmd-1").unwrap()
        );
    }

    #[test]
    fn test_partition_counts_match_ceiling() {
        for n in 1..=12 {
            for size in 1..=5 {
                let input = files(n);
                let partitions = partition(&input, size, "cmd-0").unwrap();
                assert_eq!(partitions.len(), partition_count(n, size));
                assert_eq!(partitions.len(), n.div_ceil(size as usize));
                assert_eq!(partitions.iter().map(|p| p.num_files()).sum::<usize>(), n);
            }
        }
    }

    #[test]
    fn test_size_below_one_is_clamped() {
        let input = files(3);
        let expected = partition(&input, 1, "cmd-0").unwrap();
        assert_eq!(partition(&input, 0, "cmd-0").unwrap(), expected);
        assert_eq!(partition(&input, -4, "cmd-0").unwrap(), expected);
    }

    #[test]
    fn test_size_at_least_len_gives_one_partition() {
        let input = files(3);
        assert_eq!(partition(&input, 3, "cmd-0").unwrap().len(), 1);
        assert_eq!(partition(&input, 100, "cmd-0").unwrap().len(), 1);
    }

    #[test]
    fn test_empty_input_fails_for_any_size() {
        for size in [-1, 0, 1, 10] {
            let err = partition(&[], size, "cmd-0").unwrap_err();
            assert_eq!(err.code(), ErrorCode::COMPILE_EMPTY_PARTITION_INPUT);
            assert!(err.to_string().contains("No files provided"));
        }
    }
}
