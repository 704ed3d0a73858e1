//! Task, result and outcome types for extraction

use crate::metrics::RunMetrics;
use pactum_domain::{ContractRecord, LineItem};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// One chunk waiting to be sent to the reasoning service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionTask {
    /// One-based, global position of the chunk in the document
    pub chunk_index: usize,

    /// Chunk text, shared with the operation without copying
    pub chunk_text: Arc<str>,
}

impl ExtractionTask {
    /// Create a task
    pub fn new(chunk_index: usize, chunk_text: impl Into<Arc<str>>) -> Self {
        Self {
            chunk_index,
            chunk_text: chunk_text.into(),
        }
    }

    /// Number tasks from 1 in chunk order
    pub fn from_chunks<I, S>(chunks: I) -> Vec<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<Arc<str>>,
    {
        chunks
            .into_iter()
            .enumerate()
            .map(|(i, text)| Self::new(i + 1, text))
            .collect()
    }
}

/// Terminal result of one task
///
/// Exactly one of `value` and `error` is set.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionResult<T> {
    /// Index of the originating task
    pub chunk_index: usize,

    /// Parsed value on success
    pub value: Option<T>,

    /// Last error message on failure
    pub error: Option<String>,

    /// Service calls made for this task
    pub attempts: u32,
}

impl<T> ExtractionResult<T> {
    /// Successful result
    pub fn success(chunk_index: usize, value: T, attempts: u32) -> Self {
        Self {
            chunk_index,
            value: Some(value),
            error: None,
            attempts,
        }
    }

    /// Failed result
    pub fn failure(chunk_index: usize, error: impl Into<String>, attempts: u32) -> Self {
        Self {
            chunk_index,
            value: None,
            error: Some(error.into()),
            attempts,
        }
    }

    /// Whether a value was produced
    pub fn is_success(&self) -> bool {
        self.value.is_some()
    }
}

/// A chunk that produced nothing
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChunkFailure {
    /// Index of the failed chunk
    pub chunk_index: usize,

    /// Last error message
    pub error: String,

    /// Service calls made
    pub attempts: u32,
}

impl ChunkFailure {
    /// Collect the failures out of a result list
    pub fn collect<T>(results: &[ExtractionResult<T>]) -> Vec<Self> {
        results
            .iter()
            .filter(|r| r.value.is_none())
            .map(|r| Self {
                chunk_index: r.chunk_index,
                error: r.error.clone().unwrap_or_default(),
                attempts: r.attempts,
            })
            .collect()
    }
}

/// How the canonical record was produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeStrategy {
    /// Exactly one chunk succeeded; its record is returned as is
    Single,
    /// The reasoning service merged the records
    ServiceAssisted,
    /// The service merge failed; records were merged locally
    Deterministic,
}

impl fmt::Display for MergeStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MergeStrategy::Single => "single",
            MergeStrategy::ServiceAssisted => "service-assisted",
            MergeStrategy::Deterministic => "deterministic",
        };
        f.write_str(name)
    }
}

/// Result of record extraction for one document
#[derive(Debug, Clone, Serialize)]
pub struct RecordOutcome {
    /// Canonical record
    pub record: ContractRecord,

    /// Strategy that produced the record
    pub strategy: MergeStrategy,

    /// Chunks the document was split into
    pub chunk_count: usize,

    /// Chunks that failed
    pub failures: Vec<ChunkFailure>,

    /// Scheduler counters
    pub metrics: RunMetrics,
}

/// Result of line item extraction for one document
#[derive(Debug, Clone, Serialize)]
pub struct LineItemOutcome {
    /// Deduplicated items in document order
    pub items: Vec<LineItem>,

    /// Chunks the document was split into
    pub chunk_count: usize,

    /// Chunks that failed
    pub failures: Vec<ChunkFailure>,

    /// Scheduler counters
    pub metrics: RunMetrics,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tasks_numbered_from_one() {
        let tasks = ExtractionTask::from_chunks(vec!["a".to_string(), "b".to_string()]);
        assert_eq!(tasks[0].chunk_index, 1);
        assert_eq!(tasks[1].chunk_index, 2);
        assert_eq!(&*tasks[1].chunk_text, "b");
    }

    #[test]
    fn test_failures_collected() {
        let results = vec![
            ExtractionResult::success(1, (), 1),
            ExtractionResult::failure(2, "timeout", 5),
        ];
        let failures = ChunkFailure::collect(&results);
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].chunk_index, 2);
        assert_eq!(failures[0].attempts, 5);
    }

    #[test]
    fn test_strategy_display() {
        assert_eq!(MergeStrategy::ServiceAssisted.to_string(), "service-assisted");
    }
}
