//! Drain-cycle reports and pipeline statistics.

use thiserror::Error;

use recall_embeddings::EmbeddingError;
use recall_index::IndexError;
use recall_store::StoreError;

/// Why an item was dropped during a drain cycle.
#[derive(Debug, Error)]
pub enum FailureReason {
    /// No embeddable text could be extracted from the item
    #[error("no embeddable text")]
    EmptyContent,

    /// The embedding provider failed or timed out
    #[error("embedding failed: {0}")]
    EmbedFailed(#[from] EmbeddingError),

    /// The write-ahead record could not be stored
    #[error("store write failed: {0}")]
    Storage(#[from] StoreError),

    /// The index rejected the merge
    #[error("index merge failed: {0}")]
    Index(#[from] IndexError),
}

/// Aggregate outcome of one drain cycle.
///
/// Per-item failures are isolated: a dropped item is recorded here while
/// the rest of the batch proceeds.
#[derive(Debug, Default)]
pub struct BatchReport {
    /// Ids merged into the index and marked processed
    pub merged: Vec<u64>,
    /// Ids dropped, with reasons
    pub failed: Vec<(u64, FailureReason)>,
}

impl BatchReport {
    /// Check if the cycle handled no items at all.
    pub fn is_empty(&self) -> bool {
        self.merged.is_empty() && self.failed.is_empty()
    }

    /// Total items handled (merged + dropped).
    pub fn total(&self) -> usize {
        self.merged.len() + self.failed.len()
    }
}

/// Read-only ingestion statistics.
///
/// Safe to read concurrently with an active drain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineStats {
    /// Records in the durable store
    pub total_items: usize,
    /// Records merged into the live index
    pub processed_items: usize,
    /// Items enqueued but not yet drained
    pub queue_depth: usize,
}
