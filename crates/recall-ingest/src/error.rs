//! Ingestion error types.

use thiserror::Error;

/// Structural errors from the ingestion pipeline.
///
/// Per-item drops during a drain are not errors; they are reported in
/// [`crate::BatchReport`].
#[derive(Debug, Error)]
pub enum IngestError {
    /// Index operation failed
    #[error("Index error: {0}")]
    Index(#[from] recall_index::IndexError),

    /// Durable store operation failed
    #[error("Store error: {0}")]
    Store(#[from] recall_store::StoreError),

    /// The pipeline worker is no longer running
    #[error("Pipeline is shut down")]
    Closed,

    /// The worker task panicked or was aborted
    #[error("Pipeline worker terminated abnormally")]
    WorkerTerminated,
}
