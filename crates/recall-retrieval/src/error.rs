//! Retrieval error types.

use thiserror::Error;

/// Errors from the retrieval service.
///
/// Embedding failures are not represented here: they degrade to an
/// empty result set instead of propagating.
#[derive(Debug, Error)]
pub enum RetrievalError {
    /// Index search failed
    #[error("Index error: {0}")]
    Index(#[from] recall_index::IndexError),
}
