//! Embedding error types.

use thiserror::Error;

/// Errors from embedding providers.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    /// Input had no embeddable text
    #[error("Empty input text")]
    EmptyInput,

    /// Provider returned a vector of unexpected length
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Provider returned no usable vector
    #[error("Provider error: {0}")]
    Provider(String),

    /// Provider call exceeded its deadline
    #[error("Embedding call timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// HTTP transport error
    #[error("Request error: {0}")]
    Request(#[from] reqwest::Error),
}
