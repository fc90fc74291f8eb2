//! Vector index error types.

use thiserror::Error;

/// Errors that can occur during index operations.
#[derive(Debug, Error)]
pub enum IndexError {
    /// Vector length disagrees with the configured dimension
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Insert of an external id already present without replace semantics
    #[error("Duplicate external id: {0}")]
    DuplicateId(u64),

    /// Update referencing an unknown external id
    #[error("External id not found: {0}")]
    NotFound(u64),

    /// Snapshot pair is incomplete, unreadable, or internally inconsistent
    #[error("Snapshot corrupt: {0}")]
    SnapshotCorrupt(String),

    /// Index lock was poisoned by a panicking holder
    #[error("Index lock poisoned")]
    Lock,

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}
