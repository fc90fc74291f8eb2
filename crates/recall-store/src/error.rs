//! Durable store error types.

use thiserror::Error;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// RocksDB error
    #[error("Database error: {0}")]
    Database(#[from] rocksdb::Error),

    /// Column family handle missing
    #[error("Column family not found: {0}")]
    ColumnFamilyNotFound(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Stored key is not a valid external id
    #[error("Corrupt record key")]
    CorruptKey,

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
