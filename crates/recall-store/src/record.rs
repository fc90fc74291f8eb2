//! Persisted vector records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A durably stored vector and its merge status.
///
/// `processed = false` marks the window between the write-ahead store
/// write and the index merge; a crash inside that window is recovered
/// by replaying the record. The flag flips to `true` exactly once, on a
/// successful merge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedRecord {
    /// Caller-assigned external id
    pub external_id: u64,
    /// Embedding vector
    pub vector: Vec<f32>,
    /// When the record was written (milliseconds since epoch)
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    /// Whether the vector has been merged into the live index
    pub processed: bool,
}

impl PersistedRecord {
    /// Create an unprocessed record for a freshly embedded vector.
    pub fn pending(external_id: u64, vector: Vec<f32>) -> Self {
        Self {
            external_id,
            vector,
            created_at: Utc::now(),
            processed: false,
        }
    }

    /// Dimension of the stored vector.
    pub fn dimension(&self) -> usize {
        self.vector.len()
    }
}
