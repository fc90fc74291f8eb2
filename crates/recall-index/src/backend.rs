//! Pluggable similarity-search backends.
//!
//! A backend owns the vectors and slot assignment; the id mapping
//! between slots and external ids belongs to the index service layer.

use serde::{Deserialize, Serialize};

use crate::error::IndexError;
use crate::metric::Metric;

/// A similarity-search backend.
///
/// Slots are assigned monotonically and never reused within an instance;
/// removal leaves a hole. Vectors arriving here are already prepared for
/// the backend's metric (normalized for cosine).
pub trait VectorBackend: Send {
    /// Configured vector dimension.
    fn dimension(&self) -> usize;

    /// Number of live vectors.
    fn len(&self) -> usize;

    /// Check if the backend holds no live vectors.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Insert a prepared vector, returning its slot.
    fn insert(&mut self, vector: Vec<f32>) -> usize;

    /// Remove the vector at `slot`. Returns false if the slot is empty.
    fn remove(&mut self, slot: usize) -> bool;

    /// Find the `k` best-scoring live vectors for `query`.
    /// Returns (slot, score) pairs ordered by descending score.
    fn search(&self, query: &[f32], k: usize) -> Vec<(usize, f32)>;

    /// Serialize the backend state.
    fn to_bytes(&self) -> Result<Vec<u8>, IndexError>;

    /// Replace the backend state from a serialized snapshot.
    /// Fails if the snapshot was built for a different dimension or metric.
    fn restore(&mut self, bytes: &[u8]) -> Result<(), IndexError>;

    /// Drop all vectors and slot assignments.
    fn clear(&mut self);
}

/// Exact-scan backend over dense slot storage.
///
/// Every live vector is scored against the query, O(n * d) per search.
/// Adequate into the low hundreds of thousands of vectors; beyond that,
/// swap in an ANN structure behind [`VectorBackend`].
#[derive(Debug, Serialize, Deserialize)]
pub struct FlatBackend {
    dimension: usize,
    metric: Metric,
    slots: Vec<Option<Vec<f32>>>,
    live: usize,
}

impl FlatBackend {
    /// Create an empty backend.
    pub fn new(dimension: usize, metric: Metric) -> Self {
        Self {
            dimension,
            metric,
            slots: Vec::new(),
            live: 0,
        }
    }

    /// The metric this backend scores with.
    pub fn metric(&self) -> Metric {
        self.metric
    }
}

impl VectorBackend for FlatBackend {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn len(&self) -> usize {
        self.live
    }

    fn insert(&mut self, vector: Vec<f32>) -> usize {
        self.slots.push(Some(vector));
        self.live += 1;
        self.slots.len() - 1
    }

    fn remove(&mut self, slot: usize) -> bool {
        match self.slots.get_mut(slot) {
            Some(entry) if entry.is_some() => {
                *entry = None;
                self.live -= 1;
                true
            }
            _ => false,
        }
    }

    fn search(&self, query: &[f32], k: usize) -> Vec<(usize, f32)> {
        let mut scored: Vec<(usize, f32)> = self
            .slots
            .iter()
            .enumerate()
            .filter_map(|(slot, entry)| {
                entry
                    .as_ref()
                    .map(|vector| (slot, self.metric.score(query, vector)))
            })
            .collect();

        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);
        scored
    }

    fn to_bytes(&self) -> Result<Vec<u8>, IndexError> {
        serde_json::to_vec(self).map_err(|e| IndexError::Serialization(e.to_string()))
    }

    fn restore(&mut self, bytes: &[u8]) -> Result<(), IndexError> {
        let restored: FlatBackend = serde_json::from_slice(bytes)
            .map_err(|e| IndexError::SnapshotCorrupt(e.to_string()))?;

        if restored.dimension != self.dimension || restored.metric != self.metric {
            return Err(IndexError::SnapshotCorrupt(format!(
                "snapshot built for dimension {} / metric {}, index configured for {} / {}",
                restored.dimension, restored.metric, self.dimension, self.metric
            )));
        }

        *self = restored;
        Ok(())
    }

    fn clear(&mut self) {
        self.slots.clear();
        self.live = 0;
    }
}
