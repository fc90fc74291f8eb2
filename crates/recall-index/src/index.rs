//! Vector index service.
//!
//! Owns the mapping between external item ids and backend slots and
//! serializes all backend access behind one exclusive lock. The lock
//! covers reads as well as writes: the backend is not guaranteed safe
//! for read-during-write, so search concurrency is traded away for
//! correctness. Update performs remove + re-insert under a single lock
//! acquisition, so a concurrent search can never observe the gap.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use tracing::{debug, info};

use recall_embeddings::Embedding;

use crate::backend::{FlatBackend, VectorBackend};
use crate::error::IndexError;
use crate::metric::Metric;

/// Snapshot file holding the backend's serialized state.
const INDEX_FILE: &str = "flat.index";
/// Snapshot file holding the (slot, external_id) mapping.
const MAP_FILE: &str = "flat.map";

/// Vector index configuration.
#[derive(Debug, Clone)]
pub struct IndexConfig {
    /// Vector dimension (must match the embedder output)
    pub dimension: usize,
    /// Similarity metric
    pub metric: Metric,
    /// Directory holding the snapshot pair
    pub index_path: PathBuf,
}

impl IndexConfig {
    pub fn new(dimension: usize, index_path: impl Into<PathBuf>) -> Self {
        Self {
            dimension,
            metric: Metric::Cosine,
            index_path: index_path.into(),
        }
    }

    pub fn with_metric(mut self, metric: Metric) -> Self {
        self.metric = metric;
        self
    }
}

/// A single search hit.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    /// Caller-assigned external id
    pub external_id: u64,
    /// Similarity score; higher is better, range depends on the metric
    pub score: f32,
}

/// Index statistics.
#[derive(Debug, Clone, Default)]
pub struct IndexStats {
    /// Number of vectors in the index
    pub vector_count: usize,
    /// Configured vector dimension
    pub dimension: usize,
    /// Snapshot size on disk in bytes
    pub size_bytes: u64,
}

/// Aggregate outcome of a batch insert.
///
/// Per-item failures are isolated: a failed item is skipped and recorded
/// here while the rest of the batch proceeds.
#[derive(Debug, Default)]
pub struct InsertOutcome {
    /// Ids inserted successfully
    pub inserted: Vec<u64>,
    /// Ids rejected, with reasons
    pub failed: Vec<(u64, IndexError)>,
}

struct IndexInner {
    backend: Box<dyn VectorBackend>,
    id_to_slot: HashMap<u64, usize>,
    slot_to_id: BTreeMap<usize, u64>,
}

impl IndexInner {
    fn reset(&mut self) {
        self.backend.clear();
        self.id_to_slot.clear();
        self.slot_to_id.clear();
    }
}

/// Thread-safe similarity index over a pluggable backend.
pub struct VectorIndex {
    inner: Mutex<IndexInner>,
    config: IndexConfig,
}

impl VectorIndex {
    /// Create an empty index with a flat exact-scan backend.
    pub fn new(config: IndexConfig) -> Self {
        let backend = Box::new(FlatBackend::new(config.dimension, config.metric));
        Self::with_backend(config, backend)
    }

    /// Create an empty index over a caller-supplied backend.
    pub fn with_backend(config: IndexConfig, backend: Box<dyn VectorBackend>) -> Self {
        Self {
            inner: Mutex::new(IndexInner {
                backend,
                id_to_slot: HashMap::new(),
                slot_to_id: BTreeMap::new(),
            }),
            config,
        }
    }

    /// Create an index and load the snapshot at `config.index_path` if
    /// one exists.
    pub fn open(config: IndexConfig) -> Result<Self, IndexError> {
        let index = Self::new(config);
        index.load()?;
        Ok(index)
    }

    fn lock(&self) -> Result<MutexGuard<'_, IndexInner>, IndexError> {
        self.inner.lock().map_err(|_| IndexError::Lock)
    }

    /// Get the configured dimension.
    pub fn dimension(&self) -> usize {
        self.config.dimension
    }

    /// Get the configured metric.
    pub fn metric(&self) -> Metric {
        self.config.metric
    }

    /// Number of vectors in the index.
    pub fn len(&self) -> Result<usize, IndexError> {
        Ok(self.lock()?.backend.len())
    }

    /// Check if the index is empty.
    pub fn is_empty(&self) -> Result<bool, IndexError> {
        Ok(self.lock()?.backend.is_empty())
    }

    /// Check if an external id is indexed.
    pub fn contains(&self, external_id: u64) -> Result<bool, IndexError> {
        Ok(self.lock()?.id_to_slot.contains_key(&external_id))
    }

    fn check_dimension(&self, embedding: &Embedding) -> Result<(), IndexError> {
        if embedding.dimension() != self.config.dimension {
            return Err(IndexError::DimensionMismatch {
                expected: self.config.dimension,
                actual: embedding.dimension(),
            });
        }
        Ok(())
    }

    /// Insert a batch of (external_id, vector) pairs.
    ///
    /// A vector of the wrong dimension or an already-present id is
    /// skipped and reported in the outcome; it never aborts the batch
    /// and leaves the index unchanged for that item. Use [`Self::update`]
    /// or [`Self::merge`] for replace semantics.
    pub fn insert(&self, vectors: Vec<(u64, Embedding)>) -> Result<InsertOutcome, IndexError> {
        let mut inner = self.lock()?;
        let mut outcome = InsertOutcome::default();

        for (id, embedding) in vectors {
            if let Err(e) = self.check_dimension(&embedding) {
                outcome.failed.push((id, e));
                continue;
            }
            if inner.id_to_slot.contains_key(&id) {
                outcome.failed.push((id, IndexError::DuplicateId(id)));
                continue;
            }

            let slot = inner.backend.insert(self.config.metric.prepare(embedding.values));
            inner.id_to_slot.insert(id, slot);
            inner.slot_to_id.insert(slot, id);
            outcome.inserted.push(id);
        }

        debug!(
            inserted = outcome.inserted.len(),
            failed = outcome.failed.len(),
            "Insert batch complete"
        );
        Ok(outcome)
    }

    /// Replace the vector for an existing external id.
    ///
    /// Returns `NotFound` if the id is not indexed. The old vector is
    /// removed and the new one inserted under the same lock acquisition.
    pub fn update(&self, external_id: u64, embedding: Embedding) -> Result<bool, IndexError> {
        self.check_dimension(&embedding)?;

        let mut inner = self.lock()?;
        let slot = *inner
            .id_to_slot
            .get(&external_id)
            .ok_or(IndexError::NotFound(external_id))?;

        inner.backend.remove(slot);
        inner.slot_to_id.remove(&slot);

        let new_slot = inner.backend.insert(self.config.metric.prepare(embedding.values));
        inner.id_to_slot.insert(external_id, new_slot);
        inner.slot_to_id.insert(new_slot, external_id);

        debug!(external_id = external_id, "Updated vector");
        Ok(true)
    }

    /// Insert or replace under one lock acquisition.
    ///
    /// Re-merging an id that is already present replaces its vector
    /// instead of duplicating the entry, which makes recovery replay
    /// idempotent.
    pub fn merge(&self, external_id: u64, embedding: Embedding) -> Result<(), IndexError> {
        self.check_dimension(&embedding)?;

        let mut inner = self.lock()?;
        if let Some(slot) = inner.id_to_slot.remove(&external_id) {
            inner.backend.remove(slot);
            inner.slot_to_id.remove(&slot);
        }

        let slot = inner.backend.insert(self.config.metric.prepare(embedding.values));
        inner.id_to_slot.insert(external_id, slot);
        inner.slot_to_id.insert(slot, external_id);

        debug!(external_id = external_id, "Merged vector");
        Ok(())
    }

    /// Remove an external id from the index.
    ///
    /// Idempotent: removing an unknown id returns `false`, not an error.
    pub fn remove(&self, external_id: u64) -> Result<bool, IndexError> {
        let mut inner = self.lock()?;
        match inner.id_to_slot.remove(&external_id) {
            Some(slot) => {
                inner.backend.remove(slot);
                inner.slot_to_id.remove(&slot);
                debug!(external_id = external_id, "Removed vector");
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Search for the `k` most similar entries.
    ///
    /// Results are ordered by descending score; entries scoring below
    /// `threshold` are excluded. An empty index yields an empty result,
    /// never an error.
    pub fn search(
        &self,
        query: &Embedding,
        k: usize,
        threshold: Option<f32>,
    ) -> Result<Vec<SearchHit>, IndexError> {
        self.check_dimension(query)?;

        let inner = self.lock()?;
        if inner.backend.is_empty() {
            return Ok(Vec::new());
        }

        let prepared = self.config.metric.prepare(query.values.clone());
        let hits = inner
            .backend
            .search(&prepared, k)
            .into_iter()
            .filter(|(_, score)| threshold.map_or(true, |t| *score >= t))
            .filter_map(|(slot, score)| {
                inner.slot_to_id.get(&slot).map(|&external_id| SearchHit {
                    external_id,
                    score,
                })
            })
            .collect();

        Ok(hits)
    }

    fn index_file(&self) -> PathBuf {
        self.config.index_path.join(INDEX_FILE)
    }

    fn map_file(&self) -> PathBuf {
        self.config.index_path.join(MAP_FILE)
    }

    /// Persist the backend snapshot and id mapping as a unit.
    ///
    /// Each file is written to a temp path and renamed into place, so a
    /// failed save leaves the previous snapshot intact.
    pub fn save(&self) -> Result<(), IndexError> {
        let inner = self.lock()?;

        std::fs::create_dir_all(&self.config.index_path)?;
        let index_bytes = inner.backend.to_bytes()?;
        let pairs: Vec<(usize, u64)> = inner
            .slot_to_id
            .iter()
            .map(|(&slot, &id)| (slot, id))
            .collect();
        let map_bytes =
            serde_json::to_vec(&pairs).map_err(|e| IndexError::Serialization(e.to_string()))?;

        write_atomic(&self.index_file(), &index_bytes)?;
        write_atomic(&self.map_file(), &map_bytes)?;

        info!(
            vectors = inner.backend.len(),
            path = ?self.config.index_path,
            "Saved index snapshot"
        );
        Ok(())
    }

    /// Load the snapshot pair at the configured path.
    ///
    /// Returns `Ok(false)` when neither file exists (start empty).
    /// Exactly one file present, or files that disagree with each other
    /// or with the configured dimension/metric, is `SnapshotCorrupt`;
    /// the index is left empty in that case.
    pub fn load(&self) -> Result<bool, IndexError> {
        let index_path = self.index_file();
        let map_path = self.map_file();

        match (index_path.exists(), map_path.exists()) {
            (false, false) => {
                debug!(path = ?self.config.index_path, "No snapshot found, starting empty");
                return Ok(false);
            }
            (true, true) => {}
            _ => {
                return Err(IndexError::SnapshotCorrupt(format!(
                    "snapshot pair incomplete under {:?}: {} and {} must exist together",
                    self.config.index_path, INDEX_FILE, MAP_FILE
                )));
            }
        }

        let index_bytes = std::fs::read(&index_path)?;
        let map_bytes = std::fs::read(&map_path)?;
        let pairs: Vec<(usize, u64)> = serde_json::from_slice(&map_bytes)
            .map_err(|e| IndexError::SnapshotCorrupt(e.to_string()))?;

        let mut inner = self.lock()?;
        inner.reset();
        if let Err(e) = inner.backend.restore(&index_bytes) {
            inner.reset();
            return Err(e);
        }
        if inner.backend.len() != pairs.len() {
            let backend_len = inner.backend.len();
            inner.reset();
            return Err(IndexError::SnapshotCorrupt(format!(
                "id map holds {} entries but backend holds {}",
                pairs.len(),
                backend_len
            )));
        }

        inner.slot_to_id = pairs.iter().copied().collect();
        inner.id_to_slot = pairs.iter().map(|&(slot, id)| (id, slot)).collect();

        info!(
            vectors = inner.backend.len(),
            path = ?self.config.index_path,
            "Loaded index snapshot"
        );
        Ok(true)
    }

    /// Get index statistics.
    pub fn stats(&self) -> Result<IndexStats, IndexError> {
        let inner = self.lock()?;
        let size_bytes = [self.index_file(), self.map_file()]
            .iter()
            .filter_map(|p| std::fs::metadata(p).ok())
            .map(|m| m.len())
            .sum();

        Ok(IndexStats {
            vector_count: inner.backend.len(),
            dimension: self.config.dimension,
            size_bytes,
        })
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), IndexError> {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("snapshot");
    let tmp = path.with_file_name(format!("{}.tmp", file_name));
    std::fs::write(&tmp, bytes)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn cosine_index(dim: usize) -> (VectorIndex, TempDir) {
        let temp = TempDir::new().unwrap();
        let index = VectorIndex::new(IndexConfig::new(dim, temp.path()));
        (index, temp)
    }

    fn emb(values: &[f32]) -> Embedding {
        Embedding::new(values.to_vec())
    }

    #[test]
    fn test_three_item_cosine_ranking() {
        let (index, _temp) = cosine_index(4);
        let outcome = index
            .insert(vec![
                (10, emb(&[1.0, 0.0, 0.0, 0.0])),
                (20, emb(&[0.0, 1.0, 0.0, 0.0])),
                (30, emb(&[1.0, 1.0, 0.0, 0.0])),
            ])
            .unwrap();
        assert_eq!(outcome.inserted, vec![10, 20, 30]);
        assert!(outcome.failed.is_empty());

        let hits = index.search(&emb(&[1.0, 0.0, 0.0, 0.0]), 2, None).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].external_id, 10);
        assert!((hits[0].score - 1.0).abs() < 1e-5);
        assert_eq!(hits[1].external_id, 30);
        assert!((hits[1].score - std::f32::consts::FRAC_1_SQRT_2).abs() < 1e-4);
    }

    #[test]
    fn test_dimension_mismatch_leaves_index_unchanged() {
        let (index, _temp) = cosine_index(4);
        index.insert(vec![(1, emb(&[1.0, 0.0, 0.0, 0.0]))]).unwrap();

        let outcome = index.insert(vec![(2, emb(&[1.0, 0.0]))]).unwrap();
        assert!(outcome.inserted.is_empty());
        assert!(matches!(
            outcome.failed[0],
            (2, IndexError::DimensionMismatch { expected: 4, actual: 2 })
        ));
        assert_eq!(index.len().unwrap(), 1);
    }

    #[test]
    fn test_duplicate_id_is_isolated_within_batch() {
        let (index, _temp) = cosine_index(2);
        index.insert(vec![(1, emb(&[1.0, 0.0]))]).unwrap();

        let outcome = index
            .insert(vec![(1, emb(&[0.0, 1.0])), (2, emb(&[0.0, 1.0]))])
            .unwrap();
        assert_eq!(outcome.inserted, vec![2]);
        assert!(matches!(outcome.failed[0], (1, IndexError::DuplicateId(1))));
        assert_eq!(index.len().unwrap(), 2);

        // The original vector for id 1 is untouched
        let hits = index.search(&emb(&[1.0, 0.0]), 1, None).unwrap();
        assert_eq!(hits[0].external_id, 1);
    }

    #[test]
    fn test_update_unknown_id_is_not_found() {
        let (index, _temp) = cosine_index(2);
        let result = index.update(42, emb(&[1.0, 0.0]));
        assert!(matches!(result, Err(IndexError::NotFound(42))));
    }

    #[test]
    fn test_update_replaces_vector() {
        let (index, _temp) = cosine_index(2);
        index.insert(vec![(1, emb(&[1.0, 0.0]))]).unwrap();

        assert!(index.update(1, emb(&[0.0, 1.0])).unwrap());
        assert_eq!(index.len().unwrap(), 1);

        let hits = index.search(&emb(&[0.0, 1.0]), 1, None).unwrap();
        assert_eq!(hits[0].external_id, 1);
        assert!((hits[0].score - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_remove_is_idempotent() {
        let (index, _temp) = cosine_index(2);
        index.insert(vec![(1, emb(&[1.0, 0.0]))]).unwrap();

        assert!(index.remove(1).unwrap());
        assert!(!index.remove(1).unwrap());
        assert!(!index.contains(1).unwrap());
        assert_eq!(index.len().unwrap(), 0);
    }

    #[test]
    fn test_search_empty_index_returns_empty() {
        let (index, _temp) = cosine_index(4);
        let hits = index.search(&emb(&[1.0, 0.0, 0.0, 0.0]), 5, None).unwrap();
        assert!(hits.is_empty());
    }

    #[test]
    fn test_threshold_excludes_low_scores() {
        let (index, _temp) = cosine_index(4);
        index
            .insert(vec![
                (10, emb(&[1.0, 0.0, 0.0, 0.0])),
                (20, emb(&[0.0, 1.0, 0.0, 0.0])),
                (30, emb(&[1.0, 1.0, 0.0, 0.0])),
            ])
            .unwrap();

        let hits = index
            .search(&emb(&[1.0, 0.0, 0.0, 0.0]), 5, Some(0.9))
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].external_id, 10);
        for hit in &hits {
            assert!(hit.score >= 0.9);
        }
    }

    #[test]
    fn test_merge_is_idempotent() {
        let (index, _temp) = cosine_index(2);
        index.merge(1, emb(&[1.0, 0.0])).unwrap();
        index.merge(1, emb(&[1.0, 0.0])).unwrap();

        assert_eq!(index.len().unwrap(), 1);
        let hits = index.search(&emb(&[1.0, 0.0]), 10, None).unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[test]
    fn test_l2_metric_scoring() {
        let temp = TempDir::new().unwrap();
        let index = VectorIndex::new(IndexConfig::new(2, temp.path()).with_metric(Metric::L2));
        index
            .insert(vec![(1, emb(&[0.0, 0.0])), (2, emb(&[1.0, 0.0]))])
            .unwrap();

        let hits = index.search(&emb(&[0.0, 0.0]), 2, None).unwrap();
        assert_eq!(hits[0].external_id, 1);
        assert!((hits[0].score - 1.0).abs() < 1e-6);
        // Squared distance 1 -> legacy score 0.5
        assert_eq!(hits[1].external_id, 2);
        assert!((hits[1].score - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_save_load_roundtrip_preserves_results() {
        let temp = TempDir::new().unwrap();
        let config = IndexConfig::new(4, temp.path());

        let index = VectorIndex::new(config.clone());
        index
            .insert(vec![
                (10, emb(&[1.0, 0.0, 0.0, 0.0])),
                (20, emb(&[0.0, 1.0, 0.0, 0.0])),
                (30, emb(&[1.0, 1.0, 0.0, 0.0])),
            ])
            .unwrap();
        index.remove(20).unwrap();
        index.save().unwrap();

        let before = index.search(&emb(&[1.0, 0.0, 0.0, 0.0]), 5, None).unwrap();

        let reloaded = VectorIndex::open(config).unwrap();
        assert_eq!(reloaded.len().unwrap(), 2);
        let after = reloaded
            .search(&emb(&[1.0, 0.0, 0.0, 0.0]), 5, None)
            .unwrap();

        assert_eq!(before.len(), after.len());
        for (b, a) in before.iter().zip(after.iter()) {
            assert_eq!(b.external_id, a.external_id);
            assert!((b.score - a.score).abs() < 1e-6);
        }
    }

    #[test]
    fn test_load_missing_snapshot_starts_empty() {
        let temp = TempDir::new().unwrap();
        let index = VectorIndex::new(IndexConfig::new(4, temp.path()));
        assert!(!index.load().unwrap());
        assert_eq!(index.len().unwrap(), 0);
    }

    #[test]
    fn test_load_half_snapshot_is_corrupt() {
        let temp = TempDir::new().unwrap();
        let config = IndexConfig::new(2, temp.path());

        let index = VectorIndex::new(config.clone());
        index.insert(vec![(1, emb(&[1.0, 0.0]))]).unwrap();
        index.save().unwrap();

        std::fs::remove_file(temp.path().join(MAP_FILE)).unwrap();

        let fresh = VectorIndex::new(config);
        let result = fresh.load();
        assert!(matches!(result, Err(IndexError::SnapshotCorrupt(_))));
        assert_eq!(fresh.len().unwrap(), 0);
    }

    #[test]
    fn test_failed_save_keeps_previous_snapshot() {
        let temp = TempDir::new().unwrap();
        let config = IndexConfig::new(2, temp.path());

        let index = VectorIndex::new(config.clone());
        index.insert(vec![(1, emb(&[1.0, 0.0]))]).unwrap();
        index.save().unwrap();

        // Snapshot files survive an aborted rewrite: temp files are
        // separate paths, so the committed pair is intact.
        let reloaded = VectorIndex::open(config).unwrap();
        assert_eq!(reloaded.len().unwrap(), 1);
    }

    #[test]
    fn test_update_has_no_observable_gap() {
        let temp = TempDir::new().unwrap();
        let index = Arc::new(VectorIndex::new(IndexConfig::new(2, temp.path())));
        index.insert(vec![(1, emb(&[1.0, 0.0]))]).unwrap();

        let searcher = {
            let index = Arc::clone(&index);
            std::thread::spawn(move || {
                for _ in 0..500 {
                    let hits = index.search(&emb(&[1.0, 0.0]), 2, None).unwrap();
                    assert!(
                        hits.iter().any(|h| h.external_id == 1),
                        "search observed the update gap"
                    );
                }
            })
        };

        for i in 0..500 {
            let v = if i % 2 == 0 { [1.0, 0.0] } else { [0.8, 0.2] };
            index.update(1, emb(&v)).unwrap();
        }

        searcher.join().unwrap();
    }
}
