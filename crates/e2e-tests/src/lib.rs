//! End-to-end test infrastructure for recall.
//!
//! Provides a shared TestHarness and a deterministic embedder for tests
//! covering the full enqueue-to-query pipeline.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;

use recall_embeddings::{Embedder, Embedding, EmbeddingError};
use recall_index::{IndexConfig, VectorIndex};
use recall_store::DurableStore;

/// Shared test harness for E2E tests.
///
/// Owns the temp directory, the durable store, and the index snapshot
/// path so tests can simulate restarts by rebuilding the index over the
/// same paths.
pub struct TestHarness {
    /// Keeps the temp dir alive for the lifetime of the harness
    pub _temp_dir: tempfile::TempDir,
    /// Shared durable store
    pub store: Arc<DurableStore>,
    /// Snapshot directory for the vector index
    pub index_path: PathBuf,
}

/// Install a tracing subscriber for test debugging.
///
/// Honors `RUST_LOG`; safe to call from any number of tests.
pub fn init_tracing() {
    use std::sync::Once;
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init();
    });
}

impl TestHarness {
    /// Create a new harness with a temp directory and open store.
    pub fn new() -> Self {
        init_tracing();
        let temp_dir = tempfile::TempDir::new().expect("Failed to create temp dir");
        let store = Arc::new(
            DurableStore::open(temp_dir.path().join("store")).expect("Failed to open test store"),
        );
        let index_path = temp_dir.path().join("vector-index");

        Self {
            _temp_dir: temp_dir,
            store,
            index_path,
        }
    }

    /// Build a fresh index over this harness's snapshot directory.
    ///
    /// The index is created empty; recovery or an explicit `load` pulls
    /// in any snapshot a previous instance saved.
    pub fn build_index(&self, dimension: usize) -> Arc<VectorIndex> {
        Arc::new(VectorIndex::new(IndexConfig::new(
            dimension,
            &self.index_path,
        )))
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// Deterministic embedder for tests.
///
/// Each vocabulary word gets its own axis; every other token adds a
/// small weight on a shared catch-all axis. Identical texts embed
/// identically and vocabulary overlap dominates similarity, so ranking
/// assertions are exact. No network, no model.
pub struct VocabEmbedder {
    vocab: HashMap<String, usize>,
    dimension: usize,
}

impl VocabEmbedder {
    pub fn new(words: &[&str]) -> Self {
        let vocab: HashMap<String, usize> = words
            .iter()
            .enumerate()
            .map(|(axis, word)| (word.to_string(), axis))
            .collect();
        let dimension = words.len() + 1;
        Self { vocab, dimension }
    }
}

#[async_trait]
impl Embedder for VocabEmbedder {
    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, text: &str) -> Result<Embedding, EmbeddingError> {
        if text.trim().is_empty() {
            return Err(EmbeddingError::EmptyInput);
        }

        let mut values = vec![0.0f32; self.dimension];
        for token in text.to_lowercase().split_whitespace() {
            match self.vocab.get(token) {
                Some(&axis) => values[axis] += 1.0,
                None => values[self.dimension - 1] += 0.1,
            }
        }
        Ok(Embedding::new(values))
    }
}
