//! Retrieval service: embed the query, search the index.

use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt, TryStreamExt};
use tracing::{debug, warn};

use recall_embeddings::Embedder;
use recall_index::{SearchHit, VectorIndex};

use crate::error::RetrievalError;

/// Retrieval service configuration.
#[derive(Debug, Clone)]
pub struct RetrievalConfig {
    /// Result count when the caller does not specify one
    pub default_k: usize,
    /// Per-call deadline for query embedding
    pub embed_timeout: Duration,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            default_k: 10,
            embed_timeout: Duration::from_secs(30),
        }
    }
}

/// Public query surface over the vector index.
///
/// Searches serialize against index mutation through the index's own
/// lock; the service itself holds no additional state.
pub struct RetrievalService {
    embedder: Arc<dyn Embedder>,
    index: Arc<VectorIndex>,
    config: RetrievalConfig,
}

impl RetrievalService {
    /// Create a service with default configuration.
    pub fn new(embedder: Arc<dyn Embedder>, index: Arc<VectorIndex>) -> Self {
        Self::with_config(embedder, index, RetrievalConfig::default())
    }

    pub fn with_config(
        embedder: Arc<dyn Embedder>,
        index: Arc<VectorIndex>,
        config: RetrievalConfig,
    ) -> Self {
        Self {
            embedder,
            index,
            config,
        }
    }

    /// Default result count.
    pub fn default_k(&self) -> usize {
        self.config.default_k
    }

    /// Embed the query and search the index.
    ///
    /// Returns at most `k` hits ordered by descending score (`k = 0`
    /// falls back to the configured default); hits below `threshold`
    /// are excluded. A query the provider cannot embed (empty text,
    /// timeout, provider error) yields an empty result set rather than
    /// an error; index failures still propagate.
    pub async fn search(
        &self,
        query: &str,
        k: usize,
        threshold: Option<f32>,
    ) -> Result<Vec<SearchHit>, RetrievalError> {
        let k = if k > 0 { k } else { self.config.default_k };
        let embedding =
            match tokio::time::timeout(self.config.embed_timeout, self.embedder.embed(query)).await
            {
                Ok(Ok(embedding)) => embedding,
                Ok(Err(e)) => {
                    debug!(error = %e, "Query embedding failed, returning no matches");
                    return Ok(Vec::new());
                }
                Err(_) => {
                    warn!(
                        timeout_ms = self.config.embed_timeout.as_millis() as u64,
                        "Query embedding timed out, returning no matches"
                    );
                    return Ok(Vec::new());
                }
            };

        let hits = self.index.search(&embedding, k, threshold)?;
        debug!(query_len = query.len(), hits = hits.len(), "Search complete");
        Ok(hits)
    }

    /// Run independent searches with at most `max_parallel` in flight.
    ///
    /// Results are returned in input-query order regardless of
    /// completion order.
    pub async fn batch_search(
        &self,
        queries: &[String],
        k: usize,
        threshold: Option<f32>,
        max_parallel: usize,
    ) -> Result<Vec<Vec<SearchHit>>, RetrievalError> {
        let max_parallel = max_parallel.max(1);

        stream::iter(queries.iter().map(|query| self.search(query, k, threshold)))
            .buffered(max_parallel)
            .try_collect()
            .await
    }
}
