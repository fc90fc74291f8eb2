//! Crash-recovery tests.
//!
//! Simulates the crash window between the write-ahead record and the
//! index merge, and full snapshot loss, by rebuilding the index and
//! pipeline over the same store.

use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;

use e2e_tests::{TestHarness, VocabEmbedder};
use recall_embeddings::Embedder;
use recall_ingest::{recover, IngestionPipeline, PipelineConfig};
use recall_retrieval::RetrievalService;
use recall_store::PersistedRecord;
use recall_types::Item;

fn test_config() -> PipelineConfig {
    PipelineConfig::default().with_interval(Duration::from_secs(60))
}

fn recovery_embedder() -> Arc<VocabEmbedder> {
    Arc::new(VocabEmbedder::new(&[
        "orphaned", "report", "onboarding", "replayed", "billing", "invoices", "resilient",
    ]))
}

#[tokio::test(flavor = "multi_thread")]
async fn test_unmerged_record_becomes_searchable_after_restart() {
    let harness = TestHarness::new();
    let embedder = recovery_embedder();

    // A crash left this record written but never merged
    let vector = embedder
        .embed("orphaned report about onboarding")
        .await
        .unwrap();
    harness
        .store
        .upsert(&PersistedRecord::pending(99, vector.values))
        .unwrap();

    // Restart: a fresh index and pipeline over the same store
    let index = harness.build_index(embedder.dimension());
    let pipeline = IngestionPipeline::start(
        Arc::clone(&index),
        Arc::clone(&harness.store),
        embedder.clone(),
        test_config(),
    )
    .unwrap();

    let service = RetrievalService::new(embedder, Arc::clone(&index));
    let hits = service
        .search("orphaned report about onboarding", 5, None)
        .await
        .unwrap();

    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].external_id, 99);
    assert!(harness.store.get(99).unwrap().unwrap().processed);

    pipeline.shutdown().await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_double_recovery_keeps_single_entry() {
    let harness = TestHarness::new();
    let embedder = recovery_embedder();

    let vector = embedder.embed("replayed item").await.unwrap();
    harness
        .store
        .upsert(&PersistedRecord::pending(7, vector.values))
        .unwrap();

    let index = harness.build_index(embedder.dimension());
    assert_eq!(recover(&index, &harness.store).unwrap(), 1);
    assert_eq!(recover(&index, &harness.store).unwrap(), 0);
    assert_eq!(index.len().unwrap(), 1);

    let query = embedder.embed("replayed item").await.unwrap();
    let hits = index.search(&query, 10, None).unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].external_id, 7);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_restart_after_clean_shutdown_resumes_from_snapshot() {
    let harness = TestHarness::new();
    let embedder = recovery_embedder();

    {
        let index = harness.build_index(embedder.dimension());
        let pipeline = IngestionPipeline::start(
            Arc::clone(&index),
            Arc::clone(&harness.store),
            embedder.clone(),
            test_config(),
        )
        .unwrap();

        pipeline
            .enqueue(vec![
                Item::text(1, "first document about billing"),
                Item::text(2, "second document about invoices"),
            ])
            .unwrap();
        pipeline.shutdown().await.unwrap();
    }

    // Restart: recovery loads the snapshot and finds nothing to replay
    let index = harness.build_index(embedder.dimension());
    let pipeline = IngestionPipeline::start(
        Arc::clone(&index),
        Arc::clone(&harness.store),
        embedder.clone(),
        test_config(),
    )
    .unwrap();

    assert_eq!(index.len().unwrap(), 2);
    let service = RetrievalService::new(embedder, index);
    let hits = service.search("billing", 1, None).await.unwrap();
    assert_eq!(hits[0].external_id, 1);

    pipeline.shutdown().await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_lost_snapshot_is_rebuilt_from_store() {
    let harness = TestHarness::new();
    let embedder = recovery_embedder();

    {
        let index = harness.build_index(embedder.dimension());
        let pipeline = IngestionPipeline::start(
            Arc::clone(&index),
            Arc::clone(&harness.store),
            embedder.clone(),
            test_config(),
        )
        .unwrap();
        pipeline
            .enqueue(vec![Item::text(1, "resilient content")])
            .unwrap();
        pipeline.shutdown().await.unwrap();
    }

    // The snapshot directory disappears entirely
    std::fs::remove_dir_all(&harness.index_path).unwrap();

    let index = harness.build_index(embedder.dimension());
    let pipeline = IngestionPipeline::start(
        Arc::clone(&index),
        Arc::clone(&harness.store),
        embedder.clone(),
        test_config(),
    )
    .unwrap();

    // Every record was replayed, processed flag notwithstanding
    assert_eq!(index.len().unwrap(), 1);
    let service = RetrievalService::new(embedder, index);
    let hits = service.search("resilient content", 1, None).await.unwrap();
    assert_eq!(hits[0].external_id, 1);

    pipeline.shutdown().await.unwrap();
}
