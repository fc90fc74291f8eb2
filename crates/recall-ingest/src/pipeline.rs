//! Batched ingestion pipeline.
//!
//! One background worker per pipeline instance listens on a command
//! channel with an interval timer: a batch drains when the pending
//! buffer reaches `batch_size` or the interval elapses, whichever comes
//! first. Draining is serialized by construction, so the two wake
//! conditions can race without double-draining.
//!
//! Write-ahead ordering per item: durable record (`processed = false`)
//! first, index merge second, `processed = true` last. A crash between
//! the first two steps leaves a re-mergeable record; the reverse order
//! could leave a merged vector with no durable trace.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use recall_embeddings::{Embedder, Embedding, EmbeddingError};
use recall_index::VectorIndex;
use recall_store::{DurableStore, PersistedRecord};
use recall_types::{Item, DEFAULT_CONTENT_FIELD};

use crate::error::IngestError;
use crate::report::{BatchReport, FailureReason, PipelineStats};

/// Ingestion pipeline configuration.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Maximum items drained per cycle
    pub batch_size: usize,
    /// Wake interval for the background worker
    pub interval: Duration,
    /// Per-call embedding deadline
    pub embed_timeout: Duration,
    /// Field consulted when extracting text from structured records
    pub content_field: String,
    /// Drain the pending queue one final time on shutdown
    pub flush_on_shutdown: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            batch_size: 100,
            interval: Duration::from_secs(300),
            embed_timeout: Duration::from_secs(30),
            content_field: DEFAULT_CONTENT_FIELD.to_string(),
            flush_on_shutdown: true,
        }
    }
}

impl PipelineConfig {
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_embed_timeout(mut self, timeout: Duration) -> Self {
        self.embed_timeout = timeout;
        self
    }

    pub fn with_content_field(mut self, field: impl Into<String>) -> Self {
        self.content_field = field.into();
        self
    }
}

enum Command {
    Ingest(Item),
    Flush(oneshot::Sender<BatchReport>),
}

/// Replay durable records into the index.
///
/// Loads the snapshot when present and replays only the records still
/// inside the crash window. A missing or unreadable snapshot means the
/// live index cannot be trusted, so every record is replayed instead.
/// Merges are replace-or-insert, so running this twice is harmless.
pub fn recover(index: &VectorIndex, store: &DurableStore) -> Result<usize, IngestError> {
    let records = match index.load() {
        Ok(true) => store.list_unprocessed()?,
        Ok(false) => store.list_all()?,
        Err(e) => {
            warn!(error = %e, "Index snapshot failed to load; rebuilding from store");
            store.list_all()?
        }
    };

    let mut replayed = 0;
    for record in records {
        let external_id = record.external_id;
        index.merge(external_id, Embedding::new(record.vector))?;
        store.mark_processed(external_id)?;
        replayed += 1;
    }

    if replayed > 0 {
        index.save()?;
        info!(replayed = replayed, "Recovery replay complete");
    }
    Ok(replayed)
}

/// Background ingestion pipeline.
///
/// Enqueue never blocks and never touches the index lock; all index
/// and store writes happen on the worker task.
pub struct IngestionPipeline {
    tx: UnboundedSender<Command>,
    queue_depth: Arc<AtomicUsize>,
    index: Arc<VectorIndex>,
    store: Arc<DurableStore>,
    shutdown: CancellationToken,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl IngestionPipeline {
    /// Run recovery and start the background worker.
    ///
    /// Must be called from within a tokio runtime. The index passed in
    /// should be freshly constructed; recovery loads its snapshot.
    pub fn start(
        index: Arc<VectorIndex>,
        store: Arc<DurableStore>,
        embedder: Arc<dyn Embedder>,
        config: PipelineConfig,
    ) -> Result<Self, IngestError> {
        let replayed = recover(&index, &store)?;
        if replayed > 0 {
            info!(replayed = replayed, "Pipeline recovered unmerged records");
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let queue_depth = Arc::new(AtomicUsize::new(0));
        let shutdown = CancellationToken::new();

        let worker = Worker {
            index: Arc::clone(&index),
            store: Arc::clone(&store),
            embedder,
            config,
            queue_depth: Arc::clone(&queue_depth),
            shutdown: shutdown.clone(),
        };
        let handle = tokio::spawn(worker.run(rx));

        Ok(Self {
            tx,
            queue_depth,
            index,
            store,
            shutdown,
            worker: Mutex::new(Some(handle)),
        })
    }

    /// Queue items for indexing. Returns immediately; there is no
    /// backpressure at this layer.
    pub fn enqueue(&self, items: Vec<Item>) -> Result<(), IngestError> {
        for item in items {
            self.queue_depth.fetch_add(1, Ordering::SeqCst);
            if self.tx.send(Command::Ingest(item)).is_err() {
                self.queue_depth.fetch_sub(1, Ordering::SeqCst);
                return Err(IngestError::Closed);
            }
        }
        Ok(())
    }

    /// Drain one batch immediately, ahead of the interval.
    ///
    /// Waits for the drain to complete and returns its report.
    pub async fn flush(&self) -> Result<BatchReport, IngestError> {
        let (reply, response) = oneshot::channel();
        self.tx
            .send(Command::Flush(reply))
            .map_err(|_| IngestError::Closed)?;
        response.await.map_err(|_| IngestError::Closed)
    }

    /// Remove an item from the live index and supersede its durable
    /// record. Idempotent; returns false for an unknown id.
    pub fn remove(&self, external_id: u64) -> Result<bool, IngestError> {
        let removed = self.index.remove(external_id)?;
        self.store.delete(external_id)?;
        Ok(removed)
    }

    /// Read-only ingestion statistics.
    pub fn stats(&self) -> Result<PipelineStats, IngestError> {
        Ok(PipelineStats {
            total_items: self.store.count()?,
            processed_items: self.store.count_processed()?,
            queue_depth: self.queue_depth.load(Ordering::SeqCst),
        })
    }

    /// Stop the worker: no further wake-ups, an optional final flush of
    /// the pending queue, and a snapshot save before exit.
    pub async fn shutdown(&self) -> Result<(), IngestError> {
        self.shutdown.cancel();
        let handle = self
            .worker
            .lock()
            .map_err(|_| IngestError::WorkerTerminated)?
            .take();
        if let Some(handle) = handle {
            handle.await.map_err(|_| IngestError::WorkerTerminated)?;
        }
        Ok(())
    }
}

struct Worker {
    index: Arc<VectorIndex>,
    store: Arc<DurableStore>,
    embedder: Arc<dyn Embedder>,
    config: PipelineConfig,
    queue_depth: Arc<AtomicUsize>,
    shutdown: CancellationToken,
}

impl Worker {
    async fn run(self, mut rx: UnboundedReceiver<Command>) {
        let mut interval = tokio::time::interval(self.config.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick of a tokio interval completes immediately
        interval.tick().await;

        let mut pending: Vec<Item> = Vec::new();
        info!(
            batch_size = self.config.batch_size,
            interval_ms = self.config.interval.as_millis() as u64,
            "Ingestion worker started"
        );

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    self.drain_on_shutdown(&mut rx, &mut pending).await;
                    return;
                }
                _ = interval.tick() => {
                    if !pending.is_empty() {
                        let batch = take_batch(&mut pending, self.config.batch_size);
                        self.process_batch(batch).await;
                    }
                }
                command = rx.recv() => {
                    match command {
                        Some(Command::Ingest(item)) => {
                            pending.push(item);
                            if pending.len() >= self.config.batch_size {
                                let batch = take_batch(&mut pending, self.config.batch_size);
                                self.process_batch(batch).await;
                                interval.reset();
                            }
                        }
                        Some(Command::Flush(reply)) => {
                            let batch = take_batch(&mut pending, self.config.batch_size);
                            let report = self.process_batch(batch).await;
                            let _ = reply.send(report);
                            interval.reset();
                        }
                        None => {
                            debug!("Command channel closed, worker exiting");
                            return;
                        }
                    }
                }
            }
        }
    }

    async fn drain_on_shutdown(&self, rx: &mut UnboundedReceiver<Command>, pending: &mut Vec<Item>) {
        if self.config.flush_on_shutdown {
            // Pull whatever was enqueued before the shutdown signal
            while let Ok(command) = rx.try_recv() {
                match command {
                    Command::Ingest(item) => pending.push(item),
                    Command::Flush(reply) => {
                        let _ = reply.send(BatchReport::default());
                    }
                }
            }
            while !pending.is_empty() {
                let batch = take_batch(pending, self.config.batch_size);
                self.process_batch(batch).await;
            }
        }

        if let Err(e) = self.index.save() {
            error!(error = %e, "Failed to persist index snapshot during shutdown");
        }
        info!("Ingestion worker stopped");
    }

    /// Drain one batch: embed, write ahead, merge, mark processed.
    async fn process_batch(&self, items: Vec<Item>) -> BatchReport {
        let mut report = BatchReport::default();
        if items.is_empty() {
            return report;
        }

        info!(count = items.len(), "Draining ingestion batch");
        for item in items {
            let external_id = item.id;
            let result = self.process_item(&item).await;
            self.queue_depth.fetch_sub(1, Ordering::SeqCst);

            match result {
                Ok(()) => report.merged.push(external_id),
                Err(reason) => {
                    warn!(external_id = external_id, reason = %reason, "Dropped item");
                    report.failed.push((external_id, reason));
                }
            }
        }

        if let Err(e) = self.index.save() {
            error!(error = %e, "Failed to persist index snapshot after batch");
        }

        info!(
            merged = report.merged.len(),
            failed = report.failed.len(),
            "Batch complete"
        );
        report
    }

    async fn process_item(&self, item: &Item) -> Result<(), FailureReason> {
        let Some(text) = item.content.extract_text(&self.config.content_field) else {
            return Err(FailureReason::EmptyContent);
        };

        let embedding =
            match tokio::time::timeout(self.config.embed_timeout, self.embedder.embed(&text)).await
            {
                Ok(Ok(embedding)) => embedding,
                Ok(Err(e)) => return Err(FailureReason::EmbedFailed(e)),
                Err(_) => {
                    return Err(FailureReason::EmbedFailed(EmbeddingError::Timeout(
                        self.config.embed_timeout,
                    )))
                }
            };

        self.store
            .upsert(&PersistedRecord::pending(item.id, embedding.values.clone()))?;
        self.index.merge(item.id, embedding)?;
        self.store.mark_processed(item.id)?;

        debug!(external_id = item.id, "Merged item");
        Ok(())
    }
}

fn take_batch(pending: &mut Vec<Item>, batch_size: usize) -> Vec<Item> {
    let n = pending.len().min(batch_size);
    pending.drain(..n).collect()
}
