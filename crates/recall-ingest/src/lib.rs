//! # recall-ingest
//!
//! Background ingestion pipeline for the recall workspace.
//!
//! Callers enqueue items without blocking; a single background worker
//! drains them in batches when the batch size is reached or a fixed
//! interval elapses, whichever comes first. Each embedded vector is
//! written ahead to the durable store before it is merged into the live
//! index, so a crash anywhere in the pipeline is recoverable by replay.
//!
//! ## Features
//! - Unbounded non-blocking enqueue, one worker per pipeline
//! - Write-ahead durability with idempotent recovery replay
//! - Per-item failure isolation with aggregate batch reports
//! - Graceful shutdown: final flush plus snapshot persist

pub mod error;
pub mod pipeline;
pub mod report;

pub use error::IngestError;
pub use pipeline::{recover, IngestionPipeline, PipelineConfig};
pub use report::{BatchReport, FailureReason, PipelineStats};
