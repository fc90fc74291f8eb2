//! # recall-store
//!
//! Durable vector store for the recall workspace.
//!
//! Records are written ahead of the index merge: a vector lands here
//! with `processed = false` before it is merged into the live index and
//! is flipped to `processed = true` afterwards. On restart, records
//! still inside that window are the ones recovery must replay.
//!
//! ## Features
//! - RocksDB-backed, safe for concurrent writers and readers
//! - Per-record atomicity via write batches
//! - Secondary lookup for records awaiting a merge

pub mod error;
pub mod record;
pub mod store;

pub use error::StoreError;
pub use record::PersistedRecord;
pub use store::{DurableStore, CF_RECORDS, CF_UNPROCESSED};
