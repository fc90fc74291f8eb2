//! # recall-index
//!
//! Thread-safe similarity index for the recall workspace.
//!
//! [`VectorIndex`] owns the mapping between caller-assigned external ids
//! and backend slots, and serializes every backend access behind a single
//! exclusive lock. The search structure itself sits behind the
//! [`VectorBackend`] trait so a flat exact scan can be swapped for an ANN
//! structure without touching the service layer.
//!
//! ## Features
//! - Insert/update/remove/search with per-item failure isolation
//! - Typed [`Metric`] strategy (cosine inner-product or legacy L2)
//! - Two-file snapshot (backend bytes + id mapping) with atomic writes

pub mod backend;
pub mod error;
pub mod index;
pub mod metric;

pub use backend::{FlatBackend, VectorBackend};
pub use error::IndexError;
pub use index::{IndexConfig, IndexStats, InsertOutcome, SearchHit, VectorIndex};
pub use metric::Metric;
