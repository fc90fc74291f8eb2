//! # recall-retrieval
//!
//! Query surface for the recall workspace.
//!
//! [`RetrievalService`] embeds a query through the configured
//! [`recall_embeddings::Embedder`] and searches the vector index. A
//! query the provider cannot embed produces an empty result set, the
//! same experience as a query with no matches.

pub mod error;
pub mod service;

pub use error::RetrievalError;
pub use service::{RetrievalConfig, RetrievalService};
