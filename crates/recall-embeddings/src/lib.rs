//! # recall-embeddings
//!
//! Embedding provider boundary for the recall workspace.
//!
//! The index and pipeline crates never assume a specific provider; they
//! depend on the [`Embedder`] trait, which turns text into a vector of a
//! dimension declared at construction time.
//!
//! ## Features
//! - [`Embedding`] vector type with normalization helpers
//! - [`HttpEmbedder`] for OpenAI-compatible `/embeddings` endpoints
//! - Provider configuration passed in explicitly, no ambient state

pub mod error;
pub mod http;
pub mod model;

pub use error::EmbeddingError;
pub use http::{HttpEmbedder, HttpEmbedderConfig};
pub use model::{Embedder, Embedding};
