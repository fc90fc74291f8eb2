//! Embedding vector type and provider trait.

use async_trait::async_trait;

use crate::error::EmbeddingError;

/// A fixed-length embedding vector.
///
/// Vectors are stored as produced by the provider; metrics that require
/// unit length normalize at the index boundary via [`Embedding::unit`].
#[derive(Debug, Clone, PartialEq)]
pub struct Embedding {
    /// The raw vector values
    pub values: Vec<f32>,
}

impl Embedding {
    /// Create an embedding from raw values.
    pub fn new(values: Vec<f32>) -> Self {
        Self { values }
    }

    /// Get the embedding dimension.
    pub fn dimension(&self) -> usize {
        self.values.len()
    }

    /// Return a copy normalized to unit length.
    ///
    /// A zero vector is returned unchanged.
    pub fn unit(&self) -> Self {
        let norm: f32 = self.values.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            Self {
                values: self.values.iter().map(|x| x / norm).collect(),
            }
        } else {
            self.clone()
        }
    }

    /// Compute cosine similarity with another embedding.
    /// Returns a value in [-1, 1] (1 = identical direction), or 0.0 when
    /// the dimensions disagree or either vector is zero.
    pub fn cosine_similarity(&self, other: &Embedding) -> f32 {
        if self.values.len() != other.values.len() {
            return 0.0;
        }
        let dot: f32 = self
            .values
            .iter()
            .zip(other.values.iter())
            .map(|(a, b)| a * b)
            .sum();
        let norm_a: f32 = self.values.iter().map(|x| x * x).sum::<f32>().sqrt();
        let norm_b: f32 = other.values.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm_a == 0.0 || norm_b == 0.0 {
            return 0.0;
        }
        dot / (norm_a * norm_b)
    }
}

/// Trait for embedding providers.
///
/// Implementations must be thread-safe (Send + Sync) for concurrent use.
/// The output dimension is declared up front so consumers can validate
/// their configuration before the first call.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Declared output dimension.
    fn dimension(&self) -> usize;

    /// Generate an embedding for a single text.
    async fn embed(&self, text: &str) -> Result<Embedding, EmbeddingError>;

    /// Generate embeddings for multiple texts.
    /// Default implementation embeds sequentially.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>, EmbeddingError> {
        let mut embeddings = Vec::with_capacity(texts.len());
        for text in texts {
            embeddings.push(self.embed(text).await?);
        }
        Ok(embeddings)
    }
}
