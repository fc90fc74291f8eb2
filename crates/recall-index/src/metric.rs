//! Similarity metrics.
//!
//! The metric is chosen at index construction and applied uniformly to
//! stored and query vectors. Higher scores rank better for both metrics.

use serde::{Deserialize, Serialize};

/// Similarity metric for ranking search results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    /// Cosine similarity. Vectors are L2-normalized on insert and query;
    /// the score is their inner product, in [-1, 1].
    Cosine,
    /// Squared euclidean distance mapped through `1 - distance / 2`.
    ///
    /// Legacy transform kept for backward-compatible thresholds: it is
    /// monotonic in distance but not a bounded similarity for
    /// unnormalized vectors (scores can leave [0, 1]).
    L2,
}

impl Metric {
    /// Prepare a vector for insertion or query under this metric.
    pub fn prepare(&self, mut values: Vec<f32>) -> Vec<f32> {
        if let Metric::Cosine = self {
            let norm: f32 = values.iter().map(|x| x * x).sum::<f32>().sqrt();
            if norm > 0.0 {
                for v in &mut values {
                    *v /= norm;
                }
            }
        }
        values
    }

    /// Score a candidate against a query. Higher is better.
    pub fn score(&self, query: &[f32], candidate: &[f32]) -> f32 {
        match self {
            Metric::Cosine => dot(query, candidate),
            Metric::L2 => 1.0 - squared_euclidean(query, candidate) / 2.0,
        }
    }
}

impl std::fmt::Display for Metric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Metric::Cosine => write!(f, "cosine"),
            Metric::L2 => write!(f, "l2"),
        }
    }
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

fn squared_euclidean(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum()
}
