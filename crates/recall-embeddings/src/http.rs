//! HTTP embedder for OpenAI-compatible endpoints.
//!
//! Posts to `{base_url}/embeddings` with a bearer token. All provider
//! configuration is supplied at construction; nothing is read from the
//! process environment.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::EmbeddingError;
use crate::model::{Embedder, Embedding};

/// Configuration for the HTTP embedder.
#[derive(Debug, Clone)]
pub struct HttpEmbedderConfig {
    /// API base URL (e.g., "https://api.openai.com/v1")
    pub base_url: String,
    /// Model name (e.g., "text-embedding-ada-002")
    pub model: String,
    /// API key
    pub api_key: SecretString,
    /// Declared output dimension, validated against every response
    pub dimension: usize,
    /// Per-request timeout
    pub timeout: Duration,
}

impl HttpEmbedderConfig {
    /// Create config for the OpenAI embeddings API (ada-002, 1536 dims).
    pub fn openai(api_key: impl Into<String>) -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            model: "text-embedding-ada-002".to_string(),
            api_key: SecretString::from(api_key.into()),
            dimension: 1536,
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>, dimension: usize) -> Self {
        self.model = model.into();
        self.dimension = dimension;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[derive(Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

/// Embedder backed by an OpenAI-compatible HTTP endpoint.
pub struct HttpEmbedder {
    client: Client,
    config: HttpEmbedderConfig,
}

impl HttpEmbedder {
    /// Create a new HTTP embedder.
    pub fn new(config: HttpEmbedderConfig) -> Result<Self, EmbeddingError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| EmbeddingError::Provider(e.to_string()))?;

        Ok(Self { client, config })
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    fn dimension(&self) -> usize {
        self.config.dimension
    }

    async fn embed(&self, text: &str) -> Result<Embedding, EmbeddingError> {
        if text.trim().is_empty() {
            return Err(EmbeddingError::EmptyInput);
        }

        let url = format!("{}/embeddings", self.config.base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(self.config.api_key.expose_secret())
            .json(&EmbeddingsRequest {
                model: &self.config.model,
                input: text,
            })
            .send()
            .await?
            .error_for_status()?;

        let body: EmbeddingsResponse = response.json().await?;
        let values = body
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| EmbeddingError::Provider("response contained no embedding".to_string()))?;

        if values.len() != self.config.dimension {
            return Err(EmbeddingError::DimensionMismatch {
                expected: self.config.dimension,
                actual: values.len(),
            });
        }

        debug!(model = %self.config.model, dim = values.len(), "Generated embedding");
        Ok(Embedding::new(values))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openai_config_defaults() {
        let config = HttpEmbedderConfig::openai("sk-test");
        assert_eq!(config.base_url, "https://api.openai.com/v1");
        assert_eq!(config.model, "text-embedding-ada-002");
        assert_eq!(config.dimension, 1536);
    }

    #[test]
    fn test_config_builders() {
        let config = HttpEmbedderConfig::openai("sk-test")
            .with_model("text-embedding-3-small", 1536)
            .with_timeout(Duration::from_secs(5));
        assert_eq!(config.model, "text-embedding-3-small");
        assert_eq!(config.timeout, Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_empty_input_rejected_without_network() {
        let embedder = HttpEmbedder::new(HttpEmbedderConfig::openai("sk-test")).unwrap();
        let result = embedder.embed("   ").await;
        assert!(matches!(result, Err(EmbeddingError::EmptyInput)));
    }

    #[test]
    fn test_request_serialization() {
        let request = EmbeddingsRequest {
            model: "text-embedding-ada-002",
            input: "hello",
        };
        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains("\"model\":\"text-embedding-ada-002\""));
        assert!(json.contains("\"input\":\"hello\""));
    }
}
