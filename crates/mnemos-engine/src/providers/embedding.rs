//! Embedding provider adapters
//!
//! Semantic search and dedup both run on vectors produced here. The mock
//! provider is deterministic (same text, same vector) so similarity-based
//! tests are reproducible without a network.

use crate::providers::{ProviderError, ProviderResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Which embedding backend to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingProviderType {
    /// OpenAI-compatible embeddings API (requires the `openai` feature)
    OpenAi,
    /// Deterministic local embeddings for tests and offline use
    Mock,
}

/// Configuration for embedding generation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    pub provider: EmbeddingProviderType,

    /// Model name passed to the API (ignored by the mock)
    pub model: String,

    /// Vector dimensionality
    pub dimensions: usize,

    /// API key; read from the environment when None
    pub api_key: Option<String>,

    /// Override the API base URL (for proxies and compatible servers)
    pub api_base_url: Option<String>,

    /// Maximum texts per batch request
    pub max_batch_size: usize,

    /// Per-call deadline in seconds
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self::mock()
    }
}

impl EmbeddingConfig {
    /// Deterministic mock embeddings, 384 dimensions
    pub fn mock() -> Self {
        Self {
            provider: EmbeddingProviderType::Mock,
            model: "mock".to_string(),
            dimensions: 384,
            api_key: None,
            api_base_url: None,
            max_batch_size: 64,
            timeout_secs: 10,
        }
    }

    /// OpenAI text-embedding-3-small
    pub fn openai(api_key: Option<String>) -> Self {
        Self {
            provider: EmbeddingProviderType::OpenAi,
            model: "text-embedding-3-small".to_string(),
            dimensions: 1536,
            api_key,
            api_base_url: None,
            max_batch_size: 64,
            timeout_secs: 10,
        }
    }
}

/// Turns text into fixed-dimension vectors
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Vector dimensionality this provider produces
    fn dimensions(&self) -> usize;

    /// Model identifier, for logging
    fn model_name(&self) -> &str;

    /// Embed a single text
    async fn embed(&self, text: &str) -> ProviderResult<Vec<f32>>;

    /// Embed a batch of texts, preserving order
    async fn embed_batch(&self, texts: &[String]) -> ProviderResult<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text).await?);
        }
        Ok(out)
    }
}

/// Deterministic embeddings derived from a hash of the input text
///
/// Not semantically meaningful, but identical texts map to identical unit
/// vectors, which is what dedup and the similarity tests need.
pub struct MockEmbeddingProvider {
    dimensions: usize,
}

impl MockEmbeddingProvider {
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }
}

impl Default for MockEmbeddingProvider {
    fn default() -> Self {
        Self::new(384)
    }
}

#[async_trait]
impl EmbeddingProvider for MockEmbeddingProvider {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_name(&self) -> &str {
        "mock"
    }

    async fn embed(&self, text: &str) -> ProviderResult<Vec<f32>> {
        if text.trim().is_empty() {
            return Err(ProviderError::InvalidInput("empty text".to_string()));
        }

        let mut hasher = DefaultHasher::new();
        text.trim().to_lowercase().hash(&mut hasher);
        let mut state = hasher.finish();

        // Linear congruential generator seeded by the text hash
        let mut vector = Vec::with_capacity(self.dimensions);
        for _ in 0..self.dimensions {
            state = state
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            let value = ((state >> 33) as f32 / u32::MAX as f32) * 2.0 - 1.0;
            vector.push(value);
        }

        normalize_vector(&mut vector);
        Ok(vector)
    }
}

/// Cosine similarity between two vectors; 0.0 when shapes differ
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

/// Scale a vector to unit length in place
pub fn normalize_vector(vector: &mut [f32]) {
    let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in vector.iter_mut() {
            *x /= norm;
        }
    }
}

/// Build the provider named by the config
pub fn create_embedding_provider(
    config: &EmbeddingConfig,
) -> ProviderResult<Arc<dyn EmbeddingProvider>> {
    match config.provider {
        EmbeddingProviderType::Mock => Ok(Arc::new(MockEmbeddingProvider::new(config.dimensions))),
        #[cfg(feature = "openai")]
        EmbeddingProviderType::OpenAi => Ok(Arc::new(openai::OpenAiEmbeddingProvider::new(
            config.clone(),
        )?)),
        #[cfg(not(feature = "openai"))]
        EmbeddingProviderType::OpenAi => Err(ProviderError::Unavailable(
            "openai feature not enabled".to_string(),
        )),
    }
}

#[cfg(feature = "openai")]
mod openai {
    use super::*;
    use serde_json::json;
    use std::time::Duration;

    pub struct OpenAiEmbeddingProvider {
        client: reqwest::Client,
        config: EmbeddingConfig,
        api_key: String,
        base_url: String,
    }

    #[derive(Deserialize)]
    struct EmbeddingResponse {
        data: Vec<EmbeddingData>,
    }

    #[derive(Deserialize)]
    struct EmbeddingData {
        embedding: Vec<f32>,
        index: usize,
    }

    impl OpenAiEmbeddingProvider {
        pub fn new(config: EmbeddingConfig) -> ProviderResult<Self> {
            let api_key = config
                .api_key
                .clone()
                .or_else(|| std::env::var("OPENAI_API_KEY").ok())
                .ok_or_else(|| {
                    ProviderError::Unavailable("OPENAI_API_KEY not set".to_string())
                })?;
            let base_url = config
                .api_base_url
                .clone()
                .unwrap_or_else(|| "https://api.openai.com/v1".to_string());
            let client = reqwest::Client::builder()
                .timeout(Duration::from_secs(config.timeout_secs))
                .build()
                .map_err(|e| ProviderError::Unavailable(e.to_string()))?;

            Ok(Self {
                client,
                config,
                api_key,
                base_url,
            })
        }

        async fn request(&self, inputs: &[String]) -> ProviderResult<Vec<Vec<f32>>> {
            let response = self
                .client
                .post(format!("{}/embeddings", self.base_url))
                .bearer_auth(&self.api_key)
                .json(&json!({
                    "model": self.config.model,
                    "input": inputs,
                    "dimensions": self.config.dimensions,
                }))
                .send()
                .await
                .map_err(|e| ProviderError::Unavailable(e.to_string()))?;

            if response.status().as_u16() == 429 {
                let retry_after_secs = response
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse().ok());
                return Err(ProviderError::RateLimited { retry_after_secs });
            }
            if !response.status().is_success() {
                return Err(ProviderError::Unavailable(format!(
                    "embeddings API returned {}",
                    response.status()
                )));
            }

            let mut body: EmbeddingResponse = response
                .json()
                .await
                .map_err(|e| ProviderError::Malformed(e.to_string()))?;
            if body.data.len() != inputs.len() {
                return Err(ProviderError::Malformed(format!(
                    "expected {} embeddings, got {}",
                    inputs.len(),
                    body.data.len()
                )));
            }
            body.data.sort_by_key(|d| d.index);
            Ok(body.data.into_iter().map(|d| d.embedding).collect())
        }
    }

    #[async_trait]
    impl EmbeddingProvider for OpenAiEmbeddingProvider {
        fn dimensions(&self) -> usize {
            self.config.dimensions
        }

        fn model_name(&self) -> &str {
            &self.config.model
        }

        async fn embed(&self, text: &str) -> ProviderResult<Vec<f32>> {
            let mut vectors = self.request(&[text.to_string()]).await?;
            vectors
                .pop()
                .ok_or_else(|| ProviderError::Malformed("empty embedding response".to_string()))
        }

        async fn embed_batch(&self, texts: &[String]) -> ProviderResult<Vec<Vec<f32>>> {
            let mut out = Vec::with_capacity(texts.len());
            for chunk in texts.chunks(self.config.max_batch_size.max(1)) {
                out.extend(self.request(chunk).await?);
            }
            Ok(out)
        }
    }
}
