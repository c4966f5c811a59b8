//! Embedding provider boundary
//!
//! Providers are the only suspension point of the core. The gateway wraps
//! every call in a timeout and never retries on its own; [`FallbackProvider`]
//! is the documented way to route around a failing primary.

use crate::error::ProviderError;
use sha2::{Digest, Sha256};
use std::sync::Arc;

/// Raw output of a provider call
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderEmbedding {
    /// The vector
    pub vector: Vec<f32>,

    /// Tokens billed for this input
    pub tokens_used: u32,

    /// Model that produced the vector, when it is not the provider's `model_name`
    pub model: Option<String>,
}

impl ProviderEmbedding {
    /// Vector produced by the provider's own model
    pub fn new(vector: Vec<f32>, tokens_used: u32) -> Self {
        Self {
            vector,
            tokens_used,
            model: None,
        }
    }

    /// Attribute the vector to `model`
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }
}

/// Trait for embedding generation backends
#[async_trait::async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate an embedding for the given text
    async fn embed(&self, text: &str) -> Result<ProviderEmbedding, ProviderError>;

    /// Generate embeddings for several texts, preserving order
    ///
    /// The default issues one `embed` call per text.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<ProviderEmbedding>, ProviderError> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text).await?);
        }
        Ok(out)
    }

    /// Get the model name
    fn model_name(&self) -> &str;

    /// Get the embedding dimensions
    fn dimensions(&self) -> usize;

    /// Largest number of texts accepted by one `embed_batch` call
    fn max_batch_size(&self) -> usize {
        16
    }
}

/// Deterministic feature-hashing provider (for tests and offline use)
///
/// Each lower-cased word is hashed into a signed bucket and the result is
/// L2-normalized, so texts sharing words have positive cosine similarity and
/// identical texts always produce identical vectors.
pub struct HashEmbeddingProvider {
    dimensions: usize,
    batch_size: usize,
}

impl HashEmbeddingProvider {
    /// Create a new hash-based embedding provider
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
            batch_size: 16,
        }
    }

    /// Override the batch window
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    fn hash_embed(&self, text: &str) -> (Vec<f32>, u32) {
        let mut vector = vec![0.0f32; self.dimensions];
        let mut tokens = 0u32;

        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            tokens += 1;
            let digest = Sha256::digest(word.to_lowercase().as_bytes());
            let mut bucket_bytes = [0u8; 8];
            bucket_bytes.copy_from_slice(&digest[..8]);
            let bucket = (u64::from_le_bytes(bucket_bytes) % self.dimensions as u64) as usize;
            let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }

        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut vector {
                *x /= norm;
            }
        }

        (vector, tokens)
    }
}

#[async_trait::async_trait]
impl EmbeddingProvider for HashEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<ProviderEmbedding, ProviderError> {
        let (vector, tokens_used) = self.hash_embed(text);
        Ok(ProviderEmbedding::new(vector, tokens_used))
    }

    fn model_name(&self) -> &str {
        "hash-embedding"
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn max_batch_size(&self) -> usize {
        self.batch_size
    }
}

/// Routes calls to a secondary provider when the primary fails
///
/// Both providers must produce vectors of the same dimension. Vectors from the
/// secondary are attributed to its model, so the gateway neither caches them
/// nor labels them as the primary's.
pub struct FallbackProvider {
    primary: Arc<dyn EmbeddingProvider>,
    secondary: Arc<dyn EmbeddingProvider>,
}

impl FallbackProvider {
    /// Pair a primary with its fallback
    pub fn new(
        primary: Arc<dyn EmbeddingProvider>,
        secondary: Arc<dyn EmbeddingProvider>,
    ) -> Result<Self, ProviderError> {
        if primary.dimensions() != secondary.dimensions() {
            return Err(ProviderError::Unavailable(format!(
                "fallback dimension {} does not match primary dimension {}",
                secondary.dimensions(),
                primary.dimensions()
            )));
        }
        Ok(Self { primary, secondary })
    }

    fn attribute_to_secondary(&self, embedding: ProviderEmbedding) -> ProviderEmbedding {
        match embedding.model {
            Some(_) => embedding,
            None => embedding.with_model(self.secondary.model_name()),
        }
    }
}

#[async_trait::async_trait]
impl EmbeddingProvider for FallbackProvider {
    async fn embed(&self, text: &str) -> Result<ProviderEmbedding, ProviderError> {
        match self.primary.embed(text).await {
            Ok(embedding) => Ok(embedding),
            Err(e) => {
                tracing::warn!(
                    primary = self.primary.model_name(),
                    fallback = self.secondary.model_name(),
                    error = %e,
                    "Primary embedding provider failed, using fallback"
                );
                let embedding = self.secondary.embed(text).await?;
                Ok(self.attribute_to_secondary(embedding))
            }
        }
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<ProviderEmbedding>, ProviderError> {
        match self.primary.embed_batch(texts).await {
            Ok(embeddings) => Ok(embeddings),
            Err(e) => {
                tracing::warn!(
                    primary = self.primary.model_name(),
                    fallback = self.secondary.model_name(),
                    error = %e,
                    "Primary embedding provider failed batch, using fallback"
                );
                let embeddings = self.secondary.embed_batch(texts).await?;
                Ok(embeddings
                    .into_iter()
                    .map(|e| self.attribute_to_secondary(e))
                    .collect())
            }
        }
    }

    fn model_name(&self) -> &str {
        self.primary.model_name()
    }

    fn dimensions(&self) -> usize {
        self.primary.dimensions()
    }

    fn max_batch_size(&self) -> usize {
        self.primary
            .max_batch_size()
            .min(self.secondary.max_batch_size())
    }
}
