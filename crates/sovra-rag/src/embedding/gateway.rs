//! Embedding gateway: cache-first text → vector conversion

use super::cache::{cache_key, CacheStats, EmbeddingCache};
use super::provider::{EmbeddingProvider, ProviderEmbedding};
use super::similarity::{self, Cluster, ScoredMatch, Similarity};
use crate::config::EmbeddingConfig;
use crate::error::{ProviderError, SovraError, SovraResult};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Outcome of embedding one text
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmbeddingResult {
    /// The vector
    pub vector: Vec<f32>,

    /// Length of `vector`
    pub dimension: usize,

    /// Model that produced the vector
    pub model: String,

    /// Time spent in the provider call (zero on a cache hit)
    pub provider_latency: Duration,

    /// Whether the vector came from the cache
    pub cache_hit: bool,

    /// Tokens billed by the provider (zero on a cache hit)
    pub tokens_used: u32,
}

/// Converts text to vectors through a pluggable provider with a bounded cache
pub struct EmbeddingGateway {
    provider: Arc<dyn EmbeddingProvider>,
    cache: EmbeddingCache,
    timeout: Duration,
}

impl EmbeddingGateway {
    /// Create a gateway over `provider`
    pub fn new(provider: Arc<dyn EmbeddingProvider>, config: &EmbeddingConfig) -> Self {
        Self {
            provider,
            cache: EmbeddingCache::new(config.cache_capacity, config.cache_ttl()),
            timeout: config.request_timeout(),
        }
    }

    /// Create a gateway with default configuration
    pub fn with_provider(provider: Arc<dyn EmbeddingProvider>) -> Self {
        Self::new(provider, &EmbeddingConfig::default())
    }

    /// Override the per-call timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Provider model name
    pub fn model_name(&self) -> &str {
        self.provider.model_name()
    }

    /// Provider dimension
    pub fn dimensions(&self) -> usize {
        self.provider.dimensions()
    }

    /// The underlying cache
    pub fn cache(&self) -> &EmbeddingCache {
        &self.cache
    }

    /// Cache counters
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Embed one text, consulting the cache first
    pub async fn embed(&self, text: &str) -> SovraResult<EmbeddingResult> {
        if text.trim().is_empty() {
            return Err(SovraError::validation("text", "must not be empty", ""));
        }

        let key = cache_key(text);
        if let Some(hit) = self.cache.get(&key) {
            tracing::debug!(text_hash = %key, "Embedding cache hit");
            return Ok(EmbeddingResult {
                dimension: hit.vector.len(),
                vector: hit.vector,
                model: hit.model,
                provider_latency: Duration::ZERO,
                cache_hit: true,
                tokens_used: 0,
            });
        }

        let started = Instant::now();
        let embedding = tokio::time::timeout(self.timeout, self.provider.embed(text))
            .await
            .map_err(|_| ProviderError::Timeout {
                after: self.timeout,
            })
            .and_then(|r| r)
            .and_then(|e| self.check_dimension(e))
            .map_err(|e| SovraError::provider("embed", key.clone(), e))?;
        let provider_latency = started.elapsed();

        tracing::debug!(
            text_hash = %key,
            latency_ms = provider_latency.as_millis() as u64,
            tokens = embedding.tokens_used,
            "Embedding cache miss, provider called"
        );

        let (model, cacheable) = self.attribution(&embedding);
        if cacheable {
            self.cache.insert(key, embedding.vector.clone(), model.clone());
        }

        Ok(EmbeddingResult {
            dimension: embedding.vector.len(),
            vector: embedding.vector,
            model,
            provider_latency,
            cache_hit: false,
            tokens_used: embedding.tokens_used,
        })
    }

    /// Embed several texts, preserving input order
    ///
    /// Cached texts are served from the cache; the remaining distinct texts
    /// are sent in sequential provider calls of at most `max_batch_size`.
    pub async fn embed_batch(&self, texts: &[String]) -> SovraResult<Vec<EmbeddingResult>> {
        if let Some(idx) = texts.iter().position(|t| t.trim().is_empty()) {
            return Err(SovraError::validation(
                "texts",
                "must not contain empty text",
                format!("index {}", idx),
            ));
        }

        let mut results: Vec<Option<EmbeddingResult>> = vec![None; texts.len()];
        // key -> indices waiting on it, in first-seen order
        let mut pending: Vec<(String, Vec<usize>)> = Vec::new();
        let mut pending_index: HashMap<String, usize> = HashMap::new();

        for (idx, text) in texts.iter().enumerate() {
            let key = cache_key(text);
            if let Some(slot) = pending_index.get(&key) {
                pending[*slot].1.push(idx);
                continue;
            }
            match self.cache.get(&key) {
                Some(hit) => {
                    results[idx] = Some(EmbeddingResult {
                        dimension: hit.vector.len(),
                        vector: hit.vector,
                        model: hit.model,
                        provider_latency: Duration::ZERO,
                        cache_hit: true,
                        tokens_used: 0,
                    });
                }
                None => {
                    pending_index.insert(key.clone(), pending.len());
                    pending.push((key, vec![idx]));
                }
            }
        }

        let window = self.provider.max_batch_size().max(1);

        for chunk in pending.chunks(window) {
            let chunk_texts: Vec<String> = chunk
                .iter()
                .map(|(_, indices)| texts[indices[0]].clone())
                .collect();

            let started = Instant::now();
            let call = self.provider.embed_batch(&chunk_texts);
            let embeddings = tokio::time::timeout(self.timeout, call)
                .await
                .map_err(|_| ProviderError::Timeout {
                    after: self.timeout,
                })
                .and_then(|r| r)
                .and_then(|batch| {
                    if batch.len() != chunk_texts.len() {
                        return Err(ProviderError::InvalidResponse(format!(
                            "expected {} embeddings, got {}",
                            chunk_texts.len(),
                            batch.len()
                        )));
                    }
                    batch
                        .into_iter()
                        .map(|e| self.check_dimension(e))
                        .collect::<Result<Vec<_>, _>>()
                })
                .map_err(|e| SovraError::provider("embed_batch", chunk[0].0.clone(), e))?;
            let provider_latency = started.elapsed();

            tracing::debug!(
                batch_size = chunk_texts.len(),
                latency_ms = provider_latency.as_millis() as u64,
                "Embedded batch window"
            );

            for ((key, indices), embedding) in chunk.iter().zip(embeddings) {
                let (model, cacheable) = self.attribution(&embedding);
                if cacheable {
                    self.cache.insert(key.clone(), embedding.vector.clone(), model.clone());
                }
                for (n, &idx) in indices.iter().enumerate() {
                    results[idx] = Some(EmbeddingResult {
                        dimension: embedding.vector.len(),
                        vector: embedding.vector.clone(),
                        model: model.clone(),
                        provider_latency,
                        cache_hit: n > 0,
                        tokens_used: if n == 0 { embedding.tokens_used } else { 0 },
                    });
                }
            }
        }

        results
            .into_iter()
            .enumerate()
            .map(|(idx, r)| {
                r.ok_or_else(|| {
                    SovraError::provider(
                        "embed_batch",
                        cache_key(&texts[idx]),
                        ProviderError::InvalidResponse("missing embedding".to_string()),
                    )
                })
            })
            .collect()
    }

    /// Compare two vectors (never fails)
    pub fn similarity(a: &[f32], b: &[f32]) -> Similarity {
        similarity::similarity(a, b)
    }

    /// Rank candidates by cosine similarity to `query`
    pub fn find_most_similar<T, V: AsRef<[f32]>>(
        query: &[f32],
        candidates: impl IntoIterator<Item = (T, V)>,
        top_k: usize,
        threshold: f32,
    ) -> Vec<ScoredMatch<T>> {
        similarity::find_most_similar(query, candidates, top_k, threshold)
    }

    /// Single-link clustering against cluster seeds
    pub fn cluster<T: Clone, V: AsRef<[f32]>>(
        items: &[(T, V)],
        threshold: f32,
    ) -> Vec<Cluster<T>> {
        similarity::cluster(items, threshold)
    }

    /// Model label for a fresh vector, and whether it may be cached
    ///
    /// Only vectors from the provider's own model are cached; a stand-in
    /// model's vector would otherwise outlive the outage that produced it.
    fn attribution(&self, embedding: &ProviderEmbedding) -> (String, bool) {
        let own = self.provider.model_name();
        match embedding.model.as_deref() {
            Some(model) if model != own => (model.to_string(), false),
            _ => (own.to_string(), true),
        }
    }

    fn check_dimension(
        &self,
        embedding: ProviderEmbedding,
    ) -> Result<ProviderEmbedding, ProviderError> {
        let expected = self.provider.dimensions();
        if embedding.vector.is_empty() {
            return Err(ProviderError::InvalidResponse("empty vector".to_string()));
        }
        if expected != 0 && embedding.vector.len() != expected {
            return Err(ProviderError::InvalidResponse(format!(
                "expected dimension {}, got {}",
                expected,
                embedding.vector.len()
            )));
        }
        Ok(embedding)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::provider::{FallbackProvider, HashEmbeddingProvider};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    /// Counts calls and records batch sizes
    struct CountingProvider {
        inner: HashEmbeddingProvider,
        calls: AtomicUsize,
        batches: parking_lot::Mutex<Vec<usize>>,
    }

    impl CountingProvider {
        fn new(batch_size: usize) -> Self {
            Self {
                inner: HashEmbeddingProvider::new(16).with_batch_size(batch_size),
                calls: AtomicUsize::new(0),
                batches: parking_lot::Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait::async_trait]
    impl EmbeddingProvider for CountingProvider {
        async fn embed(&self, text: &str) -> Result<ProviderEmbedding, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.embed(text).await
        }

        async fn embed_batch(
            &self,
            texts: &[String],
        ) -> Result<Vec<ProviderEmbedding>, ProviderError> {
            self.batches.lock().push(texts.len());
            let mut out = Vec::new();
            for text in texts {
                out.push(self.inner.embed(text).await?);
            }
            Ok(out)
        }

        fn model_name(&self) -> &str {
            "counting"
        }

        fn dimensions(&self) -> usize {
            16
        }

        fn max_batch_size(&self) -> usize {
            self.inner.max_batch_size()
        }
    }

    struct SlowProvider;

    #[async_trait::async_trait]
    impl EmbeddingProvider for SlowProvider {
        async fn embed(&self, _text: &str) -> Result<ProviderEmbedding, ProviderError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(ProviderEmbedding::new(vec![1.0], 1))
        }

        fn model_name(&self) -> &str {
            "slow"
        }

        fn dimensions(&self) -> usize {
            1
        }
    }

    struct WrongDimensionProvider;

    #[async_trait::async_trait]
    impl EmbeddingProvider for WrongDimensionProvider {
        async fn embed(&self, _text: &str) -> Result<ProviderEmbedding, ProviderError> {
            Ok(ProviderEmbedding::new(vec![1.0, 2.0], 1))
        }

        fn model_name(&self) -> &str {
            "wrong"
        }

        fn dimensions(&self) -> usize {
            3
        }
    }

    #[tokio::test]
    async fn test_second_embed_is_cache_hit() {
        let provider = Arc::new(CountingProvider::new(4));
        let gateway = EmbeddingGateway::with_provider(provider.clone());

        let first = gateway.embed("Plan the Route").await.unwrap();
        let second = gateway.embed("  plan the route ").await.unwrap();

        assert!(!first.cache_hit);
        assert!(first.tokens_used > 0);
        assert!(second.cache_hit);
        assert_eq!(second.tokens_used, 0);
        assert_eq!(second.provider_latency, Duration::ZERO);
        assert_eq!(first.vector, second.vector);
        assert_eq!(first.dimension, 16);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_embed_rejects_empty_text() {
        let gateway = EmbeddingGateway::with_provider(Arc::new(HashEmbeddingProvider::new(8)));
        assert!(matches!(
            gateway.embed("  ").await,
            Err(SovraError::Validation { .. })
        ));
    }

    #[tokio::test]
    async fn test_batch_windows_and_order() {
        let provider = Arc::new(CountingProvider::new(2));
        let gateway = EmbeddingGateway::with_provider(provider.clone());

        gateway.embed("cached one").await.unwrap();

        let texts: Vec<String> = ["alpha", "cached one", "beta", "gamma", "ALPHA", "delta"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let results = gateway.embed_batch(&texts).await.unwrap();

        assert_eq!(results.len(), texts.len());
        assert!(results[1].cache_hit);
        // duplicate of "alpha" is served from the same provider call
        assert!(results[4].cache_hit);
        assert_eq!(results[0].vector, results[4].vector);
        // 4 distinct misses in windows of 2
        assert_eq!(*provider.batches.lock(), vec![2, 2]);

        for (text, result) in texts.iter().zip(&results) {
            let single = gateway.embed(text).await.unwrap();
            assert!(single.cache_hit);
            assert_eq!(single.vector, result.vector);
        }
    }

    #[tokio::test]
    async fn test_timeout_becomes_provider_error() {
        let gateway = EmbeddingGateway::with_provider(Arc::new(SlowProvider))
            .with_timeout(Duration::from_millis(20));

        let err = gateway.embed("anything").await.unwrap_err();
        assert!(err.is_retryable());
        assert!(matches!(
            err,
            SovraError::Provider {
                source: ProviderError::Timeout { .. },
                ..
            }
        ));
        assert!(gateway.cache().is_empty());
    }

    /// Hash vectors under its own model name while `down` is false
    struct FlakyPrimary {
        inner: HashEmbeddingProvider,
        down: AtomicBool,
    }

    #[async_trait::async_trait]
    impl EmbeddingProvider for FlakyPrimary {
        async fn embed(&self, text: &str) -> Result<ProviderEmbedding, ProviderError> {
            if self.down.load(Ordering::SeqCst) {
                return Err(ProviderError::Network("connection reset".to_string()));
            }
            self.inner.embed(text).await
        }

        fn model_name(&self) -> &str {
            "primary-model"
        }

        fn dimensions(&self) -> usize {
            16
        }
    }

    #[tokio::test]
    async fn test_fallback_vectors_are_labelled_and_not_cached() {
        let primary = Arc::new(FlakyPrimary {
            inner: HashEmbeddingProvider::new(16),
            down: AtomicBool::new(true),
        });
        let fallback = FallbackProvider::new(
            primary.clone(),
            Arc::new(HashEmbeddingProvider::new(16)),
        )
        .unwrap();
        let gateway = EmbeddingGateway::with_provider(Arc::new(fallback));

        let during_outage = gateway.embed("route the shipment").await.unwrap();
        assert_eq!(during_outage.model, "hash-embedding");
        assert!(!during_outage.cache_hit);
        assert!(gateway.cache().is_empty());

        let batch = gateway
            .embed_batch(&["route the shipment".to_string(), "hold the order".to_string()])
            .await
            .unwrap();
        assert!(batch.iter().all(|r| r.model == "hash-embedding"));
        assert!(gateway.cache().is_empty());

        primary.down.store(false, Ordering::SeqCst);
        let recovered = gateway.embed("route the shipment").await.unwrap();
        assert_eq!(recovered.model, "primary-model");
        assert!(!recovered.cache_hit);

        let cached = gateway.embed("route the shipment").await.unwrap();
        assert!(cached.cache_hit);
        assert_eq!(cached.model, "primary-model");
    }

    #[tokio::test]
    async fn test_dimension_mismatch_is_rejected() {
        let gateway = EmbeddingGateway::with_provider(Arc::new(WrongDimensionProvider));
        let err = gateway.embed("anything").await.unwrap_err();
        assert!(matches!(
            err,
            SovraError::Provider {
                source: ProviderError::InvalidResponse(_),
                ..
            }
        ));
    }

    #[test]
    fn test_static_similarity_helpers() {
        let sim = EmbeddingGateway::similarity(&[1.0, 0.0], &[1.0]);
        assert_eq!(sim, Similarity::UNRELATED);

        let candidates = vec![("x", vec![1.0, 0.0])];
        let ranked = EmbeddingGateway::find_most_similar(&[1.0, 0.0], candidates, 1, 0.5);
        assert_eq!(ranked.len(), 1);

        let clusters = EmbeddingGateway::cluster(&[("x", vec![1.0, 0.0])], 0.5);
        assert_eq!(clusters.len(), 1);
    }
}
