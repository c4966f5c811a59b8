//! Configuration for the embedding gateway and the semantic memory store

use crate::error::SovraResult;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Embedding gateway configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Maximum number of cached embeddings
    pub cache_capacity: usize,

    /// Cache entry time-to-live in seconds
    pub cache_ttl_secs: u64,

    /// Per-call provider timeout in seconds
    pub request_timeout_secs: u64,

    /// Model requested from HTTP providers
    pub model: String,

    /// Base URL of an OpenAI-compatible embeddings endpoint
    pub base_url: Option<String>,

    /// API key for the HTTP provider
    pub api_key: Option<String>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            cache_capacity: 10_000,
            cache_ttl_secs: 3_600,
            request_timeout_secs: 30,
            model: "text-embedding-004".to_string(),
            base_url: None,
            api_key: None,
        }
    }
}

impl EmbeddingConfig {
    /// Set cache capacity
    pub fn with_cache_capacity(mut self, capacity: usize) -> Self {
        self.cache_capacity = capacity;
        self
    }

    /// Set cache TTL
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl_secs = ttl.as_secs();
        self
    }

    /// Set provider timeout
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout_secs = timeout.as_secs();
        self
    }

    /// Cache TTL as a duration
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    /// Provider timeout as a duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Weights of the combined search score
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct RankingWeights {
    /// Weight of query relevance
    pub relevance: f64,
    /// Weight of stored importance
    pub importance: f64,
    /// Weight of recency
    pub recency: f64,
}

impl Default for RankingWeights {
    fn default() -> Self {
        Self {
            relevance: 0.4,
            importance: 0.4,
            recency: 0.2,
        }
    }
}

/// Semantic memory search configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Page size when a query does not set one
    pub default_limit: usize,

    /// Maximum number of cached result pages
    pub cache_capacity: usize,

    /// Cached page time-to-live in seconds
    pub cache_ttl_secs: u64,

    /// Age at which recency reaches zero, in days
    pub recency_window_days: i64,

    /// Combined score weights
    pub weights: RankingWeights,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_limit: 10,
            cache_capacity: 1_000,
            cache_ttl_secs: 300,
            recency_window_days: 30,
            weights: RankingWeights::default(),
        }
    }
}

impl SearchConfig {
    /// Set result cache capacity (0 disables caching)
    pub fn with_cache_capacity(mut self, capacity: usize) -> Self {
        self.cache_capacity = capacity;
        self
    }

    /// Set result cache TTL
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl_secs = ttl.as_secs();
        self
    }

    /// Set ranking weights
    pub fn with_weights(mut self, weights: RankingWeights) -> Self {
        self.weights = weights;
        self
    }

    /// Cache TTL as a duration
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    /// Embedding gateway settings
    pub embedding: EmbeddingConfig,

    /// Memory search settings
    pub search: SearchConfig,
}

impl CoreConfig {
    /// Load defaults overlaid with `.env` and `SOVRA__*` environment variables
    ///
    /// Nested keys use `__`, e.g. `SOVRA__EMBEDDING__CACHE_CAPACITY=5000`.
    pub fn from_env() -> SovraResult<Self> {
        dotenv::dotenv().ok();

        let settings = config::Config::builder()
            .add_source(
                config::Environment::with_prefix("SOVRA")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}
