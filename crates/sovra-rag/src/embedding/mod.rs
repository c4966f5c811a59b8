//! # Embedding Gateway
//!
//! Converts text to fixed-dimension vectors through a pluggable
//! [`EmbeddingProvider`], with a bounded, TTL-aware cache in front of the
//! provider and similarity/clustering primitives for the layers above.
//!
//! ## Example
//!
//! ```rust,no_run
//! use sovra_rag::embedding::{EmbeddingGateway, HashEmbeddingProvider};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let gateway = EmbeddingGateway::with_provider(Arc::new(HashEmbeddingProvider::new(384)));
//!
//! let first = gateway.embed("Check the cache before calling the provider").await?;
//! let again = gateway.embed("check the cache before calling the provider").await?;
//! assert!(again.cache_hit);
//!
//! let sim = EmbeddingGateway::similarity(&first.vector, &again.vector);
//! assert!(sim.cosine > 0.99);
//! # Ok(())
//! # }
//! ```

mod cache;
mod gateway;
mod provider;
pub mod similarity;

#[cfg(feature = "http")]
mod openai;

pub use cache::{cache_key, CacheStats, CachedEmbedding, EmbeddingCache};
pub use gateway::{EmbeddingGateway, EmbeddingResult};
pub use provider::{EmbeddingProvider, FallbackProvider, HashEmbeddingProvider, ProviderEmbedding};
pub use similarity::{Cluster, ScoredMatch, Similarity};

#[cfg(feature = "http")]
pub use openai::OpenAiEmbeddingProvider;
