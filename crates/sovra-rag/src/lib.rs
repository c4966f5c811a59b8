//! # Sovra RAG
//!
//! Retrieval layer of the sovereign-agent reasoning memory core:
//!
//! - **Thoughts**: atomic units of agent cognition, ReAct traces and typed
//!   relationships, each anchored by a SHA-256 content hash
//! - **Embedding Gateway**: provider-agnostic text embeddings behind a bounded
//!   TTL cache, with similarity, top-k and clustering primitives
//! - **Semantic Memory**: durable records under access policies, searched by
//!   keyword, vector or hybrid relevance and ranked with importance and recency
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use sovra_rag::prelude::*;
//! use std::sync::Arc;
//!
//! # async fn example() -> SovraResult<()> {
//! let gateway = Arc::new(EmbeddingGateway::with_provider(Arc::new(HashEmbeddingProvider::new(384))));
//! let memory = SemanticMemoryStore::new(gateway, SearchConfig::default());
//!
//! let id = memory
//!     .store(MemoryContent::note("Provider timeouts cluster around midnight"), "ops-agent", None)
//!     .await?;
//! let record = memory.get(&id, &Requester::agent("ops-agent")).await?;
//! assert!(record.verify_integrity());
//! # Ok(())
//! # }
//! ```
//!
//! ## Features
//!
//! - `http` (default): OpenAI-compatible HTTP embedding provider

#![warn(missing_docs)]

pub mod config;
pub mod embedding;
pub mod error;
pub mod memory;
pub mod thought;

pub use error::{ProviderError, SovraError, SovraResult};

/// Commonly used types
pub mod prelude {
    pub use crate::config::{CoreConfig, EmbeddingConfig, RankingWeights, SearchConfig};
    pub use crate::embedding::{
        EmbeddingGateway, EmbeddingProvider, EmbeddingResult, FallbackProvider,
        HashEmbeddingProvider, Similarity,
    };
    pub use crate::error::{ProviderError, SovraError, SovraResult};
    pub use crate::memory::{
        AccessPolicy, ContentType, IdentityResolver, MemoryContent, MemoryQuery, MemoryRecord,
        MemoryUpdate, QueryType, RecordStore, Requester, SearchResults, SemanticMemoryStore,
    };
    pub use crate::thought::{
        ConfidenceBand, ReasoningTrace, RelationshipType, ThoughtRelationship, ThoughtType,
        ThoughtUnit, TraceAction,
    };

    #[cfg(feature = "http")]
    pub use crate::embedding::OpenAiEmbeddingProvider;
}
