//! # Semantic Memory
//!
//! Durable memory records (thoughts, traces and notes together with their
//! embeddings) guarded by access policies and served through ranked search.
//!
//! Ranking combines three signals:
//! - **relevance**: Jaccard token overlap for keyword queries, cosine similarity
//!   against the query embedding for vector and hybrid queries
//! - **importance**: fixed at write time from confidence, thought type or trace outcome
//! - **recency**: linear decay to zero over the configured window
//!
//! Records a requester may not read are left out of search results silently;
//! a direct [`SemanticMemoryStore::get`] reports `AccessDenied`.
//!
//! ## Example
//!
//! ```rust,no_run
//! use sovra_rag::config::SearchConfig;
//! use sovra_rag::embedding::{EmbeddingGateway, HashEmbeddingProvider};
//! use sovra_rag::memory::{MemoryContent, MemoryQuery, Requester, SemanticMemoryStore};
//! use sovra_rag::thought::{ThoughtType, ThoughtUnit};
//! use std::sync::Arc;
//!
//! # async fn example() -> sovra_rag::error::SovraResult<()> {
//! let gateway = Arc::new(EmbeddingGateway::with_provider(Arc::new(HashEmbeddingProvider::new(384))));
//! let store = SemanticMemoryStore::new(gateway, SearchConfig::default());
//!
//! let thought = ThoughtUnit::new("planner", "Batch provider calls to cut latency", ThoughtType::Plan)
//!     .with_confidence(0.8);
//! store.store(MemoryContent::Thought(thought), "planner", None).await?;
//!
//! let page = store
//!     .search(&MemoryQuery::hybrid("provider latency", Requester::agent("planner")).with_limit(5))
//!     .await?;
//! for hit in &page.results {
//!     println!("{:.2} {}", hit.score, hit.record.content);
//! }
//! # Ok(())
//! # }
//! ```

mod policy;
mod query;
mod record;
mod search_cache;
mod storage;
mod store;
pub mod text;

pub use policy::{
    AccessDecision, AccessPolicy, DenyReason, IdentityResolver, Requester, StaticIdentityResolver,
};
pub use query::{MemoryQuery, QueryType, ScoredRecord, SearchFilters, SearchResults};
pub use record::{ContentType, MemoryContent, MemoryRecord, MemoryUpdate};
pub use storage::{InMemoryRecordStore, RecordStore};
pub use store::{MemoryStats, SemanticMemoryStore};
