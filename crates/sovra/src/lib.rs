//! # Sovra - Reasoning Memory for Sovereign Agents
//!
//! **Sovra** brings together:
//!
//! - **Sovra RAG**: thoughts and traces, a cached embedding gateway and
//!   access-controlled semantic memory with ranked search
//! - **Sovra Graph**: the reasoning graph with chain reconstruction, cycle and
//!   component analysis and visualization exports
//!
//! [`ReasoningMemory`] wires them together: a recorded thought is embedded,
//! persisted, then indexed in the graph below its parents.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use sovra::prelude::*;
//! use std::result::Result;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = CoreConfig::from_env()?;
//!     let memory = ReasoningMemory::new(Arc::new(HashEmbeddingProvider::new(384)), &config);
//!
//!     let seen = ThoughtUnit::new("agent", "Queue depth keeps growing", ThoughtType::Observation);
//!     let plan = ThoughtUnit::new("agent", "Add two more consumers", ThoughtType::Plan)
//!         .with_confidence(0.8)
//!         .with_parents([seen.id.clone()]);
//!
//!     memory.record_thought(seen, None).await?;
//!     let recorded = memory.record_thought(plan, None).await?;
//!     println!("plan depth {}", recorded.node.depth);
//!
//!     let hits = memory
//!         .search(&MemoryQuery::hybrid("queue consumers", Requester::agent("agent")))
//!         .await?;
//!     println!("{} memories", hits.total_matches);
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//!            ┌──────────────────────┐
//!            │   ReasoningMemory    │
//!            └──────────┬───────────┘
//!          ┌────────────┴────────────┐
//!  ┌───────▼────────┐       ┌────────▼────────┐
//!  │ SemanticMemory │       │ ReasoningGraph  │
//!  └───────┬────────┘       └─────────────────┘
//!  ┌───────▼────────┐
//!  │ EmbeddingGateway│
//!  └────────────────┘
//! ```

#![warn(missing_docs)]

pub mod error;
mod memory;

pub use error::{Error, Result};
pub use memory::{ReasoningMemory, RecordedThought};

pub use sovra_graph;
pub use sovra_rag;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{Error, ReasoningMemory, RecordedThought, Result};
    pub use sovra_graph::{
        ExportFormat, GraphExport, GraphNode, GraphStats, ReasoningGraphStore, ThoughtCriteria,
    };
    pub use sovra_rag::prelude::*;
}
