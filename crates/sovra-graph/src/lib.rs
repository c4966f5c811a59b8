//! # Sovra Graph
//!
//! Directed graph of agent thoughts for trace reconstruction and analysis.
//!
//! - **Nodes** wrap a [`ThoughtUnit`](sovra_rag::thought::ThoughtUnit) with its
//!   depth, root path, degrees and usage counters
//! - **Edges** come from declared parents and from typed relationships
//!   (`support`, `contradiction`, `critique`, ...)
//! - **Analysis**: reasoning chains, cycle detection, connected components and
//!   criteria search, all with explicit-stack traversals
//! - **Export** to JSON, Graphviz DOT or Cytoscape elements
//!
//! Cycles are permitted; [`ReasoningGraphStore::detect_cycles`] reports them
//! without rejecting any write.
//!
//! ## Example
//!
//! ```rust
//! use sovra_graph::{ExportFormat, ReasoningGraphStore};
//! use sovra_rag::thought::{RelationshipType, ThoughtType, ThoughtUnit};
//!
//! # fn main() -> sovra_graph::GraphResult<()> {
//! let graph = ReasoningGraphStore::new();
//!
//! let seen = ThoughtUnit::new("agent", "Error rate doubled", ThoughtType::Observation);
//! let plan = ThoughtUnit::new("agent", "Roll back the deploy", ThoughtType::Plan)
//!     .with_parents([seen.id.clone()]);
//!
//! graph.add_thought(seen.clone())?;
//! let node = graph.add_thought(plan.clone())?;
//! assert_eq!(node.depth, 1);
//!
//! graph.create_relationship(&seen.id, &plan.id, RelationshipType::Support, 0.9)?;
//! let chain = graph.get_reasoning_chain(&plan.id)?;
//! assert_eq!(chain.len(), 2);
//!
//! let dot = graph.export_graph(ExportFormat::Graphviz).render()?;
//! assert!(dot.starts_with("digraph ReasoningGraph {"));
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

mod algorithms;
pub mod error;
pub mod export;
pub mod node;
pub mod store;

pub use error::{GraphError, GraphResult};
pub use export::{ExportFormat, GraphExport};
pub use node::{GraphNode, GraphStats, ThoughtCriteria};
pub use store::ReasoningGraphStore;
