//! Errors surfaced by the combined reasoning memory

use sovra_graph::GraphError;
use sovra_rag::SovraError;
use thiserror::Error;

/// Result type for [`ReasoningMemory`](crate::ReasoningMemory) operations
pub type Result<T> = std::result::Result<T, Error>;

/// Failure in either the memory store or the reasoning graph
#[derive(Debug, Error)]
pub enum Error {
    /// Embedding or semantic memory failure
    #[error(transparent)]
    Memory(#[from] SovraError),

    /// Reasoning graph failure
    #[error(transparent)]
    Graph(#[from] GraphError),
}

impl Error {
    /// Whether retrying the call may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Memory(e) if e.is_retryable())
    }
}
