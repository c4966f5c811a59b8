//! Error types for the reasoning graph

use sovra_rag::SovraError;
use thiserror::Error;

/// Result type for graph operations
pub type GraphResult<T> = Result<T, GraphError>;

/// Errors raised by the reasoning graph store
#[derive(Debug, Error)]
pub enum GraphError {
    /// Rejected input; the graph is left unchanged
    #[error("validation failed for {field}: {reason}")]
    Validation {
        /// Offending field
        field: String,
        /// Why it was rejected
        reason: String,
    },

    /// The thought failed its own validation
    #[error("invalid thought: {0}")]
    InvalidThought(#[from] SovraError),

    /// Unknown thought id
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Kind of entity looked up
        entity: String,
        /// Identifier that was not found
        id: String,
    },

    /// Export format outside the supported set
    #[error("unsupported export format: {0}")]
    UnsupportedFormat(String),

    /// Serialization failure
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl GraphError {
    /// Create a validation error
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Unknown thought
    pub fn thought_not_found(id: impl Into<String>) -> Self {
        Self::NotFound {
            entity: "thought".to_string(),
            id: id.into(),
        }
    }
}
