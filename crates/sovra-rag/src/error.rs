//! Error taxonomy for the reasoning memory core
//!
//! Validation failures are rejected before any state is touched, provider
//! failures carry enough context (operation, text hash) for the caller to
//! retry, and access denial is only ever reported on direct reads.

use std::time::Duration;
use thiserror::Error;

/// Result alias used across the crate
pub type SovraResult<T> = std::result::Result<T, SovraError>;

/// Failures raised at the embedding provider boundary
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Transport-level failure (connection refused, reset, DNS)
    #[error("network failure: {0}")]
    Network(String),

    /// Provider answered with a non-success status
    #[error("provider returned HTTP {status}: {body}")]
    Http {
        /// HTTP status code
        status: u16,
        /// Response body (truncated by the provider implementation)
        body: String,
    },

    /// Call exceeded the configured per-call timeout
    #[error("provider call timed out after {after:?}")]
    Timeout {
        /// The timeout that elapsed
        after: Duration,
    },

    /// Provider answered but the payload was unusable
    #[error("invalid provider response: {0}")]
    InvalidResponse(String),

    /// Provider is not configured or refuses work
    #[error("provider unavailable: {0}")]
    Unavailable(String),
}

/// Main error type for memory operations
#[derive(Debug, Error)]
pub enum SovraError {
    /// Malformed thought, query or record; raised before any mutation
    #[error("validation failed for {field}: {constraint} (got {value})")]
    Validation {
        /// Offending field
        field: String,
        /// Constraint that was violated
        constraint: String,
        /// Rendered offending value
        value: String,
    },

    /// Unknown identifier
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Kind of entity looked up
        entity: String,
        /// Identifier that was not found
        id: String,
    },

    /// Requester is not allowed to read or modify the record
    #[error("access denied to record {record_id} for {requester}")]
    AccessDenied {
        /// Record the request targeted
        record_id: String,
        /// Requester identity
        requester: String,
    },

    /// Embedding provider failure; retryable by the caller
    #[error("provider error during {operation} (text hash {text_hash}): {source}")]
    Provider {
        /// Operation that invoked the provider
        operation: String,
        /// SHA-256 of the normalized input text
        text_hash: String,
        /// Underlying provider failure
        #[source]
        source: ProviderError,
    },

    /// Backing store failure
    #[error("storage operation {operation} failed: {message}")]
    Storage {
        /// Store operation
        operation: String,
        /// Underlying message
        message: String,
    },

    /// Serialization failure
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration could not be loaded
    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),
}

impl SovraError {
    /// Create a validation error
    pub fn validation(
        field: impl Into<String>,
        constraint: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self::Validation {
            field: field.into(),
            constraint: constraint.into(),
            value: value.into(),
        }
    }

    /// Create a not-found error
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Create an access-denied error
    pub fn access_denied(record_id: impl Into<String>, requester: impl Into<String>) -> Self {
        Self::AccessDenied {
            record_id: record_id.into(),
            requester: requester.into(),
        }
    }

    /// Wrap a provider failure with its call context
    pub fn provider(
        operation: impl Into<String>,
        text_hash: impl Into<String>,
        source: ProviderError,
    ) -> Self {
        Self::Provider {
            operation: operation.into(),
            text_hash: text_hash.into(),
            source,
        }
    }

    /// Create a storage error
    pub fn storage(operation: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::Storage {
            operation: operation.into(),
            message: message.to_string(),
        }
    }

    /// Whether the caller may retry the failed operation
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Provider { .. })
    }
}
