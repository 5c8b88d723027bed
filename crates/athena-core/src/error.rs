//! Error taxonomy
//!
//! One contract-level error type shared by every layer store, the
//! retrieval engine, the consolidation pipeline, and the verification
//! gateway. Names and meanings follow the propagation policy: storage
//! `Unavailable` is retried by callers with backoff, `EmbeddingUnavailable`
//! degrades retrieval to lexical-only, `Conflict` on dedup is swallowed at
//! the ingest boundary, everywhere else it is surfaced.

use thiserror::Error;

/// Contract-level error shared across the memory core.
#[derive(Debug, Error)]
pub enum AthenaError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("precondition failed ({reason}): {detail}")]
    PreconditionFailed { reason: String, detail: String },

    #[error("deadline exceeded")]
    DeadlineExceeded,

    #[error("cancelled")]
    Cancelled,

    #[error("resource exhausted: {0}")]
    ResourceExhausted(String),

    #[error("backend unavailable: {0}")]
    Unavailable(String),

    #[error("embedding collaborator unavailable: {0}")]
    EmbeddingUnavailable(String),

    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    EmbeddingDimMismatch { expected: usize, actual: usize },

    #[error("llm collaborator unavailable: {0}")]
    LlmUnavailable(String),

    #[error("storage corruption: {0}")]
    Corruption(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl AthenaError {
    /// Whether this error should be retried with backoff by a storage caller.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AthenaError::Unavailable(_))
    }

    /// Whether this failure is fatal and must be surfaced to the health probe.
    pub fn is_fatal(&self) -> bool {
        matches!(self, AthenaError::Internal(_) | AthenaError::Corruption(_))
    }

    /// Machine-readable status code carried in every tool response.
    pub fn code(&self) -> &'static str {
        match self {
            AthenaError::InvalidArgument(_) => "INVALID_ARGUMENT",
            AthenaError::NotFound(_) => "NOT_FOUND",
            AthenaError::Conflict(_) => "CONFLICT",
            AthenaError::PreconditionFailed { .. } => "PRECONDITION_FAILED",
            AthenaError::DeadlineExceeded => "DEADLINE_EXCEEDED",
            AthenaError::Cancelled => "CANCELLED",
            AthenaError::ResourceExhausted(_) => "RESOURCE_EXHAUSTED",
            AthenaError::Unavailable(_) => "UNAVAILABLE",
            AthenaError::EmbeddingUnavailable(_) => "EMBEDDING_UNAVAILABLE",
            AthenaError::EmbeddingDimMismatch { .. } => "EMBEDDING_DIM_MISMATCH",
            AthenaError::LlmUnavailable(_) => "LLM_UNAVAILABLE",
            AthenaError::Corruption(_) => "CORRUPTION",
            AthenaError::Internal(_) => "INTERNAL",
        }
    }
}

impl From<rusqlite::Error> for AthenaError {
    fn from(e: rusqlite::Error) -> Self {
        match e {
            rusqlite::Error::QueryReturnedNoRows => AthenaError::NotFound(e.to_string()),
            other => AthenaError::Unavailable(other.to_string()),
        }
    }
}

/// Result type used throughout the memory core.
pub type Result<T> = std::result::Result<T, AthenaError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fatal_errors_are_internal_and_corruption_only() {
        assert!(AthenaError::Internal("x".into()).is_fatal());
        assert!(AthenaError::Corruption("x".into()).is_fatal());
        assert!(!AthenaError::NotFound("x".into()).is_fatal());
    }

    #[test]
    fn only_unavailable_is_retryable() {
        assert!(AthenaError::Unavailable("x".into()).is_retryable());
        assert!(!AthenaError::Conflict("x".into()).is_retryable());
    }
}
