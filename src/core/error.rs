//! Error types for engine operations.

use thiserror::Error;

/// Errors produced by engine components.
///
/// Calendar and clock arithmetic never fails; every error here originates at
/// policy construction or at the storage boundary.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// Operation attempted on a terminal or mismatched-state entity.
    #[error("invalid state: {0}")]
    InvalidState(String),
    /// A conditional update lost a race; re-read and retry.
    #[error("conflict on {entity}: expected {expected}, found {actual}")]
    Conflict {
        /// Entity that was being updated.
        entity: String,
        /// State the caller expected.
        expected: String,
        /// State actually found in storage.
        actual: String,
    },
    /// Referenced entity does not exist.
    #[error("not found: {0}")]
    NotFound(String),
    /// Storage failed or timed out; retryable with backoff.
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),
    /// Business calendar policy is unusable.
    #[error("policy misconfigured: {0}")]
    PolicyMisconfigured(String),
}

impl EngineError {
    /// Build a conflict error from any displayable states.
    pub fn conflict(
        entity: impl Into<String>,
        expected: impl std::fmt::Display,
        actual: impl std::fmt::Display,
    ) -> Self {
        Self::Conflict {
            entity: entity.into(),
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }

    /// Whether the caller may retry the same operation after re-reading.
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::StorageUnavailable(_) | Self::Conflict { .. })
    }
}

/// Result alias for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Application-facing result using anyhow for higher-level contexts.
pub type AppResult<T> = Result<T, anyhow::Error>;
