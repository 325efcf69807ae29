//! Domain errors for the CipherSwarm coordination core.

use thiserror::Error;
use uuid::Uuid;

/// Domain-level errors that can occur in the coordination core.
///
/// Every core operation returns one of these kinds; the HTTP surfaces
/// translate them into their own wire shapes.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("{entity} {id} was modified by a concurrent writer")]
    StaleVersion { entity: &'static str, id: Uuid },

    #[error("status report is older than the accepted state")]
    Stale,

    #[error("task work was preempted by the server")]
    Preempted,

    #[error("malformed request: {0}")]
    Malformed(String),

    #[error("too many requests")]
    TooManyRequests,

    #[error("operation timed out")]
    Timeout,

    #[error("database error: {0}")]
    Database(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl DomainError {
    /// Shorthand for a [`DomainError::NotFound`] over a UUID-keyed entity.
    pub fn not_found(entity: &'static str, id: Uuid) -> Self {
        Self::NotFound { entity, id: id.to_string() }
    }

    /// Whether a caller holding fresh state may safely retry the operation.
    ///
    /// Only optimistic-version collisions and timeouts qualify; everything
    /// else reflects a semantic outcome that a retry would repeat.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::StaleVersion { .. } | Self::Timeout)
    }
}

pub type DomainResult<T> = Result<T, DomainError>;

impl From<sqlx::Error> for DomainError {
    fn from(err: sqlx::Error) -> Self {
        DomainError::Database(err.to_string())
    }
}

impl From<serde_json::Error> for DomainError {
    fn from(err: serde_json::Error) -> Self {
        DomainError::Serialization(err.to_string())
    }
}
