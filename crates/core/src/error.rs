//! Domain error model.

use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Every variant is a recoverable, client-facing failure. Infrastructure
/// concerns (store outages, serialization) belong elsewhere.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Malformed input or a violated business rule.
    #[error("validation failed: {0}")]
    Validation(String),

    /// A referenced entity does not exist. Carries what was looked up.
    #[error("{0} not found")]
    NotFound(String),

    /// The operation is not valid for the entity's current lifecycle state.
    #[error("state conflict: {0}")]
    StateConflict(String),

    /// The acting user lacks the role or machine permission.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// An identifier could not be parsed.
    #[error("invalid identifier: {0}")]
    InvalidId(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::StateConflict(msg.into())
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }
}
