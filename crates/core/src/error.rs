//! Domain error model.

use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Deterministic business failure.
///
/// Only outcomes a domain rule can produce belong here; IO and storage
/// failures are modelled by the infrastructure layer. Callers rely on the
/// variants to pick a response: a `Validation` is the caller's fault, a
/// `Conflict` is retryable, an `InvariantViolation` means the requested
/// state transition is not allowed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Input failed a domain rule (empty code, non-positive quantity,
    /// insufficient stock).
    #[error("validation failed: {0}")]
    Validation(String),

    /// The transition would leave the aggregate in an illegal state.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    /// A textual identifier did not parse.
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// The referenced aggregate or line does not exist.
    #[error("not found")]
    NotFound,

    /// Concurrent modification or a repeat of a one-shot operation.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Delivery is one-way; a delivered order cannot be delivered again.
    #[error("order already delivered")]
    AlreadyDelivered,

    /// The actor may not perform this operation.
    #[error("unauthorized")]
    Unauthorized,
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn not_found() -> Self {
        Self::NotFound
    }
}
