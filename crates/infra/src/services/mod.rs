//! Application services.
//!
//! Services orchestrate commands across aggregates and read models. Each
//! multi-step flow follows the same ordering rule: stock movements are
//! appended to the ledger first, status flips come last, so an interrupted
//! flow leaves resumable markers instead of phantom state.

pub mod fulfillment;
pub mod intake;
pub mod ledger;
pub mod production;
pub mod reconcile;
pub mod resolver;

pub use fulfillment::{DeliveryReport, DeliveryService};
pub use intake::IntakeService;
pub use ledger::StockLedger;
pub use production::ProductionService;
pub use reconcile::{ReconciliationEntry, ReconciliationReport, ReconciliationService};
pub use resolver::{CodeDirectory, IdentityResolver};

use std::time::Duration;

use thiserror::Error;

use moldtrack_core::DomainError;

use crate::command_dispatcher::DispatchError;

/// Errors surfaced by the application services.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("not found")]
    NotFound,

    #[error("validation failed: {0}")]
    Validation(String),

    /// The operation did not complete within its deadline. The outcome is
    /// unknown; a timed-out dispatch may still complete in the background.
    #[error("operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("persistence failure: {0}")]
    Persistence(String),

    /// Concurrent writers kept colliding after bounded retries.
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("order already delivered")]
    AlreadyDelivered,

    /// Some steps of a multi-step flow committed before a later step failed.
    /// The committed steps are durable; the flow can be retried and resumes
    /// from the recorded markers.
    #[error("partial failure: {0}")]
    PartialFailure(String),

    #[error("unauthorized")]
    Unauthorized,

    #[error("invariant violated: {0}")]
    InvariantViolation(String),
}

impl From<DispatchError> for ServiceError {
    fn from(err: DispatchError) -> Self {
        match err {
            DispatchError::Concurrency(msg) => ServiceError::Conflict(msg),
            DispatchError::Validation(msg) => ServiceError::Validation(msg),
            DispatchError::InvariantViolation(msg) => ServiceError::InvariantViolation(msg),
            DispatchError::Unauthorized => ServiceError::Unauthorized,
            DispatchError::NotFound => ServiceError::NotFound,
            DispatchError::AlreadyDelivered => ServiceError::AlreadyDelivered,
            DispatchError::Deserialize(msg) => ServiceError::Persistence(msg),
            DispatchError::Store(e) => ServiceError::Persistence(e.to_string()),
            DispatchError::Publish(msg) => ServiceError::Persistence(msg),
        }
    }
}

impl From<DomainError> for ServiceError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::Validation(msg) => ServiceError::Validation(msg),
            DomainError::InvariantViolation(msg) => ServiceError::InvariantViolation(msg),
            DomainError::InvalidId(msg) => ServiceError::Validation(msg),
            DomainError::NotFound => ServiceError::NotFound,
            DomainError::Conflict(msg) => ServiceError::Conflict(msg),
            DomainError::AlreadyDelivered => ServiceError::AlreadyDelivered,
            DomainError::Unauthorized => ServiceError::Unauthorized,
        }
    }
}

/// Run a blocking dispatch on the blocking pool with a deadline.
pub(crate) async fn run_blocking<T, F>(deadline: Duration, f: F) -> Result<T, ServiceError>
where
    F: FnOnce() -> Result<T, ServiceError> + Send + 'static,
    T: Send + 'static,
{
    match tokio::time::timeout(deadline, tokio::task::spawn_blocking(f)).await {
        Ok(Ok(result)) => result,
        Ok(Err(join)) => Err(ServiceError::Persistence(join.to_string())),
        Err(_) => Err(ServiceError::Timeout(deadline)),
    }
}
