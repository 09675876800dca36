//! Projection implementations (read model builders).
//!
//! Projections consume published event envelopes and build query-optimized
//! read models. All projections are:
//! - **Rebuildable**: Can be reconstructed from the event stream
//! - **Idempotent**: Safe for at-least-once delivery

use thiserror::Error;

pub mod machines;
pub mod movements;
pub mod orders;
pub mod production_log;
pub mod stock_levels;

pub use machines::{MachineReadModel, MachinesProjection};
pub use movements::{MovementRecord, MovementsProjection};
pub use orders::{OrderLineReadModel, OrderReadModel, OrdersProjection};
pub use production_log::{ProductionLogEntry, ProductionLogProjection};
pub use stock_levels::{StockLevelReadModel, StockLevelsProjection};

/// Errors raised while applying an envelope to a projection.
#[derive(Debug, Error)]
pub enum ProjectionApplyError {
    #[error("failed to deserialize event payload: {0}")]
    Deserialize(String),

    #[error("envelope does not belong to this stream: {0}")]
    StreamMismatch(String),

    #[error("non-monotonic sequence number (last={last}, found={found})")]
    NonMonotonicSequence { last: u64, found: u64 },
}
