//! Stream envelope wrapping a domain event.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use moldtrack_core::AggregateId;

/// A domain event plus its position in an aggregate stream.
///
/// This is what crosses the wire between the store, the bus and the
/// projections. The payload stays opaque here; consumers that care about
/// its shape deserialize it against the event types they know.
///
/// `sequence_number` is assigned by the store at append time and is
/// strictly increasing within one stream. Projections lean on it for
/// idempotency: an envelope at or below the cursor has already been seen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventEnvelope<E> {
    event_id: Uuid,
    aggregate_id: AggregateId,
    aggregate_type: String,
    sequence_number: u64,
    payload: E,
}

impl<E> EventEnvelope<E> {
    pub fn new(
        event_id: Uuid,
        aggregate_id: AggregateId,
        aggregate_type: impl Into<String>,
        sequence_number: u64,
        payload: E,
    ) -> Self {
        Self {
            event_id,
            aggregate_id,
            aggregate_type: aggregate_type.into(),
            sequence_number,
            payload,
        }
    }

    pub fn event_id(&self) -> Uuid {
        self.event_id
    }

    /// The stream this envelope belongs to.
    pub fn aggregate_id(&self) -> AggregateId {
        self.aggregate_id
    }

    /// Stream type tag ("stock.item", "orders.order", ...); workers use it
    /// to route envelopes to the projections that understand them.
    pub fn aggregate_type(&self) -> &str {
        &self.aggregate_type
    }

    /// Position within the aggregate stream, starting at 1.
    pub fn sequence_number(&self) -> u64 {
        self.sequence_number
    }

    pub fn payload(&self) -> &E {
        &self.payload
    }

    pub fn into_payload(self) -> E {
        self.payload
    }
}
