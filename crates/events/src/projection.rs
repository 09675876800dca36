use crate::{Event, EventEnvelope};

/// A projection builds a read model from an append-only event stream.
///
/// Projections transform events (write model) into queryable state (read
/// model): current stock levels, the movement log, open orders. Read models
/// are **disposable** — they can be deleted and rebuilt from events at any
/// time, because events are the source of truth.
///
/// ## Projection Lifecycle
///
/// 1. **Subscribe**: Projection subscribes to events from the event bus (or loads from store)
/// 2. **Apply**: For each event, `apply()` updates the read model
/// 3. **Query**: Read models are queried directly (no event replay needed)
/// 4. **Rebuild**: If needed, projections can be rebuilt from scratch by replaying all events
///
/// ## Idempotency
///
/// Projections must be **idempotent**: applying the same event multiple times
/// should produce the same result. This is what makes at-least-once delivery,
/// replay, and crash recovery safe. The `ProjectionRunner` helps by tracking
/// sequence numbers and skipping duplicates, but projections should still be
/// designed to tolerate a duplicate at the domain level.
///
/// ## Persistence
///
/// This trait doesn't define how read models are stored; that's an
/// infrastructure concern. Projections are pure event consumers.
pub trait Projection {
    type Ev: Event;

    /// Apply a single event to the projection, updating the read model.
    ///
    /// Must be **idempotent**: applying the same event twice should produce
    /// the same result (or be a no-op if already processed).
    ///
    /// This method doesn't return errors. An event that isn't relevant to
    /// this projection should be ignored; an event that can't be processed
    /// should be logged and skipped. For structured error handling use
    /// `ProjectionRunner::apply()` which returns `ProjectionError`.
    fn apply(&mut self, envelope: &EventEnvelope<Self::Ev>);
}
