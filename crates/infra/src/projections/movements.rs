use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use moldtrack_core::{AggregateId, UserId};
use moldtrack_events::EventEnvelope;
use moldtrack_stock::{Direction, StockEvent, StockItemId};

use crate::read_model::ReadStore;

use super::ProjectionApplyError;

/// One movement-log row, derived from a `StockAdjusted` event.
///
/// The movement log is a view over the adjustment events, not a second
/// ledger; nothing is ever inserted here that isn't in an event stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovementRecord {
    pub event_id: Uuid,
    pub item_id: StockItemId,
    pub direction: Direction,
    pub quantity: i64,
    pub signed_delta: i64,
    pub actor_id: UserId,
    pub note: Option<String>,
    pub occurred_at: DateTime<Utc>,
    pub sequence_number: u64,
}

/// Movement log projection.
///
/// Maintains the per-item movement history, most recent first.
#[derive(Debug)]
pub struct MovementsProjection<S>
where
    S: ReadStore<StockItemId, Vec<MovementRecord>>,
{
    store: S,
    cursors: RwLock<HashMap<AggregateId, u64>>,
}

impl<S> MovementsProjection<S>
where
    S: ReadStore<StockItemId, Vec<MovementRecord>>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: RwLock::new(HashMap::new()),
        }
    }

    /// Movement history for one item, most recent first.
    pub fn list_for_item(&self, item_id: &StockItemId) -> Vec<MovementRecord> {
        self.store.get(item_id).unwrap_or_default()
    }

    /// All movements across items, most recent first.
    pub fn list_recent(&self, limit: usize) -> Vec<MovementRecord> {
        let mut all: Vec<MovementRecord> = self.store.list().into_iter().flatten().collect();
        all.sort_by(|a, b| {
            b.occurred_at
                .cmp(&a.occurred_at)
                .then(b.sequence_number.cmp(&a.sequence_number))
        });
        all.truncate(limit);
        all
    }

    /// Apply a published envelope into the projection.
    ///
    /// Non-adjustment stock events advance the cursor but add no rows.
    pub fn apply_envelope(
        &self,
        envelope: &EventEnvelope<JsonValue>,
    ) -> Result<(), ProjectionApplyError> {
        let aggregate_id = envelope.aggregate_id();
        let seq = envelope.sequence_number();

        if let Ok(mut cursors) = self.cursors.write() {
            let last = *cursors.get(&aggregate_id).unwrap_or(&0);

            if seq == 0 {
                return Err(ProjectionApplyError::NonMonotonicSequence { last, found: seq });
            }

            if seq <= last {
                // Duplicate or replay; safe to ignore.
                return Ok(());
            }

            if seq != last + 1 && last != 0 {
                return Err(ProjectionApplyError::NonMonotonicSequence { last, found: seq });
            }

            let event: StockEvent = serde_json::from_value(envelope.payload().clone())
                .map_err(|e| ProjectionApplyError::Deserialize(e.to_string()))?;

            if let StockEvent::StockAdjusted(e) = event {
                if e.item_id.0 != aggregate_id {
                    return Err(ProjectionApplyError::StreamMismatch(
                        "event item_id does not match envelope aggregate_id".to_string(),
                    ));
                }

                let record = MovementRecord {
                    event_id: envelope.event_id(),
                    item_id: e.item_id,
                    direction: e.direction,
                    quantity: e.quantity,
                    signed_delta: e.signed_delta(),
                    actor_id: e.actor_id,
                    note: e.note,
                    occurred_at: e.occurred_at,
                    sequence_number: seq,
                };

                let mut history = self.store.get(&e.item_id).unwrap_or_default();
                history.insert(0, record);
                self.store.upsert(e.item_id, history);
            }

            cursors.insert(aggregate_id, seq);
        }

        Ok(())
    }

    /// Rebuild the movement log from scratch by replaying envelopes.
    pub fn rebuild_from_scratch(
        &self,
        envelopes: impl IntoIterator<Item = EventEnvelope<JsonValue>>,
    ) -> Result<(), ProjectionApplyError> {
        if let Ok(mut cursors) = self.cursors.write() {
            cursors.clear();
        }
        self.store.clear();

        let mut envs: Vec<_> = envelopes.into_iter().collect();
        envs.sort_by_key(|e| (*e.aggregate_id().as_uuid().as_bytes(), e.sequence_number()));

        for env in &envs {
            self.apply_envelope(env)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use moldtrack_core::UniqueCode;
    use moldtrack_stock::{ItemKind, ItemRegistered, StockAdjusted, Unit};

    use crate::read_model::InMemoryReadStore;

    use super::*;

    fn projection() -> MovementsProjection<InMemoryReadStore<StockItemId, Vec<MovementRecord>>> {
        MovementsProjection::new(InMemoryReadStore::new())
    }

    fn envelope(event: &StockEvent, aggregate_id: AggregateId, seq: u64) -> EventEnvelope<JsonValue> {
        EventEnvelope::new(
            Uuid::now_v7(),
            aggregate_id,
            "stock.item",
            seq,
            serde_json::to_value(event).unwrap(),
        )
    }

    fn registered(item_id: StockItemId) -> StockEvent {
        StockEvent::ItemRegistered(ItemRegistered {
            item_id,
            kind: ItemKind::Material,
            code: Some(UniqueCode::parse("MAT-01").unwrap()),
            name: "PP granulate".to_string(),
            unit: Unit::Kilograms,
            initial_quantity: 100,
            occurred_at: Utc::now(),
        })
    }

    fn adjusted(item_id: StockItemId, direction: Direction, quantity: i64, note: &str) -> StockEvent {
        StockEvent::StockAdjusted(StockAdjusted {
            item_id,
            direction,
            quantity,
            actor_id: UserId::new(),
            note: Some(note.to_string()),
            occurred_at: Utc::now(),
        })
    }

    #[test]
    fn each_adjustment_becomes_one_record() {
        let projection = projection();
        let aggregate_id = AggregateId::new();
        let item_id = StockItemId::new(aggregate_id);

        projection
            .apply_envelope(&envelope(&registered(item_id), aggregate_id, 1))
            .unwrap();
        projection
            .apply_envelope(&envelope(&adjusted(item_id, Direction::In, 50, "intake"), aggregate_id, 2))
            .unwrap();
        projection
            .apply_envelope(&envelope(
                &adjusted(item_id, Direction::Out, 75, "production"),
                aggregate_id,
                3,
            ))
            .unwrap();

        let history = projection.list_for_item(&item_id);
        assert_eq!(history.len(), 2);

        // Most recent first.
        assert_eq!(history[0].direction, Direction::Out);
        assert_eq!(history[0].signed_delta, -75);
        assert_eq!(history[0].note.as_deref(), Some("production"));
        assert_eq!(history[1].direction, Direction::In);
        assert_eq!(history[1].signed_delta, 50);
    }

    #[test]
    fn registration_adds_no_movement_rows() {
        let projection = projection();
        let aggregate_id = AggregateId::new();
        let item_id = StockItemId::new(aggregate_id);

        projection
            .apply_envelope(&envelope(&registered(item_id), aggregate_id, 1))
            .unwrap();

        assert!(projection.list_for_item(&item_id).is_empty());
    }

    #[test]
    fn duplicate_delivery_does_not_double_log() {
        let projection = projection();
        let aggregate_id = AggregateId::new();
        let item_id = StockItemId::new(aggregate_id);

        projection
            .apply_envelope(&envelope(&registered(item_id), aggregate_id, 1))
            .unwrap();
        let adjust = envelope(&adjusted(item_id, Direction::In, 25, "intake"), aggregate_id, 2);
        projection.apply_envelope(&adjust).unwrap();
        projection.apply_envelope(&adjust).unwrap();

        assert_eq!(projection.list_for_item(&item_id).len(), 1);
    }

    #[test]
    fn list_recent_spans_items() {
        let projection = projection();

        for _ in 0..3 {
            let aggregate_id = AggregateId::new();
            let item_id = StockItemId::new(aggregate_id);
            projection
                .apply_envelope(&envelope(&registered(item_id), aggregate_id, 1))
                .unwrap();
            projection
                .apply_envelope(&envelope(&adjusted(item_id, Direction::In, 10, "intake"), aggregate_id, 2))
                .unwrap();
        }

        assert_eq!(projection.list_recent(10).len(), 3);
        assert_eq!(projection.list_recent(2).len(), 2);
    }
}
