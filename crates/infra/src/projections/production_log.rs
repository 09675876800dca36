use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;

use moldtrack_core::{AggregateId, UserId};
use moldtrack_events::EventEnvelope;
use moldtrack_production::{MachineId, ProductionRunEvent, ProductionRunId, BAG_KILOGRAMS};
use moldtrack_stock::StockItemId;

use crate::read_model::ReadStore;

use super::ProjectionApplyError;

/// One production-log row, derived from a `ProductionRecorded` event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductionLogEntry {
    pub run_id: ProductionRunId,
    pub mold_item_id: StockItemId,
    pub material_item_id: StockItemId,
    pub machine_id: MachineId,
    pub good_quantity: i64,
    pub bags_used: i64,
    pub material_kilograms: i64,
    pub actor_id: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Production log projection.
#[derive(Debug)]
pub struct ProductionLogProjection<S>
where
    S: ReadStore<ProductionRunId, ProductionLogEntry>,
{
    store: S,
    cursors: RwLock<HashMap<AggregateId, u64>>,
}

impl<S> ProductionLogProjection<S>
where
    S: ReadStore<ProductionRunId, ProductionLogEntry>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: RwLock::new(HashMap::new()),
        }
    }

    pub fn get(&self, run_id: &ProductionRunId) -> Option<ProductionLogEntry> {
        self.store.get(run_id)
    }

    /// All recorded runs, most recent first.
    pub fn list(&self) -> Vec<ProductionLogEntry> {
        let mut entries = self.store.list();
        entries.sort_by(|a, b| b.occurred_at.cmp(&a.occurred_at));
        entries
    }

    /// Runs executed on one machine, most recent first.
    pub fn list_for_machine(&self, machine_id: &MachineId) -> Vec<ProductionLogEntry> {
        self.list()
            .into_iter()
            .filter(|e| e.machine_id == *machine_id)
            .collect()
    }

    /// Apply a published envelope into the projection.
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

            let event: ProductionRunEvent = serde_json::from_value(envelope.payload().clone())
                .map_err(|e| ProjectionApplyError::Deserialize(e.to_string()))?;

            let ProductionRunEvent::ProductionRecorded(e) = event;

            if e.run_id.0 != aggregate_id {
                return Err(ProjectionApplyError::StreamMismatch(
                    "event run_id does not match envelope aggregate_id".to_string(),
                ));
            }

            self.store.upsert(
                e.run_id,
                ProductionLogEntry {
                    run_id: e.run_id,
                    mold_item_id: e.mold_item_id,
                    material_item_id: e.material_item_id,
                    machine_id: e.machine_id,
                    good_quantity: e.good_quantity,
                    bags_used: e.bags_used,
                    material_kilograms: e.bags_used * BAG_KILOGRAMS,
                    actor_id: e.actor_id,
                    occurred_at: e.occurred_at,
                },
            );

            cursors.insert(aggregate_id, seq);
        }

        Ok(())
    }

    /// Rebuild the production log from scratch by replaying envelopes.
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
