use std::collections::HashMap;
use std::sync::RwLock;

use serde_json::Value as JsonValue;

use moldtrack_core::AggregateId;
use moldtrack_events::EventEnvelope;
use moldtrack_stock::{ItemKind, StockEvent, StockItemId, Unit};

use crate::read_model::ReadStore;

use super::ProjectionApplyError;

/// Queryable stock read model: current on-hand quantity per item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockLevelReadModel {
    pub item_id: StockItemId,
    pub kind: ItemKind,
    pub code: Option<String>,
    pub name: String,
    pub unit: Unit,
    pub quantity: i64,
    pub retired: bool,
}

/// Stock levels projection.
///
/// Consumes published envelopes (JSON payloads) and maintains the current
/// quantity per item, plus a code index so scan-driven flows can resolve a
/// unique code to an item without replaying streams.
#[derive(Debug)]
pub struct StockLevelsProjection<S>
where
    S: ReadStore<StockItemId, StockLevelReadModel>,
{
    store: S,
    code_index: RwLock<HashMap<String, StockItemId>>,
    cursors: RwLock<HashMap<AggregateId, u64>>,
}

impl<S> StockLevelsProjection<S>
where
    S: ReadStore<StockItemId, StockLevelReadModel>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            code_index: RwLock::new(HashMap::new()),
            cursors: RwLock::new(HashMap::new()),
        }
    }

    pub fn get(&self, item_id: &StockItemId) -> Option<StockLevelReadModel> {
        self.store.get(item_id)
    }

    pub fn list(&self) -> Vec<StockLevelReadModel> {
        self.store.list()
    }

    /// Resolve a unique code (already canonicalized) to its item.
    pub fn get_by_code(&self, code: &str) -> Option<StockLevelReadModel> {
        let item_id = {
            let index = self.code_index.read().ok()?;
            *index.get(code)?
        };
        self.store.get(&item_id)
    }

    /// Apply a published envelope into the projection.
    ///
    /// - Enforces monotonic sequence per aggregate stream
    /// - Idempotent for at-least-once delivery (replays <= cursor are ignored)
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

            let item_id = match &event {
                StockEvent::ItemRegistered(e) => e.item_id,
                StockEvent::StockAdjusted(e) => e.item_id,
                StockEvent::ComponentLinked(e) => e.item_id,
                StockEvent::ItemRetired(e) => e.item_id,
            };

            if item_id.0 != aggregate_id {
                return Err(ProjectionApplyError::StreamMismatch(
                    "event item_id does not match envelope aggregate_id".to_string(),
                ));
            }

            match event {
                StockEvent::ItemRegistered(e) => {
                    if let Some(code) = &e.code {
                        if let Ok(mut index) = self.code_index.write() {
                            index.insert(code.as_str().to_string(), e.item_id);
                        }
                    }
                    self.store.upsert(
                        e.item_id,
                        StockLevelReadModel {
                            item_id: e.item_id,
                            kind: e.kind,
                            code: e.code.map(|c| c.as_str().to_string()),
                            name: e.name,
                            unit: e.unit,
                            quantity: e.initial_quantity,
                            retired: false,
                        },
                    );
                }
                StockEvent::StockAdjusted(e) => {
                    if let Some(mut rm) = self.store.get(&e.item_id) {
                        rm.quantity += e.signed_delta();
                        self.store.upsert(e.item_id, rm);
                    }
                }
                StockEvent::ComponentLinked(_) => {
                    // BOM links don't change on-hand quantities.
                }
                StockEvent::ItemRetired(e) => {
                    if let Some(mut rm) = self.store.get(&e.item_id) {
                        rm.retired = true;
                        self.store.upsert(e.item_id, rm);
                    }
                }
            }

            // Advance cursor after successful apply.
            cursors.insert(aggregate_id, seq);
        }

        Ok(())
    }

    /// Rebuild the read model from scratch by replaying envelopes.
    pub fn rebuild_from_scratch(
        &self,
        envelopes: impl IntoIterator<Item = EventEnvelope<JsonValue>>,
    ) -> Result<(), ProjectionApplyError> {
        if let Ok(mut cursors) = self.cursors.write() {
            cursors.clear();
        }
        if let Ok(mut index) = self.code_index.write() {
            index.clear();
        }
        self.store.clear();

        let mut envs: Vec<_> = envelopes.into_iter().collect();

        // Deterministic replay order: aggregate, then sequence.
        envs.sort_by_key(|e| (*e.aggregate_id().as_uuid().as_bytes(), e.sequence_number()));

        for env in &envs {
            self.apply_envelope(env)?;
        }

        Ok(())
    }
}
