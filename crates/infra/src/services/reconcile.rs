use std::sync::Arc;

use tracing::{instrument, warn};

use moldtrack_events::{EventEnvelope, Projection, ProjectionRunner};
use moldtrack_stock::{StockEvent, StockItemId};

use crate::event_store::{EventStore, StoredEvent};
use crate::projections::{StockLevelReadModel, StockLevelsProjection};
use crate::read_model::ReadStore;

use super::ServiceError;

/// One audited item: the projected quantity versus the ledger-derived one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconciliationEntry {
    pub item_id: StockItemId,
    pub projected_quantity: i64,
    pub ledger_quantity: i64,
}

impl ReconciliationEntry {
    pub fn is_divergent(&self) -> bool {
        self.projected_quantity != self.ledger_quantity
    }
}

/// Result of one reconciliation pass over all projected items.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconciliationReport {
    pub entries: Vec<ReconciliationEntry>,
}

impl ReconciliationReport {
    pub fn divergent(&self) -> impl Iterator<Item = &ReconciliationEntry> {
        self.entries.iter().filter(|e| e.is_divergent())
    }

    pub fn is_clean(&self) -> bool {
        self.entries.iter().all(|e| !e.is_divergent())
    }
}

/// Reconciliation audit.
///
/// Recomputes each item's on-hand quantity from its event stream (initial
/// quantity plus the sum of signed adjustment deltas) and compares it with
/// the stock-levels read model. A divergence means a projection bug or a
/// half-applied flow; the event streams stay authoritative either way.
pub struct ReconciliationService<E, S>
where
    S: ReadStore<StockItemId, StockLevelReadModel>,
{
    store: Arc<E>,
    projection: Arc<StockLevelsProjection<S>>,
}

impl<E, S> ReconciliationService<E, S>
where
    E: EventStore,
    S: ReadStore<StockItemId, StockLevelReadModel>,
{
    pub fn new(store: Arc<E>, projection: Arc<StockLevelsProjection<S>>) -> Self {
        Self { store, projection }
    }

    #[instrument(skip(self), err)]
    pub fn reconcile(&self) -> Result<ReconciliationReport, ServiceError> {
        let mut entries = Vec::new();

        for rm in self.projection.list() {
            let stream = self
                .store
                .load_stream(rm.item_id.0)
                .map_err(|e| ServiceError::Persistence(e.to_string()))?;
            let ledger_quantity = replay_quantity(rm.item_id, &stream)?;

            let entry = ReconciliationEntry {
                item_id: rm.item_id,
                projected_quantity: rm.quantity,
                ledger_quantity,
            };

            if entry.is_divergent() {
                warn!(
                    item_id = %entry.item_id,
                    projected = entry.projected_quantity,
                    ledger = entry.ledger_quantity,
                    "stock level diverges from its ledger"
                );
            }

            entries.push(entry);
        }

        Ok(ReconciliationReport { entries })
    }
}

/// Tallies on-hand quantity from one item's ledger.
#[derive(Debug, Default)]
struct QuantityTally {
    quantity: i64,
}

impl Projection for QuantityTally {
    type Ev = StockEvent;

    fn apply(&mut self, envelope: &EventEnvelope<StockEvent>) {
        match envelope.payload() {
            StockEvent::ItemRegistered(e) => self.quantity = e.initial_quantity,
            StockEvent::StockAdjusted(e) => self.quantity += e.signed_delta(),
            StockEvent::ComponentLinked(_) | StockEvent::ItemRetired(_) => {}
        }
    }
}

fn replay_quantity(item_id: StockItemId, stream: &[StoredEvent]) -> Result<i64, ServiceError> {
    let mut sorted: Vec<&StoredEvent> = stream.iter().collect();
    sorted.sort_by_key(|e| e.sequence_number);

    let mut envelopes = Vec::with_capacity(sorted.len());
    for stored in sorted {
        let event: StockEvent = serde_json::from_value(stored.payload.clone())
            .map_err(|e| ServiceError::Persistence(e.to_string()))?;
        envelopes.push(EventEnvelope::new(
            stored.event_id,
            stored.aggregate_id,
            stored.aggregate_type.clone(),
            stored.sequence_number,
            event,
        ));
    }

    // The runner is pinned to the item's stream and rejects duplicate or
    // out-of-order sequence numbers and foreign envelopes, so a corrupted
    // stream surfaces as an error instead of a silently wrong tally.
    let mut runner = ProjectionRunner::new_for_stream(item_id.0, QuantityTally::default());
    runner
        .run(envelopes.iter())
        .map_err(|e| ServiceError::Persistence(e.to_string()))?;

    Ok(runner.projection().quantity)
}
