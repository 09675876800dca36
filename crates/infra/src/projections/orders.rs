use std::collections::HashMap;
use std::sync::RwLock;

use chrono::NaiveDate;
use serde_json::Value as JsonValue;

use moldtrack_core::AggregateId;
use moldtrack_events::EventEnvelope;
use moldtrack_orders::{OrderEvent, OrderId, OrderStatus};
use moldtrack_stock::StockItemId;

use crate::read_model::ReadStore;

use super::ProjectionApplyError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderLineReadModel {
    pub line_no: u32,
    pub kit_id: StockItemId,
    pub quantity: i64,
    pub fulfilled: bool,
}

/// Queryable order read model: customer, lines, and delivery status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderReadModel {
    pub order_id: OrderId,
    pub code: String,
    pub customer_name: String,
    pub requested_delivery_date: Option<NaiveDate>,
    pub status: OrderStatus,
    pub lines: Vec<OrderLineReadModel>,
}

/// Orders projection.
#[derive(Debug)]
pub struct OrdersProjection<S>
where
    S: ReadStore<OrderId, OrderReadModel>,
{
    store: S,
    cursors: RwLock<HashMap<AggregateId, u64>>,
}

impl<S> OrdersProjection<S>
where
    S: ReadStore<OrderId, OrderReadModel>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: RwLock::new(HashMap::new()),
        }
    }

    pub fn get(&self, order_id: &OrderId) -> Option<OrderReadModel> {
        self.store.get(order_id)
    }

    pub fn list(&self) -> Vec<OrderReadModel> {
        self.store.list()
    }

    /// Orders still waiting on delivery.
    pub fn list_pending(&self) -> Vec<OrderReadModel> {
        self.store
            .list()
            .into_iter()
            .filter(|o| o.status == OrderStatus::Pending)
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

            let event: OrderEvent = serde_json::from_value(envelope.payload().clone())
                .map_err(|e| ProjectionApplyError::Deserialize(e.to_string()))?;

            let order_id = match &event {
                OrderEvent::OrderPlaced(e) => e.order_id,
                OrderEvent::LineFulfilled(e) => e.order_id,
                OrderEvent::OrderDelivered(e) => e.order_id,
            };

            if order_id.0 != aggregate_id {
                return Err(ProjectionApplyError::StreamMismatch(
                    "event order_id does not match envelope aggregate_id".to_string(),
                ));
            }

            match event {
                OrderEvent::OrderPlaced(e) => {
                    self.store.upsert(
                        e.order_id,
                        OrderReadModel {
                            order_id: e.order_id,
                            code: e.code.as_str().to_string(),
                            customer_name: e.customer_name,
                            requested_delivery_date: e.requested_delivery_date,
                            status: OrderStatus::Pending,
                            lines: e
                                .lines
                                .iter()
                                .map(|l| OrderLineReadModel {
                                    line_no: l.line_no,
                                    kit_id: l.kit_id,
                                    quantity: l.quantity,
                                    fulfilled: l.fulfilled,
                                })
                                .collect(),
                        },
                    );
                }
                OrderEvent::LineFulfilled(e) => {
                    if let Some(mut rm) = self.store.get(&e.order_id) {
                        for line in &mut rm.lines {
                            if line.line_no == e.line_no {
                                line.fulfilled = true;
                            }
                        }
                        self.store.upsert(e.order_id, rm);
                    }
                }
                OrderEvent::OrderDelivered(e) => {
                    if let Some(mut rm) = self.store.get(&e.order_id) {
                        rm.status = OrderStatus::Delivered;
                        self.store.upsert(e.order_id, rm);
                    }
                }
            }

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
        self.store.clear();

        let mut envs: Vec<_> = envelopes.into_iter().collect();
        envs.sort_by_key(|e| (*e.aggregate_id().as_uuid().as_bytes(), e.sequence_number()));

        for env in &envs {
            self.apply_envelope(env)?;
        }

        Ok(())
    }
}
