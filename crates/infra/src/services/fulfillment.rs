use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::Value as JsonValue;
use tracing::{info, instrument};

use moldtrack_core::UserId;
use moldtrack_events::{EventBus, EventEnvelope};
use moldtrack_orders::{
    MarkDelivered, MarkLineFulfilled, Order, OrderCommand, OrderId, OrderLine, OrderStatus,
    PlaceOrder,
};
use moldtrack_stock::{AdjustStock, Direction};

use crate::command_dispatcher::CommandDispatcher;
use crate::event_store::EventStore;

use super::ledger::StockLedger;
use super::{run_blocking, ServiceError};

/// Stream type for order aggregates.
pub const ORDER_AGGREGATE_TYPE: &str = "orders.order";

const DEFAULT_DEADLINE: Duration = Duration::from_secs(15);

/// Outcome of one delivery attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryReport {
    pub order_id: OrderId,
    /// Lines whose stock deduction was recorded during this attempt.
    pub lines_fulfilled: usize,
    /// Lines already fulfilled by an earlier attempt.
    pub lines_skipped: usize,
}

/// Order fulfillment orchestrator.
///
/// Delivery walks the order's unfulfilled lines in line order. For each line
/// the stock deduction is appended to the kit's ledger first, then the line's
/// fulfillment marker is recorded, and only after every line is fulfilled
/// does the order status flip to delivered. An interrupted delivery therefore
/// leaves fulfilled-line markers behind, and a retry resumes at the first
/// unfulfilled line instead of deducting everything again.
pub struct DeliveryService<S, B> {
    dispatcher: Arc<CommandDispatcher<S, B>>,
    ledger: StockLedger<S, B>,
    deadline: Duration,
}

impl<S, B> DeliveryService<S, B>
where
    S: EventStore + 'static,
    B: EventBus<EventEnvelope<JsonValue>> + 'static,
{
    pub fn new(dispatcher: Arc<CommandDispatcher<S, B>>) -> Self {
        let ledger = StockLedger::new(Arc::clone(&dispatcher));
        Self {
            dispatcher,
            ledger,
            deadline: DEFAULT_DEADLINE,
        }
    }

    #[instrument(skip(self, command), fields(order_id = %command.order_id), err)]
    pub async fn place_order(&self, command: PlaceOrder) -> Result<(), ServiceError> {
        let order_id = command.order_id;
        self.dispatch_order(order_id, OrderCommand::PlaceOrder(command))
            .await
    }

    /// Deliver an order: deduct every unfulfilled line, then flip the status.
    #[instrument(skip(self), fields(order_id = %order_id), err)]
    pub async fn deliver(
        &self,
        order_id: OrderId,
        actor_id: UserId,
    ) -> Result<DeliveryReport, ServiceError> {
        let order = self.load_order(order_id).await?;

        if !order.is_placed() {
            return Err(ServiceError::NotFound);
        }
        if order.status() == OrderStatus::Delivered {
            return Err(ServiceError::AlreadyDelivered);
        }

        let code_label = match order.code() {
            Some(code) => code.as_str().to_string(),
            None => order_id.to_string(),
        };

        let pending: Vec<OrderLine> = order.unfulfilled_lines().cloned().collect();
        let skipped = order.lines().len() - pending.len();
        let total = pending.len();

        let mut fulfilled = 0usize;
        for line in pending {
            // A crash between the deduction and the marker leaves one line
            // for the reconciliation audit to surface.
            self.ledger
                .adjust(AdjustStock {
                    item_id: line.kit_id,
                    direction: Direction::Out,
                    quantity: line.quantity,
                    actor_id,
                    note: Some(format!("order {} line {}", code_label, line.line_no)),
                    occurred_at: Utc::now(),
                })
                .await
                .map_err(|e| partial(e, fulfilled, total))?;

            self.dispatch_order(
                order_id,
                OrderCommand::MarkLineFulfilled(MarkLineFulfilled {
                    order_id,
                    line_no: line.line_no,
                    actor_id,
                    occurred_at: Utc::now(),
                }),
            )
            .await
            .map_err(|e| partial(e, fulfilled, total))?;

            fulfilled += 1;
        }

        self.dispatch_order(
            order_id,
            OrderCommand::MarkDelivered(MarkDelivered {
                order_id,
                actor_id,
                occurred_at: Utc::now(),
            }),
        )
        .await
        .map_err(|e| partial(e, fulfilled, total))?;

        info!(
            order_id = %order_id,
            lines_fulfilled = fulfilled,
            lines_skipped = skipped,
            "order delivered"
        );

        Ok(DeliveryReport {
            order_id,
            lines_fulfilled: fulfilled,
            lines_skipped: skipped,
        })
    }

    async fn load_order(&self, order_id: OrderId) -> Result<Order, ServiceError> {
        let dispatcher = Arc::clone(&self.dispatcher);
        run_blocking(self.deadline, move || {
            dispatcher
                .load_aggregate::<Order>(order_id.0, |id| Order::empty(OrderId::new(id)))
                .map_err(ServiceError::from)
        })
        .await
    }

    async fn dispatch_order(
        &self,
        order_id: OrderId,
        command: OrderCommand,
    ) -> Result<(), ServiceError> {
        let dispatcher = Arc::clone(&self.dispatcher);
        run_blocking(self.deadline, move || {
            dispatcher
                .dispatch::<Order>(order_id.0, ORDER_AGGREGATE_TYPE, command, |id| {
                    Order::empty(OrderId::new(id))
                })
                .map(|_| ())
                .map_err(ServiceError::from)
        })
        .await
    }
}

fn partial(err: ServiceError, fulfilled: usize, total: usize) -> ServiceError {
    if fulfilled == 0 {
        err
    } else {
        ServiceError::PartialFailure(format!(
            "fulfilled {fulfilled} of {total} pending lines before failing: {err}"
        ))
    }
}
