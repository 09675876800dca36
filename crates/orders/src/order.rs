use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use moldtrack_core::{Aggregate, AggregateId, AggregateRoot, DomainError, UniqueCode, UserId};
use moldtrack_events::Event;
use moldtrack_stock::StockItemId;

/// Customer order identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(pub AggregateId);

impl OrderId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for OrderId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Order status lifecycle.
///
/// `Delivered` is terminal and is only entered once every line carries a
/// fulfillment marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Delivered,
}

/// Line as requested at placement time: which kit, how many.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineSpec {
    pub kit_id: StockItemId,
    pub quantity: i64,
}

/// Order line with its fulfillment marker.
///
/// `fulfilled` flips to true exactly once, when the line's stock deduction
/// has been recorded. A delivery retry skips lines that are already marked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub line_no: u32,
    pub kit_id: StockItemId,
    pub quantity: i64,
    pub fulfilled: bool,
}

/// Aggregate root: Order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    id: OrderId,
    code: Option<UniqueCode>,
    customer_name: String,
    requested_delivery_date: Option<NaiveDate>,
    status: OrderStatus,
    lines: Vec<OrderLine>,
    version: u64,
    placed: bool,
}

impl Order {
    /// Create an empty, not-yet-placed aggregate instance for rehydration.
    pub fn empty(id: OrderId) -> Self {
        Self {
            id,
            code: None,
            customer_name: String::new(),
            requested_delivery_date: None,
            status: OrderStatus::Pending,
            lines: Vec::new(),
            version: 0,
            placed: false,
        }
    }

    pub fn id_typed(&self) -> OrderId {
        self.id
    }

    pub fn code(&self) -> Option<&UniqueCode> {
        self.code.as_ref()
    }

    pub fn customer_name(&self) -> &str {
        &self.customer_name
    }

    pub fn requested_delivery_date(&self) -> Option<NaiveDate> {
        self.requested_delivery_date
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn lines(&self) -> &[OrderLine] {
        &self.lines
    }

    pub fn is_placed(&self) -> bool {
        self.placed
    }

    pub fn line(&self, line_no: u32) -> Option<&OrderLine> {
        self.lines.iter().find(|l| l.line_no == line_no)
    }

    /// Lines still waiting for their stock deduction, in line order.
    pub fn unfulfilled_lines(&self) -> impl Iterator<Item = &OrderLine> {
        self.lines.iter().filter(|l| !l.fulfilled)
    }

    pub fn is_fully_fulfilled(&self) -> bool {
        self.lines.iter().all(|l| l.fulfilled)
    }
}

impl AggregateRoot for Order {
    type Id = OrderId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: PlaceOrder.
///
/// Lines are fixed at placement; there is no post-placement line editing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaceOrder {
    pub order_id: OrderId,
    pub code: UniqueCode,
    pub customer_name: String,
    pub requested_delivery_date: Option<NaiveDate>,
    pub lines: Vec<LineSpec>,
    pub actor_id: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: MarkLineFulfilled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkLineFulfilled {
    pub order_id: OrderId,
    pub line_no: u32,
    pub actor_id: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: MarkDelivered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkDelivered {
    pub order_id: OrderId,
    pub actor_id: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderCommand {
    PlaceOrder(PlaceOrder),
    MarkLineFulfilled(MarkLineFulfilled),
    MarkDelivered(MarkDelivered),
}

/// Event: OrderPlaced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderPlaced {
    pub order_id: OrderId,
    pub code: UniqueCode,
    pub customer_name: String,
    pub requested_delivery_date: Option<NaiveDate>,
    pub lines: Vec<OrderLine>,
    pub actor_id: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: LineFulfilled.
///
/// Doubles as the idempotency marker for the order/line pair: once present
/// in the stream, no retry may deduct stock for this line again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineFulfilled {
    pub order_id: OrderId,
    pub line_no: u32,
    pub kit_id: StockItemId,
    pub quantity: i64,
    pub actor_id: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: OrderDelivered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderDelivered {
    pub order_id: OrderId,
    pub actor_id: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderEvent {
    OrderPlaced(OrderPlaced),
    LineFulfilled(LineFulfilled),
    OrderDelivered(OrderDelivered),
}

impl Event for OrderEvent {
    fn event_type(&self) -> &'static str {
        match self {
            OrderEvent::OrderPlaced(_) => "orders.order.placed",
            OrderEvent::LineFulfilled(_) => "orders.order.line_fulfilled",
            OrderEvent::OrderDelivered(_) => "orders.order.delivered",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            OrderEvent::OrderPlaced(e) => e.occurred_at,
            OrderEvent::LineFulfilled(e) => e.occurred_at,
            OrderEvent::OrderDelivered(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Order {
    type Command = OrderCommand;
    type Event = OrderEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            OrderEvent::OrderPlaced(e) => {
                self.id = e.order_id;
                self.code = Some(e.code.clone());
                self.customer_name = e.customer_name.clone();
                self.requested_delivery_date = e.requested_delivery_date;
                self.status = OrderStatus::Pending;
                self.lines = e.lines.clone();
                self.placed = true;
            }
            OrderEvent::LineFulfilled(e) => {
                if let Some(line) = self.lines.iter_mut().find(|l| l.line_no == e.line_no) {
                    line.fulfilled = true;
                }
            }
            OrderEvent::OrderDelivered(_) => {
                self.status = OrderStatus::Delivered;
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            OrderCommand::PlaceOrder(cmd) => self.handle_place(cmd),
            OrderCommand::MarkLineFulfilled(cmd) => self.handle_mark_line_fulfilled(cmd),
            OrderCommand::MarkDelivered(cmd) => self.handle_mark_delivered(cmd),
        }
    }
}

impl Order {
    fn ensure_order_id(&self, order_id: OrderId) -> Result<(), DomainError> {
        if self.id != order_id {
            return Err(DomainError::invariant("order_id mismatch"));
        }
        Ok(())
    }

    fn handle_place(&self, cmd: &PlaceOrder) -> Result<Vec<OrderEvent>, DomainError> {
        if self.placed {
            return Err(DomainError::conflict("order already exists"));
        }

        if cmd.customer_name.trim().is_empty() {
            return Err(DomainError::validation("customer_name must not be empty"));
        }

        if cmd.lines.is_empty() {
            return Err(DomainError::validation(
                "order must contain at least one line",
            ));
        }

        for spec in &cmd.lines {
            if spec.quantity <= 0 {
                return Err(DomainError::validation("line quantity must be positive"));
            }
        }

        let lines = cmd
            .lines
            .iter()
            .enumerate()
            .map(|(idx, spec)| OrderLine {
                line_no: (idx as u32) + 1,
                kit_id: spec.kit_id,
                quantity: spec.quantity,
                fulfilled: false,
            })
            .collect();

        Ok(vec![OrderEvent::OrderPlaced(OrderPlaced {
            order_id: cmd.order_id,
            code: cmd.code.clone(),
            customer_name: cmd.customer_name.clone(),
            requested_delivery_date: cmd.requested_delivery_date,
            lines,
            actor_id: cmd.actor_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_mark_line_fulfilled(
        &self,
        cmd: &MarkLineFulfilled,
    ) -> Result<Vec<OrderEvent>, DomainError> {
        if !self.placed {
            return Err(DomainError::not_found());
        }
        self.ensure_order_id(cmd.order_id)?;

        if self.status == OrderStatus::Delivered {
            return Err(DomainError::AlreadyDelivered);
        }

        let line = self
            .line(cmd.line_no)
            .ok_or_else(|| DomainError::validation("no such line on this order"))?;

        if line.fulfilled {
            return Err(DomainError::conflict("line is already fulfilled"));
        }

        Ok(vec![OrderEvent::LineFulfilled(LineFulfilled {
            order_id: cmd.order_id,
            line_no: line.line_no,
            kit_id: line.kit_id,
            quantity: line.quantity,
            actor_id: cmd.actor_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_mark_delivered(&self, cmd: &MarkDelivered) -> Result<Vec<OrderEvent>, DomainError> {
        if !self.placed {
            return Err(DomainError::not_found());
        }
        self.ensure_order_id(cmd.order_id)?;

        if self.status == OrderStatus::Delivered {
            return Err(DomainError::AlreadyDelivered);
        }

        if !self.is_fully_fulfilled() {
            return Err(DomainError::invariant(
                "cannot deliver order with unfulfilled lines",
            ));
        }

        Ok(vec![OrderEvent::OrderDelivered(OrderDelivered {
            order_id: cmd.order_id,
            actor_id: cmd.actor_id,
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_order_id() -> OrderId {
        OrderId::new(AggregateId::new())
    }

    fn test_kit_id() -> StockItemId {
        StockItemId::new(AggregateId::new())
    }

    fn test_actor_id() -> UserId {
        UserId::new()
    }

    fn test_time() -> DateTime<Utc> {
        Utc::now()
    }

    fn test_code() -> UniqueCode {
        UniqueCode::parse("PED-2026-001").unwrap()
    }

    fn place_cmd(order_id: OrderId, lines: Vec<LineSpec>) -> PlaceOrder {
        PlaceOrder {
            order_id,
            code: test_code(),
            customer_name: "Acme Plastics".to_string(),
            requested_delivery_date: None,
            lines,
            actor_id: test_actor_id(),
            occurred_at: test_time(),
        }
    }

    fn placed_order(lines: Vec<LineSpec>) -> Order {
        let order_id = test_order_id();
        let mut order = Order::empty(order_id);
        let events = order
            .handle(&OrderCommand::PlaceOrder(place_cmd(order_id, lines)))
            .unwrap();
        order.apply(&events[0]);
        order
    }

    #[test]
    fn place_order_emits_order_placed_with_numbered_lines() {
        let order_id = test_order_id();
        let order = Order::empty(order_id);
        let kit_a = test_kit_id();
        let kit_b = test_kit_id();

        let cmd = place_cmd(
            order_id,
            vec![
                LineSpec {
                    kit_id: kit_a,
                    quantity: 3,
                },
                LineSpec {
                    kit_id: kit_b,
                    quantity: 1,
                },
            ],
        );

        let events = order.handle(&OrderCommand::PlaceOrder(cmd)).unwrap();
        assert_eq!(events.len(), 1);

        match &events[0] {
            OrderEvent::OrderPlaced(e) => {
                assert_eq!(e.order_id, order_id);
                assert_eq!(e.lines.len(), 2);
                assert_eq!(e.lines[0].line_no, 1);
                assert_eq!(e.lines[0].kit_id, kit_a);
                assert_eq!(e.lines[1].line_no, 2);
                assert!(!e.lines[0].fulfilled);
            }
            _ => panic!("Expected OrderPlaced event"),
        }
    }

    #[test]
    fn place_order_rejects_empty_lines() {
        let order_id = test_order_id();
        let order = Order::empty(order_id);

        let err = order
            .handle(&OrderCommand::PlaceOrder(place_cmd(order_id, Vec::new())))
            .unwrap_err();
        match err {
            DomainError::Validation(msg) if msg.contains("at least one line") => {}
            _ => panic!("Expected Validation for order without lines"),
        }
    }

    #[test]
    fn place_order_rejects_non_positive_quantity() {
        let order_id = test_order_id();
        let order = Order::empty(order_id);

        let err = order
            .handle(&OrderCommand::PlaceOrder(place_cmd(
                order_id,
                vec![LineSpec {
                    kit_id: test_kit_id(),
                    quantity: 0,
                }],
            )))
            .unwrap_err();
        match err {
            DomainError::Validation(msg) if msg.contains("quantity must be positive") => {}
            _ => panic!("Expected Validation for non-positive line quantity"),
        }
    }

    #[test]
    fn mark_line_fulfilled_flips_marker_once() {
        let mut order = placed_order(vec![LineSpec {
            kit_id: test_kit_id(),
            quantity: 2,
        }]);
        let order_id = order.id_typed();

        let cmd = MarkLineFulfilled {
            order_id,
            line_no: 1,
            actor_id: test_actor_id(),
            occurred_at: test_time(),
        };
        let events = order
            .handle(&OrderCommand::MarkLineFulfilled(cmd.clone()))
            .unwrap();
        match &events[0] {
            OrderEvent::LineFulfilled(e) => {
                assert_eq!(e.line_no, 1);
                assert_eq!(e.quantity, 2);
            }
            _ => panic!("Expected LineFulfilled event"),
        }
        order.apply(&events[0]);
        assert!(order.line(1).unwrap().fulfilled);

        // Retrying the same line is a conflict, not a second deduction.
        let err = order
            .handle(&OrderCommand::MarkLineFulfilled(cmd))
            .unwrap_err();
        match err {
            DomainError::Conflict(msg) if msg.contains("already fulfilled") => {}
            _ => panic!("Expected Conflict for re-fulfilling a line"),
        }
    }

    #[test]
    fn mark_line_fulfilled_rejects_unknown_line() {
        let order = placed_order(vec![LineSpec {
            kit_id: test_kit_id(),
            quantity: 1,
        }]);

        let err = order
            .handle(&OrderCommand::MarkLineFulfilled(MarkLineFulfilled {
                order_id: order.id_typed(),
                line_no: 99,
                actor_id: test_actor_id(),
                occurred_at: test_time(),
            }))
            .unwrap_err();
        match err {
            DomainError::Validation(msg) if msg.contains("no such line") => {}
            _ => panic!("Expected Validation for unknown line_no"),
        }
    }

    #[test]
    fn cannot_deliver_with_unfulfilled_lines() {
        let mut order = placed_order(vec![
            LineSpec {
                kit_id: test_kit_id(),
                quantity: 1,
            },
            LineSpec {
                kit_id: test_kit_id(),
                quantity: 1,
            },
        ]);
        let order_id = order.id_typed();

        let events = order
            .handle(&OrderCommand::MarkLineFulfilled(MarkLineFulfilled {
                order_id,
                line_no: 1,
                actor_id: test_actor_id(),
                occurred_at: test_time(),
            }))
            .unwrap();
        order.apply(&events[0]);

        let err = order
            .handle(&OrderCommand::MarkDelivered(MarkDelivered {
                order_id,
                actor_id: test_actor_id(),
                occurred_at: test_time(),
            }))
            .unwrap_err();
        match err {
            DomainError::InvariantViolation(msg) if msg.contains("unfulfilled lines") => {}
            _ => panic!("Expected InvariantViolation for delivering a partial order"),
        }
        assert_eq!(order.status(), OrderStatus::Pending);
    }

    #[test]
    fn full_lifecycle_pending_to_delivered() {
        let mut order = placed_order(vec![
            LineSpec {
                kit_id: test_kit_id(),
                quantity: 3,
            },
            LineSpec {
                kit_id: test_kit_id(),
                quantity: 1,
            },
        ]);
        let order_id = order.id_typed();
        assert_eq!(order.status(), OrderStatus::Pending);
        assert_eq!(order.unfulfilled_lines().count(), 2);

        for line_no in [1u32, 2u32] {
            moldtrack_events::execute(
                &mut order,
                &OrderCommand::MarkLineFulfilled(MarkLineFulfilled {
                    order_id,
                    line_no,
                    actor_id: test_actor_id(),
                    occurred_at: test_time(),
                }),
            )
            .unwrap();
        }
        assert!(order.is_fully_fulfilled());

        moldtrack_events::execute(
            &mut order,
            &OrderCommand::MarkDelivered(MarkDelivered {
                order_id,
                actor_id: test_actor_id(),
                occurred_at: test_time(),
            }),
        )
        .unwrap();
        assert_eq!(order.status(), OrderStatus::Delivered);
    }

    #[test]
    fn delivering_twice_is_already_delivered() {
        let mut order = placed_order(vec![LineSpec {
            kit_id: test_kit_id(),
            quantity: 1,
        }]);
        let order_id = order.id_typed();

        let events = order
            .handle(&OrderCommand::MarkLineFulfilled(MarkLineFulfilled {
                order_id,
                line_no: 1,
                actor_id: test_actor_id(),
                occurred_at: test_time(),
            }))
            .unwrap();
        order.apply(&events[0]);

        let deliver = MarkDelivered {
            order_id,
            actor_id: test_actor_id(),
            occurred_at: test_time(),
        };
        let events = order
            .handle(&OrderCommand::MarkDelivered(deliver.clone()))
            .unwrap();
        order.apply(&events[0]);

        let err = order
            .handle(&OrderCommand::MarkDelivered(deliver))
            .unwrap_err();
        assert!(matches!(err, DomainError::AlreadyDelivered));
    }

    #[test]
    fn fulfilling_lines_on_delivered_order_is_rejected() {
        let mut order = placed_order(vec![LineSpec {
            kit_id: test_kit_id(),
            quantity: 1,
        }]);
        let order_id = order.id_typed();

        let events = order
            .handle(&OrderCommand::MarkLineFulfilled(MarkLineFulfilled {
                order_id,
                line_no: 1,
                actor_id: test_actor_id(),
                occurred_at: test_time(),
            }))
            .unwrap();
        order.apply(&events[0]);
        let events = order
            .handle(&OrderCommand::MarkDelivered(MarkDelivered {
                order_id,
                actor_id: test_actor_id(),
                occurred_at: test_time(),
            }))
            .unwrap();
        order.apply(&events[0]);

        let err = order
            .handle(&OrderCommand::MarkLineFulfilled(MarkLineFulfilled {
                order_id,
                line_no: 1,
                actor_id: test_actor_id(),
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::AlreadyDelivered));
    }

    #[test]
    fn version_increments_on_apply() {
        let order_id = test_order_id();
        let mut order = Order::empty(order_id);
        assert_eq!(order.version(), 0);

        let events = order
            .handle(&OrderCommand::PlaceOrder(place_cmd(
                order_id,
                vec![LineSpec {
                    kit_id: test_kit_id(),
                    quantity: 1,
                }],
            )))
            .unwrap();
        order.apply(&events[0]);
        assert_eq!(order.version(), 1);

        let events = order
            .handle(&OrderCommand::MarkLineFulfilled(MarkLineFulfilled {
                order_id,
                line_no: 1,
                actor_id: test_actor_id(),
                occurred_at: test_time(),
            }))
            .unwrap();
        order.apply(&events[0]);
        assert_eq!(order.version(), 2);
    }

    #[test]
    fn handle_does_not_mutate_state() {
        let order = placed_order(vec![LineSpec {
            kit_id: test_kit_id(),
            quantity: 1,
        }]);
        let order_id = order.id_typed();
        let initial_version = order.version();
        let initial_status = order.status();

        let cmd = MarkLineFulfilled {
            order_id,
            line_no: 1,
            actor_id: test_actor_id(),
            occurred_at: test_time(),
        };
        let events1 = order
            .handle(&OrderCommand::MarkLineFulfilled(cmd.clone()))
            .unwrap();
        let events2 = order
            .handle(&OrderCommand::MarkLineFulfilled(cmd))
            .unwrap();

        assert_eq!(order.version(), initial_version);
        assert_eq!(order.status(), initial_status);
        assert!(!order.line(1).unwrap().fulfilled);
        assert_eq!(events1, events2);
    }

    #[test]
    fn apply_is_deterministic() {
        let order_id = test_order_id();
        let kit_id = test_kit_id();
        let actor_id = test_actor_id();
        let at = test_time();

        let placed = OrderEvent::OrderPlaced(OrderPlaced {
            order_id,
            code: test_code(),
            customer_name: "Acme Plastics".to_string(),
            requested_delivery_date: None,
            lines: vec![OrderLine {
                line_no: 1,
                kit_id,
                quantity: 2,
                fulfilled: false,
            }],
            actor_id,
            occurred_at: at,
        });
        let fulfilled = OrderEvent::LineFulfilled(LineFulfilled {
            order_id,
            line_no: 1,
            kit_id,
            quantity: 2,
            actor_id,
            occurred_at: at,
        });
        let delivered = OrderEvent::OrderDelivered(OrderDelivered {
            order_id,
            actor_id,
            occurred_at: at,
        });

        let mut a = Order::empty(order_id);
        a.apply(&placed);
        a.apply(&fulfilled);
        a.apply(&delivered);

        let mut b = Order::empty(order_id);
        b.apply(&placed);
        b.apply(&fulfilled);
        b.apply(&delivered);

        assert_eq!(a.version(), b.version());
        assert_eq!(a.status(), b.status());
        assert_eq!(a.lines(), b.lines());
        assert_eq!(a.status(), OrderStatus::Delivered);
    }
}
