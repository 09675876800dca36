//! Customer order domain module (event-sourced).
//!
//! Orders are placed with a fixed set of kit lines and move through a
//! two-state lifecycle: `Pending` until every line has left stock, then
//! `Delivered`. Fulfillment markers live on the order itself so a retried
//! delivery never ships the same line twice.

pub mod order;

pub use order::{
    LineFulfilled, LineSpec, MarkDelivered, MarkLineFulfilled, Order, OrderCommand,
    OrderDelivered, OrderEvent, OrderId, OrderLine, OrderPlaced, OrderStatus, PlaceOrder,
};
