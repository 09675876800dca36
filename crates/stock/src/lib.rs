//! Stock domain module (event-sourced).
//!
//! This crate contains business rules for stock-bearing items (kits, molds,
//! raw materials), implemented purely as deterministic domain logic (no IO,
//! no HTTP, no storage). Every quantity change is an appended `StockAdjusted`
//! event, which doubles as the immutable movement-ledger entry.

pub mod item;

pub use item::{
    AdjustStock, ComponentLink, ComponentLinked, Direction, ItemKind, ItemRegistered, ItemRetired,
    LinkComponent, RegisterItem, RetireItem, StockAdjusted, StockCommand, StockEvent, StockItem,
    StockItemId, Unit,
};
