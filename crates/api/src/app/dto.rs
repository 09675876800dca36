use serde::Deserialize;

use moldtrack_infra::projections::{
    MachineReadModel, MovementRecord, OrderReadModel, ProductionLogEntry, StockLevelReadModel,
};
use moldtrack_infra::services::{DeliveryReport, ReconciliationReport};
use moldtrack_stock::{Direction, ItemKind, Unit};

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct RegisterItemRequest {
    pub kind: ItemKind,
    pub code: Option<String>,
    pub name: String,
    pub unit: Unit,
    pub initial_quantity: i64,
}

#[derive(Debug, Deserialize)]
pub struct AdjustStockRequest {
    pub direction: Direction,
    pub quantity: i64,
    pub note: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LinkComponentRequest {
    pub component_id: String,
    pub quantity_required: i64,
}

#[derive(Debug, Deserialize)]
pub struct OrderLineRequest {
    pub kit_id: String,
    pub quantity: i64,
}

#[derive(Debug, Deserialize)]
pub struct PlaceOrderRequest {
    pub code: String,
    pub customer_name: String,
    pub requested_delivery_date: Option<chrono::NaiveDate>,
    pub lines: Vec<OrderLineRequest>,
}

#[derive(Debug, Deserialize)]
pub struct RegisterMachineRequest {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct RecordProductionRequest {
    pub mold_item_id: String,
    pub material_item_id: String,
    pub machine_id: String,
    pub good_quantity: i64,
    pub bags_used: i64,
}

#[derive(Debug, Deserialize)]
pub struct MaterialIntakeRequest {
    pub item_id: String,
    pub kilograms: i64,
    pub note: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ScanIntakeRequest {
    pub code: String,
}

// -------------------------
// JSON mapping helpers
// -------------------------

pub fn stock_level_to_json(rm: StockLevelReadModel) -> serde_json::Value {
    serde_json::json!({
        "id": rm.item_id.0.to_string(),
        "kind": format!("{:?}", rm.kind).to_lowercase(),
        "code": rm.code,
        "name": rm.name,
        "unit": format!("{:?}", rm.unit).to_lowercase(),
        "quantity": rm.quantity,
        "retired": rm.retired,
    })
}

pub fn movement_to_json(rm: MovementRecord) -> serde_json::Value {
    serde_json::json!({
        "event_id": rm.event_id.to_string(),
        "item_id": rm.item_id.0.to_string(),
        "direction": format!("{:?}", rm.direction).to_uppercase(),
        "quantity": rm.quantity,
        "signed_delta": rm.signed_delta,
        "actor_id": rm.actor_id.to_string(),
        "note": rm.note,
        "occurred_at": rm.occurred_at.to_rfc3339(),
        "sequence_number": rm.sequence_number,
    })
}

pub fn order_to_json(rm: OrderReadModel) -> serde_json::Value {
    serde_json::json!({
        "id": rm.order_id.0.to_string(),
        "code": rm.code,
        "customer_name": rm.customer_name,
        "requested_delivery_date": rm.requested_delivery_date.map(|d| d.to_string()),
        "status": format!("{:?}", rm.status).to_lowercase(),
        "lines": rm.lines.into_iter().map(|l| serde_json::json!({
            "line_no": l.line_no,
            "kit_id": l.kit_id.0.to_string(),
            "quantity": l.quantity,
            "fulfilled": l.fulfilled,
        })).collect::<Vec<_>>()
    })
}

pub fn machine_to_json(rm: MachineReadModel) -> serde_json::Value {
    serde_json::json!({
        "id": rm.machine_id.0.to_string(),
        "name": rm.name,
        "status": format!("{:?}", rm.status).to_lowercase(),
    })
}

pub fn production_entry_to_json(rm: ProductionLogEntry) -> serde_json::Value {
    serde_json::json!({
        "run_id": rm.run_id.0.to_string(),
        "mold_item_id": rm.mold_item_id.0.to_string(),
        "material_item_id": rm.material_item_id.0.to_string(),
        "machine_id": rm.machine_id.0.to_string(),
        "good_quantity": rm.good_quantity,
        "bags_used": rm.bags_used,
        "material_kilograms": rm.material_kilograms,
        "actor_id": rm.actor_id.to_string(),
        "occurred_at": rm.occurred_at.to_rfc3339(),
    })
}

pub fn delivery_report_to_json(report: DeliveryReport) -> serde_json::Value {
    serde_json::json!({
        "order_id": report.order_id.0.to_string(),
        "lines_fulfilled": report.lines_fulfilled,
        "lines_skipped": report.lines_skipped,
    })
}

pub fn reconciliation_report_to_json(report: ReconciliationReport) -> serde_json::Value {
    let clean = report.is_clean();
    serde_json::json!({
        "clean": clean,
        "entries": report.entries.into_iter().map(|e| serde_json::json!({
            "item_id": e.item_id.0.to_string(),
            "projected_quantity": e.projected_quantity,
            "ledger_quantity": e.ledger_quantity,
            "divergent": e.is_divergent(),
        })).collect::<Vec<_>>()
    })
}
