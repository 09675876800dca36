use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;

use moldtrack_auth::Capability;
use moldtrack_core::AggregateId;
use moldtrack_production::{MachineId, ProductionRunId, RecordProduction};
use moldtrack_stock::StockItemId;

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/runs", post(record_run).get(list_runs))
        .route("/runs/:id", get(get_run))
        .route("/machines/:id/runs", get(list_machine_runs))
}

pub async fn record_run(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<crate::context::PrincipalContext>,
    Json(body): Json<dto::RecordProductionRequest>,
) -> axum::response::Response {
    if let Err(resp) = crate::authz::require(&principal, Capability::ProductionRecord) {
        return resp;
    }

    let mold_agg = match errors::parse_id(&body.mold_item_id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let material_agg = match errors::parse_id(&body.material_item_id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let machine_agg = match errors::parse_id(&body.machine_id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let run_id = ProductionRunId::new(AggregateId::new());

    let result = services
        .record_run(RecordProduction {
            run_id,
            mold_item_id: StockItemId::new(mold_agg),
            material_item_id: StockItemId::new(material_agg),
            machine_id: MachineId::new(machine_agg),
            good_quantity: body.good_quantity,
            bags_used: body.bags_used,
            actor_id: principal.user_id(),
            occurred_at: Utc::now(),
        })
        .await;

    match result {
        Ok(()) => (
            StatusCode::CREATED,
            Json(serde_json::json!({ "id": run_id.0.to_string() })),
        )
            .into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn get_run(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<crate::context::PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    if let Err(resp) = crate::authz::require(&principal, Capability::StockRead) {
        return resp;
    }

    let agg = match errors::parse_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.read.production_log.get(&ProductionRunId::new(agg)) {
        Some(rm) => (StatusCode::OK, Json(dto::production_entry_to_json(rm))).into_response(),
        None => errors::json_error(StatusCode::NOT_FOUND, "not_found", "run not found"),
    }
}

pub async fn list_runs(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<crate::context::PrincipalContext>,
) -> axum::response::Response {
    if let Err(resp) = crate::authz::require(&principal, Capability::StockRead) {
        return resp;
    }

    let runs: Vec<_> = services
        .read
        .production_log
        .list()
        .into_iter()
        .map(dto::production_entry_to_json)
        .collect();

    (StatusCode::OK, Json(serde_json::json!({ "runs": runs }))).into_response()
}

pub async fn list_machine_runs(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<crate::context::PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    if let Err(resp) = crate::authz::require(&principal, Capability::StockRead) {
        return resp;
    }

    let agg = match errors::parse_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let runs: Vec<_> = services
        .read
        .production_log
        .list_for_machine(&MachineId::new(agg))
        .into_iter()
        .map(dto::production_entry_to_json)
        .collect();

    (StatusCode::OK, Json(serde_json::json!({ "runs": runs }))).into_response()
}
