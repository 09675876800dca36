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
use moldtrack_production::{DecommissionMachine, MachineId, RegisterMachine};

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/", post(register_machine).get(list_machines))
        .route("/active", get(list_active))
        .route("/:id", get(get_machine))
        .route("/:id/decommission", post(decommission_machine))
}

pub async fn register_machine(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<crate::context::PrincipalContext>,
    Json(body): Json<dto::RegisterMachineRequest>,
) -> axum::response::Response {
    if let Err(resp) = crate::authz::require(&principal, Capability::MachinesManage) {
        return resp;
    }

    let machine_id = MachineId::new(AggregateId::new());

    let result = services
        .register_machine(RegisterMachine {
            machine_id,
            name: body.name,
            actor_id: principal.user_id(),
            occurred_at: Utc::now(),
        })
        .await;

    match result {
        Ok(()) => (
            StatusCode::CREATED,
            Json(serde_json::json!({ "id": machine_id.0.to_string() })),
        )
            .into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn decommission_machine(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<crate::context::PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    if let Err(resp) = crate::authz::require(&principal, Capability::MachinesManage) {
        return resp;
    }

    let agg = match errors::parse_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let result = services
        .decommission_machine(DecommissionMachine {
            machine_id: MachineId::new(agg),
            actor_id: principal.user_id(),
            occurred_at: Utc::now(),
        })
        .await;

    match result {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn get_machine(
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

    match services.read.machines.get(&MachineId::new(agg)) {
        Some(rm) => (StatusCode::OK, Json(dto::machine_to_json(rm))).into_response(),
        None => errors::json_error(StatusCode::NOT_FOUND, "not_found", "machine not found"),
    }
}

pub async fn list_machines(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<crate::context::PrincipalContext>,
) -> axum::response::Response {
    if let Err(resp) = crate::authz::require(&principal, Capability::StockRead) {
        return resp;
    }

    let machines: Vec<_> = services
        .read
        .machines
        .list()
        .into_iter()
        .map(dto::machine_to_json)
        .collect();

    (
        StatusCode::OK,
        Json(serde_json::json!({ "machines": machines })),
    )
        .into_response()
}

pub async fn list_active(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<crate::context::PrincipalContext>,
) -> axum::response::Response {
    if let Err(resp) = crate::authz::require(&principal, Capability::StockRead) {
        return resp;
    }

    let machines: Vec<_> = services
        .read
        .machines
        .list_active()
        .into_iter()
        .map(dto::machine_to_json)
        .collect();

    (
        StatusCode::OK,
        Json(serde_json::json!({ "machines": machines })),
    )
        .into_response()
}
