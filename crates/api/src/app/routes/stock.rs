use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;

use moldtrack_auth::Capability;
use moldtrack_core::AggregateId;
use moldtrack_stock::{AdjustStock, LinkComponent, RegisterItem, RetireItem, StockItemId};

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/items", post(register_item).get(list_items))
        .route("/items/:id", get(get_item))
        .route("/items/:id/adjust", post(adjust_stock))
        .route("/items/:id/link", post(link_component))
        .route("/items/:id/retire", post(retire_item))
        .route("/items/:id/movements", get(list_item_movements))
        .route("/movements", get(list_recent_movements))
        .route("/resolve/:code", get(resolve_code))
        .route("/intake", post(material_intake))
        .route("/intake/scan", post(scan_intake))
}

pub async fn register_item(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<crate::context::PrincipalContext>,
    Json(body): Json<dto::RegisterItemRequest>,
) -> axum::response::Response {
    if let Err(resp) = crate::authz::require(&principal, Capability::ItemsManage) {
        return resp;
    }

    let code = match body.code.as_deref().map(errors::parse_code).transpose() {
        Ok(code) => code,
        Err(resp) => return resp,
    };

    let item_id = StockItemId::new(AggregateId::new());

    let result = services
        .register_item(RegisterItem {
            item_id,
            kind: body.kind,
            code,
            name: body.name,
            unit: body.unit,
            initial_quantity: body.initial_quantity,
            occurred_at: Utc::now(),
        })
        .await;

    match result {
        Ok(()) => (
            StatusCode::CREATED,
            Json(serde_json::json!({ "id": item_id.0.to_string() })),
        )
            .into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn adjust_stock(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<crate::context::PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::AdjustStockRequest>,
) -> axum::response::Response {
    if let Err(resp) = crate::authz::require(&principal, Capability::StockAdjust) {
        return resp;
    }

    let agg = match errors::parse_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let item_id = StockItemId::new(agg);

    let result = services
        .adjust_stock(AdjustStock {
            item_id,
            direction: body.direction,
            quantity: body.quantity,
            actor_id: principal.user_id(),
            note: body.note,
            occurred_at: Utc::now(),
        })
        .await;

    match result {
        Ok(()) => (
            StatusCode::OK,
            Json(serde_json::json!({ "id": item_id.0.to_string() })),
        )
            .into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn link_component(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<crate::context::PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::LinkComponentRequest>,
) -> axum::response::Response {
    if let Err(resp) = crate::authz::require(&principal, Capability::ItemsManage) {
        return resp;
    }

    let agg = match errors::parse_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let component_agg = match errors::parse_id(&body.component_id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let result = services
        .link_component(LinkComponent {
            item_id: StockItemId::new(agg),
            component_id: StockItemId::new(component_agg),
            quantity_required: body.quantity_required,
            occurred_at: Utc::now(),
        })
        .await;

    match result {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn retire_item(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<crate::context::PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    if let Err(resp) = crate::authz::require(&principal, Capability::ItemsManage) {
        return resp;
    }

    let agg = match errors::parse_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let result = services
        .retire_item(RetireItem {
            item_id: StockItemId::new(agg),
            occurred_at: Utc::now(),
        })
        .await;

    match result {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn get_item(
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

    match services.read.stock_levels.get(&StockItemId::new(agg)) {
        Some(rm) => (StatusCode::OK, Json(dto::stock_level_to_json(rm))).into_response(),
        None => errors::json_error(StatusCode::NOT_FOUND, "not_found", "item not found"),
    }
}

pub async fn list_items(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<crate::context::PrincipalContext>,
) -> axum::response::Response {
    if let Err(resp) = crate::authz::require(&principal, Capability::StockRead) {
        return resp;
    }

    let items: Vec<_> = services
        .read
        .stock_levels
        .list()
        .into_iter()
        .map(dto::stock_level_to_json)
        .collect();

    (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
}

pub async fn list_item_movements(
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

    let movements: Vec<_> = services
        .read
        .movements
        .list_for_item(&StockItemId::new(agg))
        .into_iter()
        .map(dto::movement_to_json)
        .collect();

    (
        StatusCode::OK,
        Json(serde_json::json!({ "movements": movements })),
    )
        .into_response()
}

#[derive(Debug, Deserialize)]
pub struct RecentMovementsQuery {
    pub limit: Option<usize>,
}

pub async fn list_recent_movements(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<crate::context::PrincipalContext>,
    Query(query): Query<RecentMovementsQuery>,
) -> axum::response::Response {
    if let Err(resp) = crate::authz::require(&principal, Capability::StockRead) {
        return resp;
    }

    let limit = query.limit.unwrap_or(50);
    let movements: Vec<_> = services
        .read
        .movements
        .list_recent(limit)
        .into_iter()
        .map(dto::movement_to_json)
        .collect();

    (
        StatusCode::OK,
        Json(serde_json::json!({ "movements": movements })),
    )
        .into_response()
}

pub async fn resolve_code(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<crate::context::PrincipalContext>,
    Path(code): Path<String>,
) -> axum::response::Response {
    if let Err(resp) = crate::authz::require(&principal, Capability::StockRead) {
        return resp;
    }

    match services.resolve(&code).await {
        Ok(rm) => (StatusCode::OK, Json(dto::stock_level_to_json(rm))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn material_intake(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<crate::context::PrincipalContext>,
    Json(body): Json<dto::MaterialIntakeRequest>,
) -> axum::response::Response {
    if let Err(resp) = crate::authz::require(&principal, Capability::StockAdjust) {
        return resp;
    }

    let agg = match errors::parse_id(&body.item_id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let result = services
        .material_intake(
            StockItemId::new(agg),
            body.kilograms,
            principal.user_id(),
            body.note,
        )
        .await;

    match result {
        Ok(()) => (
            StatusCode::OK,
            Json(serde_json::json!({ "id": agg.to_string() })),
        )
            .into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn scan_intake(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<crate::context::PrincipalContext>,
    Json(body): Json<dto::ScanIntakeRequest>,
) -> axum::response::Response {
    if let Err(resp) = crate::authz::require(&principal, Capability::StockAdjust) {
        return resp;
    }

    match services.scan_intake(&body.code, principal.user_id()).await {
        Ok(item_id) => (
            StatusCode::OK,
            Json(serde_json::json!({ "id": item_id.0.to_string() })),
        )
            .into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}
