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
use moldtrack_orders::{LineSpec, OrderId, PlaceOrder};
use moldtrack_stock::StockItemId;

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/", post(place_order).get(list_orders))
        .route("/pending", get(list_pending))
        .route("/:id", get(get_order))
        .route("/:id/deliver", post(deliver))
}

pub async fn place_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<crate::context::PrincipalContext>,
    Json(body): Json<dto::PlaceOrderRequest>,
) -> axum::response::Response {
    if let Err(resp) = crate::authz::require(&principal, Capability::OrdersPlace) {
        return resp;
    }

    let code = match errors::parse_code(&body.code) {
        Ok(code) => code,
        Err(resp) => return resp,
    };

    let mut lines = Vec::with_capacity(body.lines.len());
    for line in body.lines {
        let kit_agg = match errors::parse_id(&line.kit_id) {
            Ok(v) => v,
            Err(resp) => return resp,
        };
        lines.push(LineSpec {
            kit_id: StockItemId::new(kit_agg),
            quantity: line.quantity,
        });
    }

    let order_id = OrderId::new(AggregateId::new());

    let result = services
        .place_order(PlaceOrder {
            order_id,
            code,
            customer_name: body.customer_name,
            requested_delivery_date: body.requested_delivery_date,
            lines,
            actor_id: principal.user_id(),
            occurred_at: Utc::now(),
        })
        .await;

    match result {
        Ok(()) => (
            StatusCode::CREATED,
            Json(serde_json::json!({ "id": order_id.0.to_string() })),
        )
            .into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn deliver(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<crate::context::PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    if let Err(resp) = crate::authz::require(&principal, Capability::OrdersDeliver) {
        return resp;
    }

    let agg = match errors::parse_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services
        .deliver(OrderId::new(agg), principal.user_id())
        .await
    {
        Ok(report) => (StatusCode::OK, Json(dto::delivery_report_to_json(report))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn get_order(
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

    match services.read.orders.get(&OrderId::new(agg)) {
        Some(rm) => (StatusCode::OK, Json(dto::order_to_json(rm))).into_response(),
        None => errors::json_error(StatusCode::NOT_FOUND, "not_found", "order not found"),
    }
}

pub async fn list_orders(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<crate::context::PrincipalContext>,
) -> axum::response::Response {
    if let Err(resp) = crate::authz::require(&principal, Capability::StockRead) {
        return resp;
    }

    let orders: Vec<_> = services
        .read
        .orders
        .list()
        .into_iter()
        .map(dto::order_to_json)
        .collect();

    (StatusCode::OK, Json(serde_json::json!({ "orders": orders }))).into_response()
}

pub async fn list_pending(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<crate::context::PrincipalContext>,
) -> axum::response::Response {
    if let Err(resp) = crate::authz::require(&principal, Capability::StockRead) {
        return resp;
    }

    let orders: Vec<_> = services
        .read
        .orders
        .list_pending()
        .into_iter()
        .map(dto::order_to_json)
        .collect();

    (StatusCode::OK, Json(serde_json::json!({ "orders": orders }))).into_response()
}
