use std::sync::Arc;

use axum::{extract::Extension, http::StatusCode, response::IntoResponse, Json};

use moldtrack_auth::Capability;

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub async fn health() -> StatusCode {
    StatusCode::OK
}

pub async fn whoami(
    Extension(principal): Extension<crate::context::PrincipalContext>,
) -> impl IntoResponse {
    Json(serde_json::json!({
        "user_id": principal.user_id().to_string(),
        "roles": principal.roles().iter().map(|r| r.as_str()).collect::<Vec<_>>(),
    }))
}

/// Audit the stock-levels projection against a ledger replay.
pub async fn reconcile(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<crate::context::PrincipalContext>,
) -> axum::response::Response {
    if let Err(resp) = crate::authz::require(&principal, Capability::ReconcileRun) {
        return resp;
    }

    match services.reconcile().await {
        Ok(report) => (
            StatusCode::OK,
            Json(dto::reconciliation_report_to_json(report)),
        )
            .into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}
