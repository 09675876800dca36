use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use moldtrack_infra::command_dispatcher::DispatchError;
use moldtrack_infra::services::ServiceError;

pub fn dispatch_error_to_response(err: DispatchError) -> axum::response::Response {
    match err {
        DispatchError::Concurrency(msg) => json_error(StatusCode::CONFLICT, "conflict", msg),
        DispatchError::Validation(msg) => json_error(StatusCode::BAD_REQUEST, "validation_error", msg),
        DispatchError::InvariantViolation(msg) => {
            json_error(StatusCode::UNPROCESSABLE_ENTITY, "invariant_violation", msg)
        }
        DispatchError::Unauthorized => json_error(StatusCode::FORBIDDEN, "unauthorized", "unauthorized"),
        DispatchError::NotFound => json_error(StatusCode::NOT_FOUND, "not_found", "not found"),
        DispatchError::AlreadyDelivered => json_error(
            StatusCode::CONFLICT,
            "already_delivered",
            "order is already delivered",
        ),
        DispatchError::Deserialize(msg) => {
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "deserialize_error", msg)
        }
        DispatchError::Store(e) => json_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "store_error",
            format!("{e:?}"),
        ),
        DispatchError::Publish(msg) => json_error(StatusCode::BAD_GATEWAY, "publish_error", msg),
    }
}

pub fn service_error_to_response(err: ServiceError) -> axum::response::Response {
    match err {
        ServiceError::NotFound => json_error(StatusCode::NOT_FOUND, "not_found", "not found"),
        ServiceError::Validation(msg) => json_error(StatusCode::BAD_REQUEST, "validation_error", msg),
        ServiceError::Timeout(d) => json_error(
            StatusCode::GATEWAY_TIMEOUT,
            "timeout",
            format!("lookup timed out after {d:?}"),
        ),
        ServiceError::Conflict(msg) => json_error(StatusCode::CONFLICT, "conflict", msg),
        ServiceError::AlreadyDelivered => json_error(
            StatusCode::CONFLICT,
            "already_delivered",
            "order is already delivered",
        ),
        ServiceError::PartialFailure(msg) => {
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "partial_failure", msg)
        }
        ServiceError::Unauthorized => json_error(StatusCode::FORBIDDEN, "unauthorized", "unauthorized"),
        ServiceError::InvariantViolation(msg) => {
            json_error(StatusCode::UNPROCESSABLE_ENTITY, "invariant_violation", msg)
        }
        ServiceError::Persistence(msg) => {
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "persistence_error", msg)
        }
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

/// Parse a path segment as an aggregate id, mapping failure to a 400 response.
pub fn parse_id(s: &str) -> Result<moldtrack_core::AggregateId, axum::response::Response> {
    s.parse().map_err(|_| {
        json_error(
            StatusCode::BAD_REQUEST,
            "invalid_id",
            "id must be a valid UUID",
        )
    })
}

/// Canonicalize a request-supplied code, mapping failure to a 400 response.
pub fn parse_code(s: &str) -> Result<moldtrack_core::UniqueCode, axum::response::Response> {
    moldtrack_core::UniqueCode::parse(s)
        .map_err(|e| json_error(StatusCode::BAD_REQUEST, "validation_error", e.to_string()))
}
