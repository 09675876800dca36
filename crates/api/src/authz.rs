//! API-side authorization guard for routes.
//!
//! This enforces authorization at the route boundary (before dispatch),
//! while keeping domain aggregates and infra auth-agnostic.

use axum::http::StatusCode;
use axum::response::Response;

use moldtrack_auth::{Capability, authorize};

use crate::app::errors::json_error;
use crate::context::PrincipalContext;

/// Check that the request principal holds `capability`.
///
/// Intended to be called at the top of every protected handler, before any
/// service call.
pub fn require(principal: &PrincipalContext, capability: Capability) -> Result<(), Response> {
    authorize(&principal.principal(), capability)
        .map_err(|e| json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string()))
}
