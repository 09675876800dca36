//! HTTP application assembly.
//!
//! `services.rs` wires the event store, bus, projections and services;
//! `routes/` holds one handler file per domain area; `dto.rs` maps domain
//! types to and from JSON; `errors.rs` keeps error responses uniform.

use std::sync::Arc;

use axum::{routing::get, Extension, Router};

use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

/// Build the full HTTP router.
///
/// Everything except `/health` sits behind the bearer-token middleware.
pub async fn build_app(jwt_secret: String) -> Router {
    let auth_state = middleware::AuthState::new(jwt_secret.as_bytes());

    let services = Arc::new(services::build_services().await);

    let protected = routes::router()
        .layer(Extension(services))
        .layer(axum::middleware::from_fn_with_state(
            auth_state,
            middleware::auth_middleware,
        ));

    Router::new()
        .route("/health", get(routes::system::health))
        .merge(protected)
}
