use axum::{
    routing::{get, post},
    Router,
};

pub mod machines;
pub mod orders;
pub mod production;
pub mod stock;
pub mod system;

/// Router for all authenticated endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/whoami", get(system::whoami))
        .route("/reconcile", post(system::reconcile))
        .nest("/stock", stock::router())
        .nest("/orders", orders::router())
        .nest("/machines", machines::router())
        .nest("/production", production::router())
}
