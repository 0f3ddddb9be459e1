//! HTTP management surface for the delivery subsystem.

pub mod error;
pub mod middleware;
pub mod routes;
pub mod state;

use axum::{middleware::from_fn, Router};

use crate::state::AppState;

pub fn app(state: AppState) -> Router {
    Router::new()
        .merge(routes::health_router())
        .merge(routes::v1_router(state))
        .layer(from_fn(middleware::request_id::request_id))
}
