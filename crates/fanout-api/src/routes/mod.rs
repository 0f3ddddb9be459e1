pub mod deliveries;
pub mod dispatch;
pub mod endpoints;
pub mod events;
pub mod health;

use axum::Router;

use crate::state::AppState;

pub fn v1_router(state: AppState) -> Router {
    Router::new()
        .merge(endpoints::router(state.clone()))
        .merge(deliveries::router(state.clone()))
        .merge(events::router(state.clone()))
        .merge(dispatch::router(state))
}

pub fn health_router() -> Router {
    health::router()
}
