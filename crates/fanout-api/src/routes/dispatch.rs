use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::{
    error::{ApiError, ApiResult},
    state::AppState,
};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/v1/dispatch", post(dispatch_event))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DispatchRequest {
    event_type: String,
    payload: JsonValue,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DispatchResponse {
    event_type: String,
    queued: usize,
    delivery_ids: Vec<String>,
}

async fn dispatch_event(
    State(state): State<AppState>,
    Json(payload): Json<DispatchRequest>,
) -> ApiResult<(StatusCode, Json<DispatchResponse>)> {
    if payload.event_type.trim().is_empty() {
        return Err(ApiError::BadRequest("eventType must not be empty".to_string()));
    }

    let delivery_ids = state
        .dispatcher
        .dispatch(&payload.event_type, payload.payload)
        .await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(DispatchResponse {
            event_type: payload.event_type,
            queued: delivery_ids.len(),
            delivery_ids,
        }),
    ))
}
