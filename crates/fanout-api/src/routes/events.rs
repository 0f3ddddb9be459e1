use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use fanout_core::types::WebhookEventType;
use serde::{Deserialize, Serialize};

use crate::{
    error::{ApiError, ApiResult},
    state::AppState,
};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/v1/event-types", post(create_event_type).get(list_event_types))
        .route("/v1/event-types/{name}/toggle", post(toggle_event_type))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateEventTypeRequest {
    name: String,
    category: String,
    description: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EventTypeResponse {
    name: String,
    category: String,
    description: Option<String>,
    is_active: bool,
    created_at: DateTime<Utc>,
}

impl From<WebhookEventType> for EventTypeResponse {
    fn from(event_type: WebhookEventType) -> Self {
        Self {
            name: event_type.name,
            category: event_type.category,
            description: event_type.description,
            is_active: event_type.is_active,
            created_at: event_type.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EventTypeListResponse {
    items: Vec<EventTypeResponse>,
}

async fn create_event_type(
    State(state): State<AppState>,
    Json(payload): Json<CreateEventTypeRequest>,
) -> ApiResult<(StatusCode, Json<EventTypeResponse>)> {
    let name = payload.name.trim().to_string();
    if name.is_empty() {
        return Err(ApiError::BadRequest("name must not be empty".to_string()));
    }
    if payload.category.trim().is_empty() {
        return Err(ApiError::BadRequest("category must not be empty".to_string()));
    }

    let event_type = WebhookEventType {
        name,
        category: payload.category.trim().to_string(),
        description: payload.description,
        is_active: true,
        created_at: Utc::now(),
    };
    state.store.upsert_event_type(&event_type).await?;
    Ok((StatusCode::CREATED, Json(EventTypeResponse::from(event_type))))
}

async fn list_event_types(
    State(state): State<AppState>,
) -> ApiResult<Json<EventTypeListResponse>> {
    let items = state
        .store
        .list_event_types()
        .await?
        .into_iter()
        .map(EventTypeResponse::from)
        .collect();
    Ok(Json(EventTypeListResponse { items }))
}

async fn toggle_event_type(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<Json<EventTypeResponse>> {
    let event_type = state
        .store
        .toggle_event_type(&name)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("event type not found: {name}")))?;
    Ok(Json(EventTypeResponse::from(event_type)))
}
